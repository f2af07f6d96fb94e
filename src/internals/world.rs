//! The world aggregate and the application lifecycle around it.

use tracing::debug;

use super::error::EcsError;
use super::query::Viewer;
use super::registry::Registry;
use super::systems::command::Commands;
use super::systems::graph::SystemId;
use super::systems::resources::Resources;
use super::systems::schedule::Scheduler;
use super::systems::SystemArgs;

/// Everything a set of systems operates on: the registry of entities and
/// components, the shared resources, and the deferred command queue.
///
/// The registry and resources are mutated directly only between stages;
/// during a stage, systems observe the world through [`Viewer`] and buffer
/// changes through [`Commands`].
#[derive(Default)]
pub struct World {
    registry: Registry,
    resources: Resources,
    commands: Commands,
}

impl World {
    /// Constructs an empty world.
    pub fn new() -> Self { Self::default() }

    /// The entity and component registry.
    pub fn registry(&self) -> &Registry { &self.registry }

    /// Mutable access to the registry; only sound between stages.
    pub fn registry_mut(&mut self) -> &mut Registry { &mut self.registry }

    /// The shared resource store.
    pub fn resources(&self) -> &Resources { &self.resources }

    /// Mutable access to the resources; only sound between stages.
    pub fn resources_mut(&mut self) -> &mut Resources { &mut self.resources }

    /// The deferred command facade feeding this world.
    pub fn commands(&self) -> &Commands { &self.commands }

    /// A read-only query factory over the registry.
    pub fn viewer(&self) -> Viewer<'_> { Viewer::new(&self.registry) }

    /// Applies every queued command to this world, in FIFO order.
    pub fn apply_commands(&mut self) {
        let queue = self.commands.queue();
        queue.apply(self);
    }
}

/// Owns a [`World`] and the three pipelines run over it: startup once,
/// update every tick, shutdown once.
///
/// Each pipeline is a [`Scheduler`]: an ordered list of stages, each stage
/// a constraint DAG of systems. Convenience methods register systems into
/// the last stage of the matching pipeline.
#[derive(Default)]
pub struct Application {
    world: World,
    startup: Scheduler,
    update: Scheduler,
    shutdown: Scheduler,
}

impl Application {
    /// Constructs an application with an empty world and one stage per
    /// pipeline.
    pub fn new() -> Self { Self::default() }

    /// The world the pipelines execute against.
    pub fn world(&self) -> &World { &self.world }

    /// Mutable world access for host-side setup between runs.
    pub fn world_mut(&mut self) -> &mut World { &mut self.world }

    /// The world's command facade, for host-side enqueueing.
    pub fn commands(&self) -> &Commands { self.world.commands() }

    /// The startup pipeline.
    pub fn startup(&self) -> &Scheduler { &self.startup }

    /// Mutable startup pipeline, e.g. to add stages.
    pub fn startup_mut(&mut self) -> &mut Scheduler { &mut self.startup }

    /// The update pipeline.
    pub fn update(&self) -> &Scheduler { &self.update }

    /// Mutable update pipeline.
    pub fn update_mut(&mut self) -> &mut Scheduler { &mut self.update }

    /// The shutdown pipeline.
    pub fn shutdown(&self) -> &Scheduler { &self.shutdown }

    /// Mutable shutdown pipeline.
    pub fn shutdown_mut(&mut self) -> &mut Scheduler { &mut self.shutdown }

    /// Registers a system into the startup pipeline's last stage.
    pub fn add_startup_system<F>(&self, system: F) -> SystemId
    where
        F: Fn(&mut SystemArgs<'_>) + Send + Sync + 'static,
    {
        self.startup.last_stage().add_system(system)
    }

    /// Registers a system into the update pipeline's last stage.
    pub fn add_update_system<F>(&self, system: F) -> SystemId
    where
        F: Fn(&mut SystemArgs<'_>) + Send + Sync + 'static,
    {
        self.update.last_stage().add_system(system)
    }

    /// Registers a system into the shutdown pipeline's last stage.
    pub fn add_shutdown_system<F>(&self, system: F) -> SystemId
    where
        F: Fn(&mut SystemArgs<'_>) + Send + Sync + 'static,
    {
        self.shutdown.last_stage().add_system(system)
    }

    /// Orders two systems within the startup pipeline's last stage.
    pub fn add_startup_constraint(&self, from: SystemId, to: SystemId) -> Result<(), EcsError> {
        self.startup.last_stage().add_constraint(from, to)
    }

    /// Orders two systems within the update pipeline's last stage.
    pub fn add_update_constraint(&self, from: SystemId, to: SystemId) -> Result<(), EcsError> {
        self.update.last_stage().add_constraint(from, to)
    }

    /// Orders two systems within the shutdown pipeline's last stage.
    pub fn add_shutdown_constraint(&self, from: SystemId, to: SystemId) -> Result<(), EcsError> {
        self.shutdown.last_stage().add_constraint(from, to)
    }

    /// Drops an ordering constraint from the startup pipeline's last stage.
    pub fn remove_startup_constraint(&self, from: SystemId, to: SystemId) -> Result<(), EcsError> {
        self.startup.last_stage().remove_constraint(from, to)
    }

    /// Drops an ordering constraint from the update pipeline's last stage.
    pub fn remove_update_constraint(&self, from: SystemId, to: SystemId) -> Result<(), EcsError> {
        self.update.last_stage().remove_constraint(from, to)
    }

    /// Drops an ordering constraint from the shutdown pipeline's last
    /// stage.
    pub fn remove_shutdown_constraint(&self, from: SystemId, to: SystemId) -> Result<(), EcsError> {
        self.shutdown.last_stage().remove_constraint(from, to)
    }

    /// Returns `true` if the startup pipeline's last stage holds the
    /// constraint.
    pub fn contains_startup_constraint(&self, from: SystemId, to: SystemId) -> bool {
        self.startup.last_stage().contains_constraint(from, to)
    }

    /// Returns `true` if the update pipeline's last stage holds the
    /// constraint.
    pub fn contains_update_constraint(&self, from: SystemId, to: SystemId) -> bool {
        self.update.last_stage().contains_constraint(from, to)
    }

    /// Returns `true` if the shutdown pipeline's last stage holds the
    /// constraint.
    pub fn contains_shutdown_constraint(&self, from: SystemId, to: SystemId) -> bool {
        self.shutdown.last_stage().contains_constraint(from, to)
    }

    /// Runs the update pipeline once.
    pub fn tick(&mut self) -> Result<(), EcsError> {
        self.update.execute(&mut self.world)
    }

    /// Runs the full lifecycle: startup once, update until `should_exit`
    /// returns `true`, shutdown once.
    ///
    /// `should_exit` is consulted between update ticks only; a tick always
    /// runs to completion. The command queue is drained after every stage
    /// of every pipeline.
    pub fn run<F>(&mut self, mut should_exit: F) -> Result<(), EcsError>
    where
        F: FnMut() -> bool,
    {
        debug!("running startup pipeline");
        self.startup.execute(&mut self.world)?;

        while !should_exit() {
            self.update.execute(&mut self.world)?;
        }

        debug!("running shutdown pipeline");
        self.shutdown.execute(&mut self.world)
    }
}
