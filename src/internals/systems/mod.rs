//! System execution: argument packs, deferred commands, shared resources,
//! the constraint graph and the stage schedulers.

pub mod command;
pub mod graph;
pub mod resources;
pub mod schedule;

use crate::internals::query::Viewer;
use crate::internals::systems::command::Commands;
use crate::internals::systems::resources::Resources;
use crate::internals::world::World;

/// The argument pack handed to every system.
///
/// Systems read the world through the viewer, buffer mutations through the
/// commands facade, and share data through resources. The pack borrows the
/// world for the duration of one invocation.
pub struct SystemArgs<'w> {
    viewer: Viewer<'w>,
    commands: &'w Commands,
    resources: &'w Resources,
}

impl<'w> SystemArgs<'w> {
    pub(crate) fn new(world: &'w World) -> Self {
        Self {
            viewer: world.viewer(),
            commands: world.commands(),
            resources: world.resources(),
        }
    }

    /// Read-only queries over the world.
    pub fn viewer(&self) -> Viewer<'w> { self.viewer }

    /// The deferred mutation queue.
    pub fn commands(&self) -> &'w Commands { self.commands }

    /// Shared data external to entities.
    pub fn resources(&self) -> &'w Resources { self.resources }
}
