//! Contains the stage scheduler and the staged pipeline scheduler.
//!
//! A [`StageScheduler`] owns one [`SystemGraph`] and executes it on a pool
//! of worker threads: zero-in-degree systems are seeded first, and every
//! completion releases the successors whose last predecessor just finished.
//! A [`Scheduler`] is an ordered list of stages executed sequentially, with
//! the command queue drained after every stage.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, span, trace, Level};

use crate::internals::error::EcsError;
use crate::internals::systems::graph::{System, SystemGraph, SystemId};
use crate::internals::systems::SystemArgs;
use crate::internals::world::World;

fn default_worker_count() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

type Task = (SystemId, System);

/// The pool's work queue: pushed by the dispatcher, popped by workers.
#[derive(Default)]
struct TaskQueue {
    state: Mutex<TaskQueueState>,
    ready: Condvar,
}

#[derive(Default)]
struct TaskQueueState {
    tasks: VecDeque<Task>,
    stopped: bool,
}

impl TaskQueue {
    fn push(&self, task: Task) -> Result<(), EcsError> {
        {
            let mut state = self.state.lock();
            if state.stopped {
                return Err(EcsError::EnqueueAfterShutdown);
            }
            state.tasks.push_back(task);
        }
        self.ready.notify_one();
        Ok(())
    }

    /// Blocks until a task arrives or the queue stops; `None` means the
    /// worker should exit.
    fn next(&self) -> Option<Task> {
        let mut state = self.state.lock();
        loop {
            if let Some(task) = state.tasks.pop_front() {
                return Some(task);
            }
            if state.stopped {
                return None;
            }
            self.ready.wait(&mut state);
        }
    }

    fn stop(&self) {
        self.state.lock().stopped = true;
        self.ready.notify_all();
    }
}

struct Completion {
    id: SystemId,
    panic: Option<String>,
}

/// FIFO of finished system ids, drained by the dispatching thread.
#[derive(Default)]
struct Completions {
    queue: Mutex<VecDeque<Completion>>,
    done: Condvar,
}

impl Completions {
    fn push(&self, completion: Completion) {
        self.queue.lock().push_back(completion);
        self.done.notify_one();
    }

    fn wait_drain(&self, into: &mut Vec<Completion>) {
        let mut queue = self.queue.lock();
        while queue.is_empty() {
            self.done.wait(&mut queue);
        }
        into.extend(queue.drain(..));
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

/// Executes one system graph on a worker pool, respecting every
/// happens-before constraint.
///
/// Graph edits lock an internal mutex, so a stage can be shared and edited
/// from several threads between runs. `execute` snapshots the graph under
/// the mutex and dispatches against the copy.
pub struct StageScheduler {
    graph: Mutex<SystemGraph>,
    workers: usize,
}

impl Default for StageScheduler {
    fn default() -> Self {
        Self {
            graph: Mutex::new(SystemGraph::new()),
            workers: default_worker_count(),
        }
    }
}

impl StageScheduler {
    /// Constructs a stage with one worker per hardware thread.
    pub fn new() -> Self { Self::default() }

    /// Constructs a stage with an explicit worker count.
    pub fn with_workers(workers: usize) -> Self {
        Self {
            graph: Mutex::new(SystemGraph::new()),
            workers: workers.max(1),
        }
    }

    /// Registers a system and returns its id within this stage.
    pub fn add_system<F>(&self, system: F) -> SystemId
    where
        F: Fn(&mut SystemArgs<'_>) + Send + Sync + 'static,
    {
        self.graph.lock().add_system(std::sync::Arc::new(system))
    }

    /// Removes a system and frees its id.
    pub fn remove_system(&self, id: SystemId) -> Result<(), EcsError> {
        self.graph.lock().remove_system(id)
    }

    /// Requires `from` to finish before `to` starts.
    pub fn add_constraint(&self, from: SystemId, to: SystemId) -> Result<(), EcsError> {
        self.graph.lock().add_constraint(from, to)
    }

    /// Drops an ordering requirement.
    pub fn remove_constraint(&self, from: SystemId, to: SystemId) -> Result<(), EcsError> {
        self.graph.lock().remove_constraint(from, to)
    }

    /// Returns `true` if the constraint is currently present.
    pub fn contains_constraint(&self, from: SystemId, to: SystemId) -> bool {
        self.graph.lock().contains_constraint(from, to)
    }

    /// Returns `true` if the id names a system in this stage.
    pub fn contains_system(&self, id: SystemId) -> bool {
        self.graph.lock().contains_system(id)
    }

    /// The number of systems in this stage.
    pub fn len(&self) -> usize { self.graph.lock().len() }

    /// Returns `true` if the stage has no systems.
    pub fn is_empty(&self) -> bool { self.graph.lock().is_empty() }

    /// Returns `true` if the current constraints form a cycle.
    pub fn has_cycle(&self) -> bool { self.graph.lock().has_cycle() }

    /// Runs every system in the stage, in parallel where the constraint
    /// graph permits.
    ///
    /// Fails with [`EcsError::Cycle`] before any system runs if the graph
    /// is cyclic. A panicking system does not abort the stage: already
    /// scheduled systems complete, and the first panic is reported as
    /// [`EcsError::SystemPanicked`] once the stage has finished.
    pub fn execute(&self, world: &World) -> Result<(), EcsError> {
        let mut snapshot = {
            let graph = self.graph.lock();
            if graph.has_cycle() {
                return Err(EcsError::Cycle);
            }
            graph.clone()
        };

        if snapshot.is_empty() {
            return Ok(());
        }

        let stage_span = span!(Level::DEBUG, "stage", systems = snapshot.len());
        let _guard = stage_span.enter();

        let queue = TaskQueue::default();
        let completions = Completions::default();
        let mut first_panic: Option<(SystemId, String)> = None;

        let dispatched = thread::scope(|scope| {
            for _ in 0..self.workers {
                scope.spawn(|| {
                    while let Some((id, system)) = queue.next() {
                        let outcome = catch_unwind(AssertUnwindSafe(|| {
                            let mut args = SystemArgs::new(world);
                            system(&mut args);
                        }));
                        completions.push(Completion {
                            id,
                            panic: outcome.err().map(panic_message),
                        });
                    }
                });
            }

            let result = Self::dispatch(
                &mut snapshot,
                &queue,
                &completions,
                &mut first_panic,
            );
            queue.stop();
            result
        });
        dispatched?;

        match first_panic {
            Some((system, message)) => Err(EcsError::SystemPanicked { system, message }),
            None => Ok(()),
        }
    }

    /// Seeds the roots, then releases successors wave by wave until the
    /// snapshot is exhausted.
    fn dispatch(
        snapshot: &mut SystemGraph,
        queue: &TaskQueue,
        completions: &Completions,
        first_panic: &mut Option<(SystemId, String)>,
    ) -> Result<(), EcsError> {
        let roots: Vec<Task> = snapshot
            .nodes()
            .filter(|node| node.in_degree() == 0)
            .map(|node| (node.id(), node.system().clone()))
            .collect();
        for task in roots {
            queue.push(task)?;
        }

        let mut drained = Vec::new();
        while !snapshot.is_empty() {
            drained.clear();
            completions.wait_drain(&mut drained);

            for completion in &drained {
                trace!(system = completion.id, "system completed");
                if let Some(message) = &completion.panic {
                    error!(system = completion.id, message = message.as_str(), "system panicked");
                    if first_panic.is_none() {
                        *first_panic = Some((completion.id, message.clone()));
                    }
                }

                let successors: Vec<SystemId> = match snapshot.node(completion.id) {
                    Some(node) => node.successors().iter().copied().collect(),
                    None => continue,
                };

                for next in successors {
                    snapshot.remove_constraint(completion.id, next)?;
                    let released = snapshot
                        .node(next)
                        .filter(|node| node.in_degree() == 0)
                        .map(|node| (node.id(), node.system().clone()));
                    if let Some(task) = released {
                        queue.push(task)?;
                    }
                }

                snapshot.remove_system(completion.id)?;
            }
        }

        Ok(())
    }
}

/// An ordered list of stages executed back to back.
///
/// Stages never overlap: a stage's whole DAG completes before the next
/// stage starts, and the command queue is drained between stages so every
/// deferred mutation from stage *k* is visible to stage *k + 1*.
pub struct Scheduler {
    stages: Vec<StageScheduler>,
}

impl Default for Scheduler {
    fn default() -> Self { Self::new() }
}

impl Scheduler {
    /// Constructs a scheduler with a single stage.
    pub fn new() -> Self {
        Self {
            stages: vec![StageScheduler::new()],
        }
    }

    /// Constructs a scheduler with the given number of stages.
    pub fn with_stages(count: usize) -> Self {
        assert!(count > 0, "a scheduler needs at least one stage");
        Self {
            stages: (0..count).map(|_| StageScheduler::new()).collect(),
        }
    }

    /// Appends a stage and returns its index.
    pub fn add_stage(&mut self) -> usize {
        self.stages.push(StageScheduler::new());
        self.stages.len() - 1
    }

    /// Appends a pre-configured stage and returns its index.
    pub fn add_stage_scheduler(&mut self, stage: StageScheduler) -> usize {
        self.stages.push(stage);
        self.stages.len() - 1
    }

    /// The stage at the given index.
    pub fn stage(&self, index: usize) -> Option<&StageScheduler> {
        self.stages.get(index)
    }

    /// The first stage.
    pub fn first_stage(&self) -> &StageScheduler {
        &self.stages[0]
    }

    /// The last stage.
    pub fn last_stage(&self) -> &StageScheduler {
        &self.stages[self.stages.len() - 1]
    }

    /// The number of stages.
    pub fn stage_count(&self) -> usize { self.stages.len() }

    /// The total number of systems across all stages.
    pub fn system_count(&self) -> usize {
        self.stages.iter().map(StageScheduler::len).sum()
    }

    /// Executes every stage in index order, draining the command queue
    /// after each one.
    ///
    /// A failing stage still gets its drain (commands buffered by the
    /// systems that did run are not lost) before the error is returned.
    pub fn execute(&self, world: &mut World) -> Result<(), EcsError> {
        for (index, stage) in self.stages.iter().enumerate() {
            debug!(stage = index, "executing stage");
            let result = stage.execute(world);
            world.apply_commands();
            result?;
        }
        Ok(())
    }
}
