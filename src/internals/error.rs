//! The crate-wide error type.

use thiserror::Error;

use super::systems::graph::SystemId;

/// Errors surfaced by registry, graph, scheduler and queue operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// A component type appeared more than once in a bundle or type list.
    #[error("duplicate component types in the argument list")]
    DuplicateComponents,
    /// An ordering constraint would make a system depend on itself.
    #[error("a system cannot be ordered relative to itself")]
    SelfLoopConstraint,
    /// The system id does not name a live node in the graph.
    #[error("unknown system id {0}")]
    UnknownSystem(SystemId),
    /// The system graph contains a directed cycle.
    #[error("the system graph contains a cycle")]
    Cycle,
    /// A task was submitted to a worker pool that has already stopped.
    #[error("enqueue on a stopped worker pool")]
    EnqueueAfterShutdown,
    /// A user system panicked while the stage was executing.
    #[error("system {system} panicked: {message}")]
    SystemPanicked {
        /// Id of the system whose invocation panicked.
        system: SystemId,
        /// The panic payload, if it was a string.
        message: String,
    },
}
