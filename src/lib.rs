//! Lattice is a sparse-set entity-component-system (ECS) library.
//!
//! A [`World`] stores entities (versioned ids) and the components attached
//! to them, one cache-friendly sparse set per component type.
//! User *systems* query the world through typed [views](crate::query::View)
//! over required, optional and excluded component sets, buffer mutations in
//! a thread-safe [command queue](crate::systems::Commands), and run in
//! parallel on a worker pool, ordered by an explicit constraint graph
//! partitioned into stages.
//!
//! # Example
//!
//! ```
//! use lattice::{Application, SystemArgs};
//!
//! #[derive(Debug, Default, Clone, Copy, PartialEq)]
//! struct Position {
//!     x: f32,
//! }
//!
//! #[derive(Debug, Default, Clone, Copy, PartialEq)]
//! struct Velocity {
//!     x: f32,
//! }
//!
//! let mut app = Application::new();
//!
//! app.add_startup_system(|args: &mut SystemArgs<'_>| {
//!     args.commands()
//!         .spawn((Position { x: 0.0 }, Velocity { x: 1.0 }))
//!         .spawn((Position { x: 10.0 },));
//! });
//!
//! app.add_update_system(|args: &mut SystemArgs<'_>| {
//!     let moving = args.viewer().view::<(Position, Velocity), (), ()>().count();
//!     assert_eq!(moving, 1);
//! });
//!
//! let mut ticks = 0;
//! app.run(move || {
//!     ticks += 1;
//!     ticks > 3
//! })
//! .unwrap();
//! ```
//!
//! Mutations requested during a stage (spawns, destroys, attaches,
//! detaches, resource changes) are applied between stages, in the order
//! each thread enqueued them. Systems therefore always observe a world
//! that is stable for the duration of one stage.

pub mod internals;

/// Entity handles and their bit-level layout.
pub mod entity {
    pub use crate::internals::entity::{Entity, EntityHasher, ENTITY_SHIFT, ID_MASK, VERSION_MASK};
}

/// Component traits and type identifiers.
pub mod component {
    pub use crate::internals::component::{
        has_duplicate_type_ids, Component, ComponentSet, ComponentTypeId, ComponentTypeIdList,
    };
}

/// Sparse-set component storage.
pub mod storage {
    pub use crate::internals::storage::{AnyStorage, Storage};
}

/// The registry of entities, storages and component membership.
pub mod registry {
    pub use crate::internals::registry::{ComponentBundle, ComponentTypeSet, Registry};
}

/// Queries over required, optional and excluded component sets.
pub mod query {
    pub use crate::internals::query::{OptionalSet, RequiredSet, View, Viewer};
}

/// Systems, commands, resources, graphs and schedulers.
pub mod systems {
    pub use crate::internals::systems::command::{Command, CommandQueue, Commands};
    pub use crate::internals::systems::graph::{System, SystemGraph, SystemId, SystemNode};
    pub use crate::internals::systems::resources::{
        Res, ResMut, Resource, ResourceTypeId, Resources,
    };
    pub use crate::internals::systems::schedule::{Scheduler, StageScheduler};
    pub use crate::internals::systems::SystemArgs;
}

/// The world aggregate and the application lifecycle.
pub mod world {
    pub use crate::internals::world::{Application, World};
}

/// The crate-wide error type.
pub mod error {
    pub use crate::internals::error::EcsError;
}

pub use crate::component::{Component, ComponentTypeId};
pub use crate::entity::Entity;
pub use crate::error::EcsError;
pub use crate::query::{View, Viewer};
pub use crate::registry::Registry;
pub use crate::systems::{
    Commands, Resources, Scheduler, StageScheduler, SystemArgs, SystemId,
};
pub use crate::world::{Application, World};
