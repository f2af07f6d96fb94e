//! Lazy queries over combinations of required, optional and excluded
//! component types.
//!
//! A [`View`] walks the dense entity array of the first required component's
//! storage (or the whole entity index when nothing is required), filters
//! each candidate against the required and excluded sets, and projects the
//! survivors to component references. Views read the registry and never
//! mutate it; world mutation from inside a system goes through
//! [`Commands`](super::systems::command::Commands).

use std::collections::hash_map::Keys;
use std::marker::PhantomData;

use super::component::{
    has_duplicate_type_ids, Component, ComponentSet, ComponentTypeIdList,
};
use super::entity::Entity;
use super::registry::{ComponentTypeSet, Registry};

/// A component tuple fetched by reference; every type must be present for
/// an entity to match.
pub trait RequiredSet: ComponentSet {
    /// The tuple of references produced per match.
    type Refs<'w>;

    /// Fetches every required component for the entity.
    fn fetch<'w>(registry: &'w Registry, entity: Entity) -> Option<Self::Refs<'w>>;
}

/// A component tuple fetched as `Option`s; absence does not reject a match.
pub trait OptionalSet: ComponentSet {
    /// The tuple of optional references produced per match.
    type Ptrs<'w>;

    /// Fetches whichever optional components the entity has.
    fn fetch<'w>(registry: &'w Registry, entity: Entity) -> Self::Ptrs<'w>;
}

impl RequiredSet for () {
    type Refs<'w> = ();

    fn fetch<'w>(_: &'w Registry, _: Entity) -> Option<()> { Some(()) }
}

impl OptionalSet for () {
    type Ptrs<'w> = ();

    fn fetch<'w>(_: &'w Registry, _: Entity) -> Self::Ptrs<'w> {}
}

macro_rules! view_set_tuple {
    ($head_ty:ident) => {
        impl_view_set_tuple!($head_ty);
    };
    ($head_ty:ident, $( $tail_ty:ident ),*) => (
        impl_view_set_tuple!($head_ty, $( $tail_ty ),*);
        view_set_tuple!($( $tail_ty ),*);
    );
}

macro_rules! impl_view_set_tuple {
    ( $( $ty:ident ),* ) => {
        impl<$( $ty: Component ),*> RequiredSet for ($( $ty, )*) {
            type Refs<'w> = ($( &'w $ty, )*);

            fn fetch<'w>(registry: &'w Registry, entity: Entity) -> Option<Self::Refs<'w>> {
                Some(($( registry.get::<$ty>(entity)?, )*))
            }
        }

        impl<$( $ty: Component ),*> OptionalSet for ($( $ty, )*) {
            type Ptrs<'w> = ($( Option<&'w $ty>, )*);

            fn fetch<'w>(registry: &'w Registry, entity: Entity) -> Self::Ptrs<'w> {
                ($( registry.get::<$ty>(entity), )*)
            }
        }
    };
}

view_set_tuple!(A, B, C, D, E, F, G, H);

/// Factory handing out [`View`]s over a registry.
///
/// Systems receive a viewer in their argument pack instead of the registry
/// itself, keeping stage-time access read-only.
#[derive(Copy, Clone)]
pub struct Viewer<'w> {
    registry: &'w Registry,
}

impl<'w> Viewer<'w> {
    pub(crate) fn new(registry: &'w Registry) -> Self { Self { registry } }

    /// Builds a view over `(Required, Optional, Exclude)` component sets.
    ///
    /// # Panics
    ///
    /// Panics if a component type appears in more than one of the three
    /// sets, or twice within one set.
    pub fn view<R, O, X>(&self) -> View<'w, R, O, X>
    where
        R: RequiredSet,
        O: OptionalSet,
        X: ComponentSet,
    {
        View::new(self.registry)
    }

    /// Returns `true` if the handle names a live entity.
    pub fn contains_entity(&self, entity: Entity) -> bool {
        self.registry.contains_entity(entity)
    }

    /// Reads a single component of a live entity.
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&'w T> {
        self.registry.get::<T>(entity)
    }

    /// The underlying registry, for read-only inspection.
    pub fn registry(&self) -> &'w Registry { self.registry }
}

enum ViewState<'w> {
    Pending,
    // One of the required storages is missing; the view yields nothing.
    Drained,
    Dense { entities: &'w [Entity], cursor: usize },
    Sparse { keys: Keys<'w, Entity, ComponentTypeSet> },
}

/// A single-pass iterator over every live entity holding all `R`, none of
/// `X`, projected to `(entity, R refs, O optional refs)`.
///
/// Matches come in the packed order of `R`'s first storage (insertion order
/// modulo earlier swap-and-pop removals), or in unspecified order when `R`
/// is empty. A view cannot be restarted; build a new one for a second pass.
pub struct View<'w, R, O, X>
where
    R: RequiredSet,
    O: OptionalSet,
    X: ComponentSet,
{
    registry: &'w Registry,
    required_ids: ComponentTypeIdList,
    exclude_ids: ComponentTypeIdList,
    state: ViewState<'w>,
    _marker: PhantomData<fn(R, O, X)>,
}

impl<'w, R, O, X> View<'w, R, O, X>
where
    R: RequiredSet,
    O: OptionalSet,
    X: ComponentSet,
{
    fn new(registry: &'w Registry) -> Self {
        let required_ids = R::type_ids();
        let optional_ids = O::type_ids();
        let exclude_ids = X::type_ids();

        let mut all_ids = ComponentTypeIdList::new();
        all_ids.extend_from_slice(&required_ids);
        all_ids.extend_from_slice(&optional_ids);
        all_ids.extend_from_slice(&exclude_ids);
        assert!(
            !has_duplicate_type_ids(&all_ids),
            "a component type may appear in only one of a view's required, \
             optional and exclude sets, and only once"
        );

        Self {
            registry,
            required_ids,
            exclude_ids,
            state: ViewState::Pending,
            _marker: PhantomData,
        }
    }

    fn initialize(&mut self) {
        let registry = self.registry;

        self.state = if R::LEN == 0 {
            ViewState::Sparse {
                keys: registry.entity_index().keys(),
            }
        } else if !registry.has_all_storages(&self.required_ids) {
            ViewState::Drained
        } else {
            match registry.any_storage(self.required_ids[0]) {
                Some(driving) => ViewState::Dense {
                    entities: driving.entities(),
                    cursor: 0,
                },
                None => ViewState::Drained,
            }
        };
    }

    fn next_candidate(&mut self) -> Option<Entity> {
        match &mut self.state {
            ViewState::Dense { entities, cursor } => {
                let entity = entities.get(*cursor).copied();
                *cursor += 1;
                entity
            }
            ViewState::Sparse { keys } => keys.next().copied(),
            ViewState::Drained => None,
            ViewState::Pending => None,
        }
    }

    fn accept(&self, entity: Entity) -> bool {
        if !self.registry.contains_entity(entity) {
            return false;
        }
        if R::LEN > 0 && !self.registry.has_all_ids(entity, &self.required_ids) {
            return false;
        }
        !self.registry.has_any_ids(entity, &self.exclude_ids)
    }
}

impl<'w, R, O, X> Iterator for View<'w, R, O, X>
where
    R: RequiredSet,
    O: OptionalSet,
    X: ComponentSet,
{
    type Item = (Entity, R::Refs<'w>, O::Ptrs<'w>);

    fn next(&mut self) -> Option<Self::Item> {
        if matches!(self.state, ViewState::Pending) {
            self.initialize();
        }

        loop {
            let entity = self.next_candidate()?;
            if !self.accept(entity) {
                continue;
            }

            // Present by construction once `accept` passes.
            if let Some(required) = R::fetch(self.registry, entity) {
                return Some((entity, required, O::fetch(self.registry, entity)));
            }
        }
    }
}
