//! The registry: owner of all component storages and the entity index.

use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::BuildHasherDefault;

use super::component::{
    has_duplicate_type_ids, Component, ComponentSet, ComponentTypeId, ComponentTypeIdList,
};
use super::entity::{Entity, EntityHasher};
use super::error::EcsError;
use super::hash::ComponentTypeIdHasher;
use super::storage::{AnyStorage, Storage};

type TypeIdHasher = BuildHasherDefault<ComponentTypeIdHasher>;

/// The set of component types currently attached to one entity.
pub type ComponentTypeSet = HashSet<ComponentTypeId, TypeIdHasher>;

/// A tuple of component values which can be attached to an entity in one
/// call.
///
/// Implemented for tuples of up to eight [`Component`] values, `()`
/// included. The type ids are reported in tuple order so callers can reject
/// duplicates before any value is moved in.
pub trait ComponentBundle: Send + 'static {
    /// Collects the type ids of the bundled components, in tuple order.
    fn type_ids() -> ComponentTypeIdList;

    /// Attaches every bundled component to the entity.
    fn attach(self, registry: &mut Registry, entity: Entity);
}

impl ComponentBundle for () {
    fn type_ids() -> ComponentTypeIdList { ComponentTypeIdList::new() }

    fn attach(self, _: &mut Registry, _: Entity) {}
}

macro_rules! component_bundle_tuple {
    ($head_ty:ident) => {
        impl_component_bundle_tuple!($head_ty);
    };
    ($head_ty:ident, $( $tail_ty:ident ),*) => (
        impl_component_bundle_tuple!($head_ty, $( $tail_ty ),*);
        component_bundle_tuple!($( $tail_ty ),*);
    );
}

macro_rules! impl_component_bundle_tuple {
    ( $( $ty:ident ),* ) => {
        #[allow(non_snake_case)]
        impl<$( $ty: Component ),*> ComponentBundle for ($( $ty, )*) {
            fn type_ids() -> ComponentTypeIdList {
                let mut type_ids = ComponentTypeIdList::new();
                $( type_ids.push(ComponentTypeId::of::<$ty>()); )*
                type_ids
            }

            fn attach(self, registry: &mut Registry, entity: Entity) {
                let ($( $ty, )*) = self;
                $( registry.attach(entity, $ty); )*
            }
        }
    };
}

component_bundle_tuple!(A, B, C, D, E, F, G, H);

/// Owns one [`Storage`] per component type present in the world, tracks
/// which components each live entity has, and allocates entity handles.
///
/// The registry is not thread-safe. During stage execution systems read it
/// through [`Viewer`](super::query::Viewer) and buffer mutations through
/// [`Commands`](super::systems::command::Commands); the buffered mutations
/// are applied between stages, when nothing else is running.
#[derive(Default)]
pub struct Registry {
    storages: HashMap<ComponentTypeId, Box<dyn AnyStorage>, TypeIdHasher>,
    entity_index: HashMap<Entity, ComponentTypeSet, EntityHasher>,
    // Recycled handles, already bumped to their next version.
    free_list: VecDeque<Entity>,
    next_id: u32,
}

impl Registry {
    /// Constructs an empty registry.
    pub fn new() -> Self { Self::default() }

    /// Allocates a new live entity, recycling a destroyed id if one is
    /// available.
    pub fn create_entity(&mut self) -> Entity {
        let entity = match self.free_list.pop_back() {
            Some(recycled) => recycled,
            None => {
                let fresh = Entity::from_parts(self.next_id, 0);
                self.next_id += 1;
                fresh
            }
        };

        self.entity_index.insert(entity, ComponentTypeSet::default());
        entity
    }

    /// Destroys a live entity: detaches every component, removes it from
    /// the entity index and queues its id for recycling at the next
    /// version. Does nothing when the handle is stale or unknown.
    pub fn destroy_entity(&mut self, entity: Entity) {
        let Some(type_ids) = self.entity_index.remove(&entity) else {
            return;
        };

        for type_id in &type_ids {
            if let Some(storage) = self.storages.get_mut(type_id) {
                storage.pop(entity.id());
            }
        }

        self.free_list.push_back(entity.next_version());
    }

    /// Returns `true` if the handle names a live entity, version included.
    pub fn contains_entity(&self, entity: Entity) -> bool {
        self.entity_index.contains_key(&entity)
    }

    /// Attaches a component to a live entity, overwriting any previous
    /// value of the same type. Does nothing when the handle is stale.
    pub fn attach<T: Component>(&mut self, entity: Entity, component: T) {
        let Some(type_set) = self.entity_index.get_mut(&entity) else {
            return;
        };
        type_set.insert(ComponentTypeId::of::<T>());

        self.get_or_create_storage::<T>().upsert_with(entity, component);
    }

    /// Attaches a whole bundle of components in one call.
    ///
    /// Rejects bundles naming the same component type twice.
    pub fn attach_bundle<B: ComponentBundle>(
        &mut self,
        entity: Entity,
        bundle: B,
    ) -> Result<(), EcsError> {
        if has_duplicate_type_ids(&B::type_ids()) {
            return Err(EcsError::DuplicateComponents);
        }

        bundle.attach(self, entity);
        Ok(())
    }

    /// Detaches a component by type. Does nothing when the handle is stale
    /// or the component absent.
    pub fn detach<T: Component>(&mut self, entity: Entity) {
        self.detach_by_id(entity, ComponentTypeId::of::<T>());
    }

    /// Detaches a component by type id.
    pub fn detach_by_id(&mut self, entity: Entity, type_id: ComponentTypeId) {
        let Some(type_set) = self.entity_index.get_mut(&entity) else {
            return;
        };
        type_set.remove(&type_id);

        if let Some(storage) = self.storages.get_mut(&type_id) {
            storage.pop(entity.id());
        }
    }

    /// Detaches every component type named by the set in one call.
    ///
    /// Rejects sets naming the same component type twice.
    pub fn detach_bundle<S: ComponentSet>(&mut self, entity: Entity) -> Result<(), EcsError> {
        self.detach_ids(entity, &S::type_ids())
    }

    /// Detaches components by type id list, rejecting duplicate ids.
    pub fn detach_ids(
        &mut self,
        entity: Entity,
        type_ids: &[ComponentTypeId],
    ) -> Result<(), EcsError> {
        if has_duplicate_type_ids(type_ids) {
            return Err(EcsError::DuplicateComponents);
        }

        for type_id in type_ids {
            self.detach_by_id(entity, *type_id);
        }
        Ok(())
    }

    /// Returns the component of the given type, or `None` when the storage,
    /// the entity or the version match is missing.
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        let storage = self.storage_of::<T>()?;
        if !storage.contains_entity(entity) {
            return None;
        }
        Some(storage.component_of(entity.id()))
    }

    /// Mutable variant of [`get`](Registry::get).
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        let storage = self.storage_of_mut::<T>()?;
        if !storage.contains_entity(entity) {
            return None;
        }
        Some(storage.component_of_mut(entity.id()))
    }

    /// Returns `true` if the live entity has a component of the given type.
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.has_by_id(entity, ComponentTypeId::of::<T>())
    }

    /// Type-id variant of [`has`](Registry::has).
    pub fn has_by_id(&self, entity: Entity, type_id: ComponentTypeId) -> bool {
        self.storages
            .get(&type_id)
            .is_some_and(|storage| storage.contains_entity(entity))
    }

    /// Returns `true` if the entity has every component type in the set.
    pub fn has_all_of<S: ComponentSet>(&self, entity: Entity) -> bool {
        self.has_all_ids(entity, &S::type_ids())
    }

    /// Returns `true` if the entity has at least one component type in the
    /// set.
    pub fn has_any_of<S: ComponentSet>(&self, entity: Entity) -> bool {
        self.has_any_ids(entity, &S::type_ids())
    }

    /// Type-id variant of [`has_all_of`](Registry::has_all_of).
    pub fn has_all_ids(&self, entity: Entity, type_ids: &[ComponentTypeId]) -> bool {
        type_ids.iter().all(|type_id| self.has_by_id(entity, *type_id))
    }

    /// Type-id variant of [`has_any_of`](Registry::has_any_of).
    pub fn has_any_ids(&self, entity: Entity, type_ids: &[ComponentTypeId]) -> bool {
        type_ids.iter().any(|type_id| self.has_by_id(entity, *type_id))
    }

    /// Returns the typed storage for `T`, if one has been created.
    pub fn storage_of<T: Component>(&self) -> Option<&Storage<T>> {
        self.storages
            .get(&ComponentTypeId::of::<T>())
            .and_then(|storage| storage.downcast_ref::<Storage<T>>())
    }

    /// Mutable variant of [`storage_of`](Registry::storage_of).
    pub fn storage_of_mut<T: Component>(&mut self) -> Option<&mut Storage<T>> {
        self.storages
            .get_mut(&ComponentTypeId::of::<T>())
            .and_then(|storage| storage.downcast_mut::<Storage<T>>())
    }

    /// Returns the type-erased storage for a component type id.
    pub fn any_storage(&self, type_id: ComponentTypeId) -> Option<&dyn AnyStorage> {
        self.storages.get(&type_id).map(|storage| storage.as_ref())
    }

    /// Returns the typed storage for `T`, creating it on first use.
    pub fn get_or_create_storage<T: Component>(&mut self) -> &mut Storage<T> {
        let storage = self
            .storages
            .entry(ComponentTypeId::of::<T>())
            .or_insert_with(|| Box::new(Storage::<T>::new()));

        // The entry for this type id always holds a Storage<T>.
        storage
            .downcast_mut::<Storage<T>>()
            .unwrap_or_else(|| panic!("storage type mismatch for {}", ComponentTypeId::of::<T>()))
    }

    /// Returns `true` if a storage exists for the component type.
    pub fn has_storage<T: Component>(&self) -> bool {
        self.has_storage_id(ComponentTypeId::of::<T>())
    }

    /// Type-id variant of [`has_storage`](Registry::has_storage).
    pub fn has_storage_id(&self, type_id: ComponentTypeId) -> bool {
        self.storages.contains_key(&type_id)
    }

    /// Returns `true` if a storage exists for every type id in the list.
    pub fn has_all_storages(&self, type_ids: &[ComponentTypeId]) -> bool {
        type_ids.iter().all(|type_id| self.has_storage_id(*type_id))
    }

    /// Iterates the storages as `(type id, storage)` pairs.
    pub fn storages(&self) -> impl Iterator<Item = (ComponentTypeId, &dyn AnyStorage)> {
        self.storages
            .iter()
            .map(|(type_id, storage)| (*type_id, storage.as_ref()))
    }

    /// The number of distinct component types with a storage.
    pub fn storage_count(&self) -> usize { self.storages.len() }

    /// The number of live entities.
    pub fn entity_count(&self) -> usize { self.entity_index.len() }

    /// Iterates every live entity, in unspecified order.
    pub fn live_entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entity_index.keys().copied()
    }

    /// Returns the set of component types attached to a live entity.
    pub fn components_of(&self, entity: Entity) -> Option<&ComponentTypeSet> {
        self.entity_index.get(&entity)
    }

    /// Iterates `(entity, attached component types)` pairs, in unspecified
    /// order.
    pub fn entity_components(&self) -> impl Iterator<Item = (Entity, &ComponentTypeSet)> {
        self.entity_index.iter().map(|(entity, set)| (*entity, set))
    }

    pub(crate) fn entity_index(&self) -> &HashMap<Entity, ComponentTypeSet, EntityHasher> {
        &self.entity_index
    }
}
