//! Contains types related to defining shared resources which can be
//! accessed inside systems.
//!
//! Use resources to share persistent data between systems or to provide a
//! system with state external to entities.

use std::collections::HashMap;
use std::fmt::{self, Display};
use std::hash::{BuildHasherDefault, Hasher};
use std::ops::{Deref, DerefMut};

use downcast_rs::{impl_downcast, Downcast};
use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::internals::hash::ComponentTypeIdHasher;

/// Unique ID for a resource type.
#[derive(Copy, Clone, Debug, Eq, PartialOrd, Ord)]
pub struct ResourceTypeId {
    type_id: std::any::TypeId,
    #[cfg(debug_assertions)]
    name: &'static str,
}

impl ResourceTypeId {
    /// Returns the resource type ID of the given resource type.
    pub fn of<T: Resource>() -> Self {
        Self {
            type_id: std::any::TypeId::of::<T>(),
            #[cfg(debug_assertions)]
            name: std::any::type_name::<T>(),
        }
    }
}

impl std::hash::Hash for ResourceTypeId {
    fn hash<H: Hasher>(&self, state: &mut H) { self.type_id.hash(state); }
}

impl PartialEq for ResourceTypeId {
    fn eq(&self, other: &Self) -> bool { self.type_id == other.type_id }
}

impl Display for ResourceTypeId {
    #[cfg(debug_assertions)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.name) }

    #[cfg(not(debug_assertions))]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{:?}", self.type_id) }
}

/// Blanket trait for resource types.
pub trait Resource: 'static + Downcast + Send + Sync {}
impl<T> Resource for T where T: 'static + Send + Sync {}
impl_downcast!(Resource);

/// Ergonomic wrapper holding a read lock on one resource.
pub struct Res<'a, T: Resource> {
    inner: MappedRwLockReadGuard<'a, T>,
}

impl<'a, T: Resource> Deref for Res<'a, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T { &self.inner }
}

impl<'a, T: Resource + fmt::Debug> fmt::Debug for Res<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.deref())
    }
}

/// Ergonomic wrapper holding a write lock on one resource.
pub struct ResMut<'a, T: Resource> {
    inner: MappedRwLockWriteGuard<'a, T>,
}

impl<'a, T: Resource> Deref for ResMut<'a, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T { &self.inner }
}

impl<'a, T: Resource> DerefMut for ResMut<'a, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T { &mut self.inner }
}

impl<'a, T: Resource + fmt::Debug> fmt::Debug for ResMut<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.deref())
    }
}

/// Resources container. Shared data stored here can be retrieved inside
/// systems.
///
/// Each entry sits behind its own `RwLock`, so systems running in parallel
/// block each other only when they touch the same resource. Structural
/// changes (`insert`/`remove`) take `&mut self` and therefore happen only
/// between stages, typically through the command queue.
#[derive(Default)]
pub struct Resources {
    storage: HashMap<
        ResourceTypeId,
        RwLock<Box<dyn Resource>>,
        BuildHasherDefault<ComponentTypeIdHasher>,
    >,
}

impl Resources {
    /// Returns `true` if type `T` exists in the store.
    pub fn contains<T: Resource>(&self) -> bool {
        self.storage.contains_key(&ResourceTypeId::of::<T>())
    }

    /// Inserts the instance of `T` into the store. An existing instance is
    /// silently overwritten; call `remove` first to retain it.
    pub fn insert<T: Resource>(&mut self, value: T) {
        self.storage
            .insert(ResourceTypeId::of::<T>(), RwLock::new(Box::new(value)));
    }

    /// Removes the type `T` from this store if it exists, returning the
    /// stored instance.
    pub fn remove<T: Resource>(&mut self) -> Option<T> {
        Some(
            *self
                .storage
                .remove(&ResourceTypeId::of::<T>())?
                .into_inner()
                .downcast::<T>()
                .ok()?,
        )
    }

    /// Retrieves an immutable reference to `T` from the store if it exists.
    ///
    /// Blocks while another system holds the resource mutably.
    pub fn get<T: Resource>(&self) -> Option<Res<'_, T>> {
        let lock = self.storage.get(&ResourceTypeId::of::<T>())?;
        let guard = RwLockReadGuard::try_map(lock.read(), |boxed| boxed.downcast_ref::<T>());
        match guard {
            Ok(inner) => Some(Res { inner }),
            // The entry for this type id always holds a T.
            Err(_) => None,
        }
    }

    /// Retrieves a mutable reference to `T` from the store if it exists.
    ///
    /// Blocks while another system holds the resource.
    pub fn get_mut<T: Resource>(&self) -> Option<ResMut<'_, T>> {
        let lock = self.storage.get(&ResourceTypeId::of::<T>())?;
        let guard = RwLockWriteGuard::try_map(lock.write(), |boxed| boxed.downcast_mut::<T>());
        match guard {
            Ok(inner) => Some(ResMut { inner }),
            Err(_) => None,
        }
    }

    /// Retrieves `T`, inserting the value built by `f` when absent.
    pub fn get_or_insert_with<T: Resource, F: FnOnce() -> T>(&mut self, f: F) -> ResMut<'_, T> {
        let lock = self
            .storage
            .entry(ResourceTypeId::of::<T>())
            .or_insert_with(|| RwLock::new(Box::new(f())));
        let guard = RwLockWriteGuard::try_map(lock.write(), |boxed| boxed.downcast_mut::<T>());
        match guard {
            Ok(inner) => ResMut { inner },
            Err(_) => unreachable!("the entry for a resource type id always holds that type"),
        }
    }

    /// The number of stored resources.
    pub fn len(&self) -> usize { self.storage.len() }

    /// Returns `true` if no resources are stored.
    pub fn is_empty(&self) -> bool { self.storage.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(usize);

    #[test]
    fn insert_get_remove_round_trip() {
        let mut resources = Resources::default();
        resources.insert(Counter(7));

        assert!(resources.contains::<Counter>());
        assert_eq!(resources.get::<Counter>().map(|c| c.0), Some(7));

        if let Some(mut counter) = resources.get_mut::<Counter>() {
            counter.0 = 9;
        }
        assert_eq!(resources.get::<Counter>().map(|c| c.0), Some(9));

        let removed = resources.remove::<Counter>();
        assert_eq!(removed.map(|c| c.0), Some(9));
        assert!(!resources.contains::<Counter>());
    }

    #[test]
    fn get_or_insert_with_builds_once() {
        let mut resources = Resources::default();
        resources.get_or_insert_with(|| Counter(1)).0 += 1;
        resources.get_or_insert_with(|| Counter(100)).0 += 1;
        assert_eq!(resources.get::<Counter>().map(|c| c.0), Some(3));
    }
}
