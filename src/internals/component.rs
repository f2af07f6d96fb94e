//! Contains types related to entity components and their type identifiers.

use std::fmt::{self, Display};
use std::hash::Hasher;

use smallvec::SmallVec;

/// A marker trait for all types which can be attached to an entity.
///
/// This trait has a blanket impl for all applicable types. Components are
/// plain values: the registry moves them in on attach and hands out
/// references afterwards. `Default` is required so type-erased storages can
/// insert a placeholder value without knowing the concrete type.
pub trait Component: 'static + Sized + Send + Sync + Default {}

impl<T: 'static + Sized + Send + Sync + Default> Component for T {}

/// FNV-1a over the compile-time signature of a type.
///
/// Stable within one build of one compiler; never persisted.
const fn fnv1a_64(bytes: &[u8]) -> u64 {
    const FNV_OFFSET_BASIS: u64 = 14_695_981_039_346_656_037;
    const FNV_PRIME: u64 = 1_099_511_628_211;

    let mut hash = FNV_OFFSET_BASIS;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hash
}

/// A unique ID for a component type.
#[derive(Copy, Clone, Debug, Eq, PartialOrd, Ord)]
pub struct ComponentTypeId {
    id: u64,
    #[cfg(debug_assertions)]
    name: &'static str,
}

impl ComponentTypeId {
    /// Constructs the component type ID for the given component type.
    pub fn of<T: Component>() -> Self {
        Self {
            id: fnv1a_64(std::any::type_name::<T>().as_bytes()),
            #[cfg(debug_assertions)]
            name: std::any::type_name::<T>(),
        }
    }

    /// Returns the underlying 64-bit hash of the component type.
    pub fn hash_value(&self) -> u64 { self.id }
}

impl std::hash::Hash for ComponentTypeId {
    fn hash<H: Hasher>(&self, state: &mut H) { state.write_u64(self.id); }
}

impl PartialEq for ComponentTypeId {
    fn eq(&self, other: &Self) -> bool { self.id == other.id }
}

impl Display for ComponentTypeId {
    #[cfg(debug_assertions)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.name) }

    #[cfg(not(debug_assertions))]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{:#x}", self.id) }
}

/// A short list of component type ids collected for one call.
pub type ComponentTypeIdList = SmallVec<[ComponentTypeId; 8]>;

/// Returns `true` if any component type id appears twice in the list.
pub fn has_duplicate_type_ids(type_ids: &[ComponentTypeId]) -> bool {
    for (i, type_id) in type_ids.iter().enumerate() {
        if type_ids[..i].contains(type_id) {
            return true;
        }
    }
    false
}

/// A static list of component types, named as a tuple.
///
/// Implemented for tuples of up to eight [`Component`] types, `()` included.
/// Used wherever an operation is parameterized over a set of component
/// types rather than component values: exclusion lists, bulk detaches,
/// `has_all_of`/`has_any_of` checks.
pub trait ComponentSet: 'static {
    /// The number of component types in the set.
    const LEN: usize;

    /// Collects the type ids of every component type in the set, in tuple
    /// order.
    fn type_ids() -> ComponentTypeIdList;
}

impl ComponentSet for () {
    const LEN: usize = 0;

    fn type_ids() -> ComponentTypeIdList { ComponentTypeIdList::new() }
}

macro_rules! count_types {
    () => { 0 };
    ($head_ty:ident $( $tail_ty:ident )*) => { 1 + count_types!($( $tail_ty )*) };
}

macro_rules! component_set_tuple {
    ($head_ty:ident) => {
        impl_component_set_tuple!($head_ty);
    };
    ($head_ty:ident, $( $tail_ty:ident ),*) => (
        impl_component_set_tuple!($head_ty, $( $tail_ty ),*);
        component_set_tuple!($( $tail_ty ),*);
    );
}

macro_rules! impl_component_set_tuple {
    ( $( $ty:ident ),* ) => {
        impl<$( $ty: Component ),*> ComponentSet for ($( $ty, )*) {
            const LEN: usize = count_types!($( $ty )*);

            fn type_ids() -> ComponentTypeIdList {
                let mut type_ids = ComponentTypeIdList::new();
                $( type_ids.push(ComponentTypeId::of::<$ty>()); )*
                type_ids
            }
        }
    };
}

component_set_tuple!(A, B, C, D, E, F, G, H);
