//! Contains the packed entity handle and its bit-level helpers.

use std::fmt::{self, Display};
use std::hash::BuildHasherDefault;

use super::hash::U64Hasher;

/// The number of low bits holding the entity id.
pub const ENTITY_SHIFT: u64 = 32;
/// Mask extracting the id part of a packed entity.
pub const ID_MASK: u64 = 0xFFFF_FFFF;
/// Mask extracting the version part of a packed entity (after shifting).
pub const VERSION_MASK: u64 = 0xFFFF_FFFF;

/// An opaque handle naming a logical object in a [`Registry`].
///
/// An entity packs an id and a version into a single `u64`: the id names a
/// slot that may be recycled, the version detects references that outlived a
/// [`Registry::destroy_entity`] call. A handle is only meaningful for the
/// registry that created it.
///
/// [`Registry`]: super::registry::Registry
/// [`Registry::destroy_entity`]: super::registry::Registry::destroy_entity
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Entity(u64);

impl Entity {
    /// The reserved null entity. Its id equals the id mask; it never names a
    /// live object and never appears in any storage.
    pub const NULL: Entity = Entity(ID_MASK | (VERSION_MASK << ENTITY_SHIFT));

    /// Packs an id and a version into an entity handle.
    #[inline]
    pub const fn from_parts(id: u32, version: u32) -> Self {
        Entity((id as u64 & ID_MASK) | ((version as u64 & VERSION_MASK) << ENTITY_SHIFT))
    }

    /// Reconstructs an entity from its raw underlying bits.
    #[inline]
    pub const fn from_bits(bits: u64) -> Self { Entity(bits) }

    /// Returns the raw underlying bits of the handle.
    #[inline]
    pub const fn to_bits(self) -> u64 { self.0 }

    /// Returns the id part of the handle.
    #[inline]
    pub const fn id(self) -> u32 { (self.0 & ID_MASK) as u32 }

    /// Returns the version part of the handle.
    #[inline]
    pub const fn version(self) -> u32 { ((self.0 >> ENTITY_SHIFT) & VERSION_MASK) as u32 }

    /// Returns `true` if this is the reserved null entity.
    #[inline]
    pub const fn is_null(self) -> bool { self.id() as u64 == ID_MASK }

    /// Returns the handle naming the same id at the next version.
    ///
    /// The version mask itself is reserved for [`Entity::NULL`] and is
    /// skipped: the successor of `VERSION_MASK - 1` is `1`, never the mask.
    #[inline]
    pub const fn next_version(self) -> Self {
        let next = self.version().wrapping_add(1);
        let next = if next as u64 == VERSION_MASK { 1 } else { next };
        Entity::from_parts(self.id(), next)
    }
}

impl Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.id(), self.version())
    }
}

/// A hasher for entity-keyed maps.
pub type EntityHasher = BuildHasherDefault<U64Hasher>;
