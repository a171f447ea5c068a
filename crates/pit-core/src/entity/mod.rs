//! Entity identifiers and lifecycle flags.
//!
//! This module provides the core entity types for the arena simulation:
//! - [`EntityId`]: Unique identifier for entities
//! - [`EntityFlags`]: Lifecycle bits (dynamic body, destroyed)
//! - [`Entity`]: The identifier plus its flags
//!
//! Component data lives in separate per-type storage inside the
//! [`Arena`](crate::arena::Arena); an `Entity` only records that the id exists
//! and where it is in its lifecycle.
//!
//! # Example
//!
//! ```
//! use pit_core::entity::{Entity, EntityFlags, EntityId};
//!
//! let mut entity = Entity::new(EntityId::new(42), EntityFlags::DYNAMIC);
//! assert!(entity.is_dynamic());
//! assert!(!entity.is_destroyed());
//!
//! entity.mark_destroyed();
//! assert!(entity.is_destroyed());
//! ```

pub mod components;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use components::{
    Behavior, DeathReport, DieCallback, Rigidbody, Status, Strategy, TargetChoice, Tier,
    Transform,
};

/// Unique identifier for an entity.
///
/// `EntityId` is a newtype wrapper around `u64`. Ids are assigned
/// monotonically by the arena and never reused, so an id captured before an
/// entity was destroyed can always be checked for liveness later.
///
/// # Ordering
///
/// Entity IDs are ordered by their numeric value, which is used to ensure
/// deterministic iteration order across all entities.
///
/// # Example
///
/// ```
/// use pit_core::entity::EntityId;
///
/// let id1 = EntityId::new(1);
/// let id2 = EntityId::new(2);
///
/// assert!(id1 < id2);
/// assert_eq!(id1.as_u64(), 1);
/// ```
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Creates a new `EntityId` from a raw `u64` value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw `u64` value of this identifier.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

impl From<EntityId> for u64 {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

bitflags! {
    /// Lifecycle flags for an entity.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct EntityFlags: u8 {
        /// Moves and takes part in dynamic collision.
        const DYNAMIC = 0b0000_0001;
        /// Destroyed; components are released and lookups return nothing.
        const DESTROYED = 0b0000_0010;
    }
}

/// An entity record: id plus lifecycle flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    id: EntityId,
    flags: EntityFlags,
}

impl Entity {
    /// Creates a new entity record.
    #[must_use]
    pub const fn new(id: EntityId, flags: EntityFlags) -> Self {
        Self { id, flags }
    }

    /// Returns the entity's unique identifier.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Returns the entity's flags.
    #[must_use]
    pub const fn flags(&self) -> EntityFlags {
        self.flags
    }

    /// Returns `true` if this entity is a dynamic body.
    #[must_use]
    pub const fn is_dynamic(&self) -> bool {
        self.flags.contains(EntityFlags::DYNAMIC)
    }

    /// Returns `true` if this entity has been destroyed.
    #[must_use]
    pub const fn is_destroyed(&self) -> bool {
        self.flags.contains(EntityFlags::DESTROYED)
    }

    /// Sets the `DESTROYED` flag. Returns `true` if it was not already set.
    pub fn mark_destroyed(&mut self) -> bool {
        let was_alive = !self.is_destroyed();
        self.flags.insert(EntityFlags::DESTROYED);
        was_alive
    }
}
