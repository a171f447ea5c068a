//! Arena module: the entity and component store.
//!
//! The Arena is the container for all entities in a match. It provides:
//! - Entity storage with deterministic iteration order (`BTreeMap`)
//! - Typed component storage, one map per component kind
//! - The broad-phase [`SpatialGrid`] keyed by entity id
//! - Tick tracking
//!
//! # Architecture
//!
//! Components are reached through the [`Component`] trait, which maps each
//! component type to its own storage at compile time. There is no runtime
//! type lookup:
//!
//! ```
//! use glam::Vec2;
//! use pit_core::arena::Arena;
//! use pit_core::entity::{Rigidbody, Transform};
//!
//! let mut arena = Arena::new(10, 10).unwrap();
//! let id = arena.create(Vec2::new(0.2, 0.0), true);
//! arena.attach(id, Rigidbody::with_half_extent(0.05));
//!
//! assert_eq!(arena.get::<Transform>(id).unwrap().position, Vec2::new(0.2, 0.0));
//! assert!(arena.add_dynamic(id));
//! ```
//!
//! # Destruction
//!
//! [`Arena::destroy`] keeps the entity record with its `DESTROYED` flag set and
//! releases every component. Ids captured before destruction stay valid keys:
//! lookups through them return `None`, and [`Arena::is_destroyed`] reports the
//! state so collision and combat output can be filtered.
//!
//! # Grid Synchronization
//!
//! The grid is not updated when a transform changes. Call
//! [`Arena::refresh_grid`] once per tick before collision testing.

use std::collections::BTreeMap;

use glam::Vec2;
use pit_grid::{Aabb, GridError, SpatialGrid};

use crate::entity::{Behavior, Entity, EntityFlags, EntityId, Rigidbody, Status, Strategy, Transform};

// =============================================================================
// Component storage
// =============================================================================

/// A component kind with its own storage in the [`Arena`].
pub trait Component: Sized + 'static {
    /// Storage for this component kind.
    fn storage(arena: &Arena) -> &BTreeMap<EntityId, Self>;

    /// Mutable storage for this component kind.
    fn storage_mut(arena: &mut Arena) -> &mut BTreeMap<EntityId, Self>;
}

macro_rules! component_storage {
    ($ty:ty, $field:ident) => {
        impl Component for $ty {
            fn storage(arena: &Arena) -> &BTreeMap<EntityId, Self> {
                &arena.$field
            }

            fn storage_mut(arena: &mut Arena) -> &mut BTreeMap<EntityId, Self> {
                &mut arena.$field
            }
        }
    };
}

component_storage!(Transform, transforms);
component_storage!(Rigidbody, rigidbodies);
component_storage!(Status, statuses);
component_storage!(Behavior, behaviors);
component_storage!(Strategy, strategies);

// =============================================================================
// Arena
// =============================================================================

/// Entity store for one match.
///
/// # Determinism
///
/// All storage is `BTreeMap` keyed by [`EntityId`]. Ids are assigned
/// monotonically, so iteration order is creation order on every platform.
#[derive(Debug)]
pub struct Arena {
    /// Monotonically increasing entity ID counter.
    next_id: u64,
    entities: BTreeMap<EntityId, Entity>,
    transforms: BTreeMap<EntityId, Transform>,
    rigidbodies: BTreeMap<EntityId, Rigidbody>,
    statuses: BTreeMap<EntityId, Status>,
    behaviors: BTreeMap<EntityId, Behavior>,
    strategies: BTreeMap<EntityId, Strategy>,
    grid: SpatialGrid<EntityId>,
    /// Current simulation tick.
    tick: u64,
}

impl Arena {
    /// Creates an empty arena over a `grid_width × grid_height` grid.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::ZeroDimension`] if either dimension is zero.
    pub fn new(grid_width: u32, grid_height: u32) -> Result<Self, GridError> {
        Ok(Self {
            next_id: 0,
            entities: BTreeMap::new(),
            transforms: BTreeMap::new(),
            rigidbodies: BTreeMap::new(),
            statuses: BTreeMap::new(),
            behaviors: BTreeMap::new(),
            strategies: BTreeMap::new(),
            grid: SpatialGrid::new(grid_width, grid_height)?,
            tick: 0,
        })
    }

    /// Creates an entity with a [`Transform`] at `position`.
    ///
    /// A dynamic entity still needs a [`Rigidbody`] and a call to
    /// [`Arena::add_dynamic`] before it takes part in collision.
    pub fn create(&mut self, position: Vec2, dynamic: bool) -> EntityId {
        let id = EntityId::new(self.next_id);
        self.next_id += 1;

        let flags = if dynamic {
            EntityFlags::DYNAMIC
        } else {
            EntityFlags::empty()
        };
        self.entities.insert(id, Entity::new(id, flags));
        self.transforms.insert(id, Transform::at(position));
        id
    }

    /// Attaches `component` to `id`, replacing any previous one of the same
    /// kind. Returns `false` and drops the component if the entity is unknown
    /// or destroyed.
    pub fn attach<C: Component>(&mut self, id: EntityId, component: C) -> bool {
        if !self.is_alive(id) {
            tracing::debug!(entity = %id, "attach to missing or destroyed entity ignored");
            return false;
        }
        C::storage_mut(self).insert(id, component);
        true
    }

    /// Returns the component of kind `C` on `id`, or `None` if the entity
    /// lacks it or is destroyed.
    #[must_use]
    pub fn get<C: Component>(&self, id: EntityId) -> Option<&C> {
        C::storage(self).get(&id)
    }

    /// Mutable counterpart of [`Arena::get`].
    #[must_use]
    pub fn get_mut<C: Component>(&mut self, id: EntityId) -> Option<&mut C> {
        C::storage_mut(self).get_mut(&id)
    }

    /// Returns the entity record, including destroyed ones.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Returns `true` if `id` exists and is not destroyed.
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.entities.get(&id).is_some_and(|e| !e.is_destroyed())
    }

    /// Returns `true` if `id` was destroyed. Unknown ids are not destroyed.
    #[must_use]
    pub fn is_destroyed(&self, id: EntityId) -> bool {
        self.entities.get(&id).is_some_and(Entity::is_destroyed)
    }

    /// Marks `id` destroyed, releases its components and removes it from the
    /// grid. Returns `true` on the first call for a live entity.
    pub fn destroy(&mut self, id: EntityId) -> bool {
        let Some(entity) = self.entities.get_mut(&id) else {
            return false;
        };
        if !entity.mark_destroyed() {
            return false;
        }
        self.transforms.remove(&id);
        self.rigidbodies.remove(&id);
        self.statuses.remove(&id);
        self.behaviors.remove(&id);
        self.strategies.remove(&id);
        self.grid.remove_dynamic(id);
        tracing::debug!(entity = %id, tick = self.tick, "entity destroyed");
        true
    }

    /// Live entity ids in ascending order.
    pub fn alive_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities
            .values()
            .filter(|e| !e.is_destroyed())
            .map(Entity::id)
    }

    /// Ids carrying a component of kind `C`, ascending.
    #[must_use]
    pub fn ids_with<C: Component>(&self) -> Vec<EntityId> {
        C::storage(self).keys().copied().collect()
    }

    /// Number of live entities.
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.entities.values().filter(|e| !e.is_destroyed()).count()
    }

    // =========================================================================
    // Grid
    // =========================================================================

    /// Collision box of `id` from its transform and rigidbody.
    #[must_use]
    pub fn aabb_of(&self, id: EntityId) -> Option<Aabb> {
        let transform = self.transforms.get(&id)?;
        let body = self.rigidbodies.get(&id)?;
        Some(Aabb::new(transform.position, body.half_extents * transform.scale))
    }

    /// Inserts `id` into the grid as a dynamic body.
    ///
    /// Returns `false` if the entity is destroyed, not dynamic, or has no
    /// rigidbody.
    pub fn add_dynamic(&mut self, id: EntityId) -> bool {
        if !self.entities.get(&id).is_some_and(|e| e.is_dynamic() && !e.is_destroyed()) {
            return false;
        }
        let Some(aabb) = self.aabb_of(id) else {
            tracing::warn!(entity = %id, "dynamic entity without rigidbody not added to grid");
            return false;
        };
        self.grid.add_dynamic(id, aabb);
        true
    }

    /// Removes `id` from the grid's dynamic bodies.
    pub fn remove_dynamic(&mut self, id: EntityId) -> bool {
        self.grid.remove_dynamic(id)
    }

    /// Marks a static obstacle cell. Out-of-range coordinates are ignored.
    pub fn add_static(&mut self, col: i64, row: i64) -> bool {
        self.grid.add_static(col, row)
    }

    /// Clears a static obstacle cell. Out-of-range coordinates are ignored.
    pub fn remove_static(&mut self, col: i64, row: i64) -> bool {
        self.grid.remove_static(col, row)
    }

    /// Recomputes every dynamic body's occupancy from its current transform.
    pub fn refresh_grid(&mut self) {
        let transforms = &self.transforms;
        let bodies = &self.rigidbodies;
        self.grid.refresh(|id| {
            let t = transforms.get(&id)?;
            let b = bodies.get(&id)?;
            Some(Aabb::new(t.position, b.half_extents * t.scale))
        });
    }

    /// Read access to the grid.
    #[must_use]
    pub fn grid(&self) -> &SpatialGrid<EntityId> {
        &self.grid
    }

    // =========================================================================
    // Tick
    // =========================================================================

    /// Returns the current simulation tick.
    #[must_use]
    pub const fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Advances the simulation tick counter.
    pub fn advance_tick(&mut self) {
        self.tick += 1;
    }
}

// =============================================================================
// Tests
// =============================================================================
