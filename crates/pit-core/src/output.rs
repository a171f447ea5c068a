//! Per-tick simulation output.
//!
//! Every call to [`Simulation::step`](crate::simulation::Simulation::step)
//! produces one [`TickFrame`]: the collision pairs found this tick and the
//! combat events raised while resolving them. Frames are regenerated from
//! scratch every tick; nothing carries over.
//!
//! # Ordering
//!
//! - `collisions` are in discovery order: ascending grid insertion index of
//!   the first body, then of the second.
//! - `events` are in the order they happened during combat resolution.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::entity::{DeathReport, EntityId};

/// Two dynamic bodies found touching during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollisionPair {
    /// Body tested first (lower grid insertion index).
    pub a: EntityId,
    /// Body tested against `a`.
    pub b: EntityId,
    /// Contact normal pointing from `b` towards `a`.
    pub normal: Vec2,
    /// Contact time within the tick, `0.0` for pre-existing overlap.
    pub time: f32,
}

impl CollisionPair {
    /// Returns `true` if `id` is either side of the pair.
    #[must_use]
    pub fn involves(&self, id: EntityId) -> bool {
        self.a == id || self.b == id
    }

    /// The other side of the pair, if `id` is one side.
    #[must_use]
    pub fn other(&self, id: EntityId) -> Option<EntityId> {
        if self.a == id {
            Some(self.b)
        } else if self.b == id {
            Some(self.a)
        } else {
            None
        }
    }
}

/// Outcome class of one attack roll.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum HitRoll {
    /// Plain hit for the attack stat.
    Normal,
    /// Critical hit; the bonus is added to the attack stat.
    Critical {
        /// Extra damage, `[0, 30)`.
        bonus: f32,
    },
    /// Glancing miss; the penalty is subtracted from the attack stat.
    Miss {
        /// Damage lost, `[0, 30)`.
        penalty: f32,
    },
}

/// Something that happened during combat resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CombatEvent {
    /// `attacker` landed a hit on `target`.
    Hit {
        /// Entity that attacked.
        attacker: EntityId,
        /// Entity that was hit.
        target: EntityId,
        /// The roll behind the hit.
        roll: HitRoll,
        /// Damage rolled, before defense.
        damage: f32,
        /// Health actually removed from the target.
        applied: f32,
    },
    /// A combatant died. Raised right after the lethal `Hit`.
    Killed(DeathReport),
}

/// Everything one tick produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickFrame {
    /// Tick number this frame belongs to.
    pub tick: u64,
    /// Touching pairs of live bodies.
    pub collisions: Vec<CollisionPair>,
    /// Combat events in occurrence order.
    pub events: Vec<CombatEvent>,
}

impl TickFrame {
    /// Creates an empty frame for `tick`.
    #[must_use]
    pub fn new(tick: u64) -> Self {
        Self {
            tick,
            ..Self::default()
        }
    }

    /// Iterates the `Hit` events as `(attacker, target, applied)`.
    pub fn hits(&self) -> impl Iterator<Item = (EntityId, EntityId, f32)> + '_ {
        self.events.iter().filter_map(|e| match e {
            CombatEvent::Hit {
                attacker,
                target,
                applied,
                ..
            } => Some((*attacker, *target, *applied)),
            CombatEvent::Killed(_) => None,
        })
    }

    /// Iterates the death reports raised this tick.
    pub fn deaths(&self) -> impl Iterator<Item = &DeathReport> + '_ {
        self.events.iter().filter_map(|e| match e {
            CombatEvent::Killed(report) => Some(report),
            CombatEvent::Hit { .. } => None,
        })
    }
}
