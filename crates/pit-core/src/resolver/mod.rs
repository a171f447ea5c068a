//! Resolver module: the per-tick systems.
//!
//! Resolvers mutate the arena in a fixed order each tick and record what they
//! did in the shared [`TickFrame`]. Later stages read what earlier stages
//! wrote.
//!
//! # Architecture
//!
//! Each resolver declares the [`Stage`] it runs in via [`Resolver::stage()`].
//! The simulation runs stages in ascending order:
//! 1. [`Stage::Collision`]: swept collision, velocity corrections, integration
//! 2. [`Stage::Combat`]: target selection, cooldown gating, damage and deaths
//! 3. [`Stage::Steering`]: nearest-opponent tracking, next tick's velocity
//!
//! # Invariants
//!
//! - Resolvers MUST be deterministic given the same arena, frame and RNG state
//! - Resolvers iterate entities in id or grid-insertion order only
//! - A resolver never aborts the tick; missing components are skipped
//!
//! # Available Resolvers
//!
//! - [`CollisionResolver`]: Dynamic and static collision response
//! - [`CombatResolver`]: Hits, damage and die-callbacks
//! - [`SteeringResolver`]: Chase the nearest living opponent

mod collision;
mod combat;
mod steering;

pub use collision::{CollisionResolver, SKIN, STATIC_CORRECTION};
pub use combat::{
    compute_damage, roll_hit, CombatResolver, RollFn, CRIT_CHANCE, MISS_CHANCE, ROLL_SPREAD,
};
pub use steering::SteeringResolver;

use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::arena::Arena;
use crate::output::TickFrame;

/// Fixed timestep at the default tick rate (1/60 second).
pub const FIXED_DT: f32 = 1.0 / 60.0;

/// Execution stage of a resolver within a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Collision detection and response.
    Collision,
    /// Combat resolution.
    Combat,
    /// Steering for the next tick.
    Steering,
}

/// Inputs shared by every resolver for one tick.
#[derive(Debug)]
pub struct TickContext<'a> {
    /// Tick being resolved.
    pub tick: u64,
    /// Step length in seconds.
    pub dt: f32,
    /// Seeded RNG for combat rolls.
    pub rng: &'a mut ChaCha8Rng,
}

/// A per-tick system.
///
/// # Example
///
/// ```
/// use pit_core::arena::Arena;
/// use pit_core::output::TickFrame;
/// use pit_core::resolver::{Resolver, Stage, TickContext};
///
/// struct CountCollisions;
///
/// impl Resolver for CountCollisions {
///     fn stage(&self) -> Stage {
///         Stage::Combat
///     }
///
///     fn resolve(&self, _ctx: &mut TickContext<'_>, _arena: &mut Arena, frame: &mut TickFrame) {
///         tracing::debug!(pairs = frame.collisions.len(), "collisions this tick");
///     }
/// }
/// ```
pub trait Resolver: Send + Sync {
    /// The stage this resolver runs in.
    fn stage(&self) -> Stage;

    /// Runs the resolver for one tick.
    ///
    /// # Invariants
    ///
    /// - Must be deterministic given the same inputs
    /// - Must not panic on missing components or destroyed entities
    fn resolve(&self, ctx: &mut TickContext<'_>, arena: &mut Arena, frame: &mut TickFrame);
}
