//! Combat resolver: target selection, cooldown gating, damage and deaths.
//!
//! Runs after collision. Each tick it:
//! 1. Rebuilds every [`Behavior::colliding`] list from the frame's collision
//!    pairs, dropping pairs that involve destroyed entities
//! 2. Advances the cooldown accumulator and survived time of every living
//!    combatant
//! 3. Lets each living combatant, in id order, hit one colliding opponent if
//!    its cooldown has elapsed
//!
//! # Targeting
//!
//! - One colliding opponent is the forced target
//! - Several: the attacker's [`Strategy`] picks by tier, falling back to the
//!   opponent with the highest attack (first in colliding order on ties)
//!
//! # Damage
//!
//! The attacker's attack stat is modified by a roll: a [`CRIT_CHANCE`] chance
//! to add up to [`ROLL_SPREAD`], otherwise a [`MISS_CHANCE`] chance to
//! subtract up to [`ROLL_SPREAD`]. Rolled damage is never below one point.
//! Defense is applied by [`Status::take_hit`].

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::arena::Arena;
use crate::entity::{Behavior, EntityId, Status, Strategy, TargetChoice};
use crate::output::{CombatEvent, HitRoll, TickFrame};

use super::{Resolver, Stage, TickContext};

/// Probability of a critical hit.
pub const CRIT_CHANCE: f32 = 0.08;

/// Probability of a miss, checked only when the hit is not critical.
pub const MISS_CHANCE: f32 = 0.15;

/// Upper bound of the critical bonus and of the miss penalty.
pub const ROLL_SPREAD: f32 = 30.0;

/// Signature of the hit-roll function used by [`CombatResolver`].
pub type RollFn = fn(&mut ChaCha8Rng) -> HitRoll;

/// Rolls the class of one hit.
///
/// # Example
///
/// ```
/// use pit_core::output::HitRoll;
/// use pit_core::resolver::{compute_damage, roll_hit};
/// use rand::SeedableRng;
/// use rand_chacha::ChaCha8Rng;
///
/// let mut rng = ChaCha8Rng::seed_from_u64(7);
/// let roll = roll_hit(&mut rng);
/// assert!(compute_damage(10.0, roll) >= 1.0);
/// ```
pub fn roll_hit<R: Rng + ?Sized>(rng: &mut R) -> HitRoll {
    if rng.gen::<f32>() < CRIT_CHANCE {
        return HitRoll::Critical {
            bonus: rng.gen::<f32>() * ROLL_SPREAD,
        };
    }
    if rng.gen::<f32>() < MISS_CHANCE {
        return HitRoll::Miss {
            penalty: rng.gen::<f32>() * ROLL_SPREAD,
        };
    }
    HitRoll::Normal
}

/// Damage rolled by an attacker with `attack` before defense. Never below
/// one point.
#[must_use]
pub fn compute_damage(attack: f32, roll: HitRoll) -> f32 {
    let damage = match roll {
        HitRoll::Normal => attack,
        HitRoll::Critical { bonus } => attack + bonus,
        HitRoll::Miss { penalty } => attack - penalty,
    };
    damage.max(1.0)
}

/// Resolver for hits between colliding combatants.
///
/// Entities without a [`Status`] take no part in combat. Entities without a
/// [`Behavior`] are hit but never attack.
#[derive(Debug, Clone)]
pub struct CombatResolver {
    roll: RollFn,
}

impl Default for CombatResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl CombatResolver {
    /// Creates a combat resolver using [`roll_hit`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            roll: roll_hit::<ChaCha8Rng>,
        }
    }

    /// Creates a combat resolver with a custom roll.
    ///
    /// Useful for testing fixed hit classes.
    #[must_use]
    pub fn with_roll(roll: RollFn) -> Self {
        Self { roll }
    }

    /// Rebuilds colliding lists from this tick's pairs.
    fn collect_colliding(arena: &mut Arena, frame: &TickFrame) {
        for id in arena.ids_with::<Behavior>() {
            if let Some(behavior) = arena.get_mut::<Behavior>(id) {
                behavior.colliding.clear();
            }
        }

        for pair in &frame.collisions {
            let combatant = |id: EntityId| !arena.is_destroyed(id) && arena.get::<Status>(id).is_some();
            if !combatant(pair.a) || !combatant(pair.b) {
                continue;
            }
            if let Some(behavior) = arena.get_mut::<Behavior>(pair.a) {
                behavior.push_colliding(pair.b);
            }
            if let Some(behavior) = arena.get_mut::<Behavior>(pair.b) {
                behavior.push_colliding(pair.a);
            }
        }
    }

    /// Advances cooldown accumulators and survived time.
    fn advance_timers(arena: &mut Arena, ids: &[EntityId], dt: f32) {
        for &id in ids {
            let Some(status) = arena.get_mut::<Status>(id) else {
                continue;
            };
            if !status.is_alive() {
                continue;
            }
            status.survived += dt;
            if let Some(behavior) = arena.get_mut::<Behavior>(id) {
                behavior.refresh += dt;
            }
        }
    }

    /// Chooses which of `opponents` (non-empty, colliding order) to hit.
    fn choose_target(arena: &Arena, attacker: EntityId, opponents: &[EntityId]) -> Option<EntityId> {
        if let [only] = opponents {
            return Some(*only);
        }

        let tiered: Vec<_> = opponents
            .iter()
            .filter_map(|&id| arena.get::<Status>(id).map(|s| (id, s.tier())))
            .collect();
        let choice = arena
            .get::<Strategy>(attacker)
            .map_or(TargetChoice::Strongest, |strategy| strategy.pick(&tiered));

        match choice {
            TargetChoice::Target(id) => Some(id),
            TargetChoice::Strongest => {
                let attack = |id: &EntityId| arena.get::<Status>(*id).map_or(0.0, Status::attack);
                let mut ranked = opponents.to_vec();
                ranked.sort_by(|x, y| attack(y).total_cmp(&attack(x)));
                ranked.first().copied()
            }
        }
    }

    /// Lets `attacker` act for this tick.
    fn attack(&self, ctx: &mut TickContext<'_>, arena: &mut Arena, frame: &mut TickFrame, attacker: EntityId) {
        let Some((attack, cooldown)) = arena
            .get::<Status>(attacker)
            .filter(|s| s.is_alive())
            .map(|s| (s.attack(), s.cooldown()))
        else {
            return;
        };
        let Some(behavior) = arena.get::<Behavior>(attacker) else {
            return;
        };

        let opponents: Vec<EntityId> = behavior
            .colliding
            .iter()
            .copied()
            .filter(|&id| arena.get::<Status>(id).is_some_and(Status::is_alive))
            .collect();
        let ready = behavior.refresh >= cooldown;

        let target = if opponents.is_empty() {
            None
        } else {
            Self::choose_target(arena, attacker, &opponents)
        };
        let Some(target) = target.filter(|_| ready) else {
            if let Some(behavior) = arena.get_mut::<Behavior>(attacker) {
                behavior.attacking = false;
            }
            return;
        };

        let roll = (self.roll)(ctx.rng);
        let damage = compute_damage(attack, roll);
        let Some(victim) = arena.get_mut::<Status>(target) else {
            return;
        };
        let outcome = victim.take_hit(attacker, damage);
        let report = outcome.lethal.then(|| victim.death_report(target));

        frame.events.push(CombatEvent::Hit {
            attacker,
            target,
            roll,
            damage,
            applied: outcome.applied,
        });
        if let Some(behavior) = arena.get_mut::<Behavior>(attacker) {
            behavior.refresh = 0.0;
            behavior.attacking = true;
            behavior.target = Some(target);
        }

        if let Some(report) = report {
            if let Some(status) = arena.get_mut::<Status>(attacker) {
                status.kills += 1;
            }
            if let Some(victim) = arena.get_mut::<Status>(target) {
                victim.notify_death(report);
            }
            tracing::debug!(tick = ctx.tick, entity = %target, killer = %attacker, "combatant killed");
            frame.events.push(CombatEvent::Killed(report));
            arena.destroy(target);
        }
    }
}

impl Resolver for CombatResolver {
    fn stage(&self) -> Stage {
        Stage::Combat
    }

    fn resolve(&self, ctx: &mut TickContext<'_>, arena: &mut Arena, frame: &mut TickFrame) {
        Self::collect_colliding(arena, frame);

        let ids = arena.ids_with::<Status>();
        Self::advance_timers(arena, &ids, ctx.dt);

        for &id in &ids {
            if arena.is_destroyed(id) {
                continue;
            }
            self.attack(ctx, arena, frame, id);
        }
    }
}
