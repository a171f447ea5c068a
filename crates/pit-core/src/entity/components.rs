//! Component structs attached to entities.
//!
//! Each component kind has its own storage in the arena. Components hold only
//! data and the small amount of logic that belongs to that data (applying a
//! hit to a [`Status`], ranking candidates in a [`Strategy`]). Systems that
//! span several entities live in the resolvers.

use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::EntityId;

/// Shortest allowed attack cooldown, in seconds.
pub const MIN_COOLDOWN: f32 = 0.25;

/// Longest allowed attack cooldown, in seconds.
pub const MAX_COOLDOWN: f32 = 2.0;

// =============================================================================
// Transform / Rigidbody
// =============================================================================

/// Position and scale in normalized arena space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Centre position, `[-1, 1]` on both axes.
    pub position: Vec2,
    /// Non-uniform scale applied to collision extents.
    pub scale: Vec2,
}

impl Transform {
    /// Creates a transform at `position` with unit scale.
    #[must_use]
    pub const fn at(position: Vec2) -> Self {
        Self {
            position,
            scale: Vec2::ONE,
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::at(Vec2::ZERO)
    }
}

/// Velocity and collision volume of a dynamic body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rigidbody {
    /// Velocity in arena units per second.
    pub velocity: Vec2,
    /// Half width and half height of the collision box before scaling.
    pub half_extents: Vec2,
    /// Multiplier on collision velocity corrections.
    pub bounce: f32,
}

impl Rigidbody {
    /// Creates a resting body with square half extents and unit bounce.
    #[must_use]
    pub fn with_half_extent(half_extent: f32) -> Self {
        Self {
            velocity: Vec2::ZERO,
            half_extents: Vec2::splat(half_extent),
            bounce: 1.0,
        }
    }
}

// =============================================================================
// Tier
// =============================================================================

/// Creature class of a combatant, used as a targeting priority class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Winged creatures.
    Avian,
    /// Hounds.
    Hound,
    /// Insectoids.
    Insectoid,
    /// Serpents.
    Serpent,
    /// Wolves.
    Wolf,
    /// Any creature name not recognised above.
    Unknown,
}

impl Tier {
    /// Classifies a profile's creature name. Case and a trailing plural `s`
    /// are ignored; anything unrecognised is [`Tier::Unknown`].
    #[must_use]
    pub fn from_creature(name: &str) -> Self {
        let lower = name.trim().to_ascii_lowercase();
        let singular = lower.strip_suffix('s').unwrap_or(&lower);
        match singular {
            "avian" => Self::Avian,
            "hound" => Self::Hound,
            "insectoid" => Self::Insectoid,
            "serpent" => Self::Serpent,
            "wolf" | "wolve" => Self::Wolf,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Avian => "Avian",
            Self::Hound => "Hound",
            Self::Insectoid => "Insectoid",
            Self::Serpent => "Serpent",
            Self::Wolf => "Wolf",
            Self::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Status
// =============================================================================

/// What a combatant had accumulated when it died.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeathReport {
    /// The entity that died.
    pub entity: EntityId,
    /// The entity that landed the lethal hit, if any.
    pub killer: Option<EntityId>,
    /// Seconds survived in the fight.
    pub survived: f32,
    /// Kills scored before dying.
    pub kills: u32,
    /// Health after the lethal hit (zero or negative).
    pub final_health: f32,
}

/// Callback fired once when a combatant's health first drops to zero.
pub type DieCallback = Box<dyn FnOnce(DeathReport) + Send>;

/// Result of applying one hit to a [`Status`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitOutcome {
    /// Health actually removed.
    pub applied: f32,
    /// `true` only for the hit that took health to zero or below.
    pub lethal: bool,
}

/// Combat statistics and counters of a combatant.
///
/// `attack`, `defense`, `speed`, `cooldown`, `max_health` and `tier` are fixed
/// at creation. Health only ever goes down.
pub struct Status {
    attack: f32,
    defense: f32,
    speed: f32,
    cooldown: f32,
    max_health: f32,
    tier: Tier,
    /// Current health.
    pub health: f32,
    /// Seconds survived in the fight so far.
    pub survived: f32,
    /// Kills scored.
    pub kills: u32,
    /// The last entity that hit this one. Weak: may already be destroyed.
    pub last_hit: Option<EntityId>,
    dead: bool,
    on_die: Option<DieCallback>,
}

impl Status {
    /// Creates a status with full health and a cooldown derived from `speed`.
    #[must_use]
    pub fn new(attack: f32, defense: f32, speed: f32, health: f32) -> Self {
        Self {
            attack,
            defense,
            speed,
            cooldown: cooldown_for_speed(speed),
            max_health: health,
            tier: Tier::Unknown,
            health,
            survived: 0.0,
            kills: 0,
            last_hit: None,
            dead: false,
            on_die: None,
        }
    }

    /// Overrides the derived cooldown.
    #[must_use]
    pub fn with_cooldown(mut self, cooldown: f32) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Sets the creature tier.
    #[must_use]
    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = tier;
        self
    }

    /// Attack stat.
    #[must_use]
    pub fn attack(&self) -> f32 {
        self.attack
    }

    /// Defense stat.
    #[must_use]
    pub fn defense(&self) -> f32 {
        self.defense
    }

    /// Speed stat.
    #[must_use]
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Seconds required between two hits.
    #[must_use]
    pub fn cooldown(&self) -> f32 {
        self.cooldown
    }

    /// Health at creation.
    #[must_use]
    pub fn max_health(&self) -> f32 {
        self.max_health
    }

    /// Creature tier.
    #[must_use]
    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Returns `true` until the lethal hit lands.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.dead
    }

    /// Registers the die-callback, replacing any previous one.
    pub fn set_on_die(&mut self, callback: DieCallback) {
        self.on_die = Some(callback);
    }

    /// Applies `damage` rolled by `attacker`.
    ///
    /// Damage at or below defense chips a single point. Anything above
    /// defense removes the excess, never less than one point.
    pub fn take_hit(&mut self, attacker: EntityId, damage: f32) -> HitOutcome {
        self.last_hit = Some(attacker);
        let applied = if damage <= self.defense {
            1.0
        } else {
            (damage - self.defense).max(1.0)
        };
        self.health -= applied;

        let lethal = !self.dead && self.health <= 0.0;
        if lethal {
            self.dead = true;
        }
        HitOutcome { applied, lethal }
    }

    /// Builds the death report for `entity` from the current counters.
    #[must_use]
    pub fn death_report(&self, entity: EntityId) -> DeathReport {
        DeathReport {
            entity,
            killer: self.last_hit,
            survived: self.survived,
            kills: self.kills,
            final_health: self.health,
        }
    }

    /// Fires the die-callback with `report`. The callback is consumed, so
    /// later calls do nothing and return `false`.
    pub fn notify_death(&mut self, report: DeathReport) -> bool {
        match self.on_die.take() {
            Some(callback) => {
                callback(report);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Status")
            .field("attack", &self.attack)
            .field("defense", &self.defense)
            .field("speed", &self.speed)
            .field("cooldown", &self.cooldown)
            .field("max_health", &self.max_health)
            .field("tier", &self.tier)
            .field("health", &self.health)
            .field("survived", &self.survived)
            .field("kills", &self.kills)
            .field("last_hit", &self.last_hit)
            .field("dead", &self.dead)
            .field("on_die", &self.on_die.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

/// Attack cooldown for a speed stat: `60 / speed` seconds, clamped to
/// [`MIN_COOLDOWN`]..=[`MAX_COOLDOWN`]. Speeds below one count as one.
#[must_use]
pub fn cooldown_for_speed(speed: f32) -> f32 {
    (60.0 / speed.max(1.0)).clamp(MIN_COOLDOWN, MAX_COOLDOWN)
}

// =============================================================================
// Behavior
// =============================================================================

/// Per-tick combat state, rebuilt from collision output every tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Behavior {
    /// Opponents whose volume touches this entity this tick, in pair order.
    pub colliding: Vec<EntityId>,
    /// Nearest living opponent.
    pub nearest: Option<EntityId>,
    /// Seconds since the last hit.
    pub refresh: f32,
    /// Whether a hit landed this tick.
    pub attacking: bool,
    /// The last entity hit.
    pub target: Option<EntityId>,
}

impl Behavior {
    /// Records `other` as colliding unless already recorded.
    pub fn push_colliding(&mut self, other: EntityId) {
        if !self.colliding.contains(&other) {
            self.colliding.push(other);
        }
    }
}

// =============================================================================
// Strategy
// =============================================================================

/// Result of a [`Strategy`] pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetChoice {
    /// Attack this opponent.
    Target(EntityId),
    /// No tiered opponent; attack the one with the highest attack stat.
    Strongest,
}

/// Target-selection policy: an ordered list of preferred tiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strategy {
    tiers: Vec<Tier>,
}

impl Strategy {
    /// Creates a strategy preferring `tiers`, first element highest.
    #[must_use]
    pub fn new(tiers: Vec<Tier>) -> Self {
        Self { tiers }
    }

    /// Preferred tiers, highest first.
    #[must_use]
    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// Picks from `candidates` (id and tier, in colliding order).
    ///
    /// Walks the tiers in priority order and returns the first candidate of
    /// the first tier that has one.
    #[must_use]
    pub fn pick(&self, candidates: &[(EntityId, Tier)]) -> TargetChoice {
        self.tiers
            .iter()
            .find_map(|tier| candidates.iter().find(|(_, t)| t == tier))
            .map_or(TargetChoice::Strongest, |(id, _)| TargetChoice::Target(*id))
    }
}
