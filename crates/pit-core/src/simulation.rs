//! Simulation module with the fixed-step tick.
//!
//! The `Simulation` owns the [`Arena`], the resolvers and the seeded RNG, and
//! runs one tick per [`Simulation::step`] call:
//!
//! 1. **REFRESH**: Recompute every dynamic body's grid occupancy
//! 2. **RESOLVE**: Run each resolver in [`Stage`](crate::resolver::Stage)
//!    order against the arena, filling one [`TickFrame`]
//! 3. **ADVANCE**: Bump the tick counter
//!
//! A step never suspends and never fails; resolvers skip what they cannot
//! process.
//!
//! # Determinism
//!
//! Given the same seed, arena and sequence of `dt` values, the simulation
//! produces identical frames:
//! - Entities are iterated in ID order (via `BTreeMap`) or grid insertion order
//! - Combat rolls come from a `ChaCha8Rng` seeded once at construction
//! - Contact ordering uses a stable sort
//!
//! # Example
//!
//! ```
//! use glam::Vec2;
//! use pit_core::arena::Arena;
//! use pit_core::entity::{Rigidbody, Transform};
//! use pit_core::simulation::Simulation;
//!
//! let mut arena = Arena::new(10, 10).unwrap();
//! let id = arena.create(Vec2::ZERO, true);
//! arena.attach(id, Rigidbody::with_half_extent(0.05));
//! arena.add_dynamic(id);
//!
//! let mut sim = Simulation::new(arena, 42, 0.005);
//! for _ in 0..10 {
//!     sim.step(1.0 / 60.0);
//! }
//!
//! assert_eq!(sim.tick(), 10);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::arena::Arena;
use crate::entity::{Status, Transform};
use crate::output::TickFrame;
use crate::resolver::{CollisionResolver, CombatResolver, Resolver, SteeringResolver, TickContext};

// =============================================================================
// Simulation
// =============================================================================

/// The per-match simulation.
///
/// `Simulation` manages:
/// - The arena (entities, components, spatial grid)
/// - Resolvers, kept sorted by stage
/// - The seeded RNG shared by resolvers
pub struct Simulation {
    arena: Arena,
    resolvers: Vec<Box<dyn Resolver>>,
    rng: ChaCha8Rng,
    seed: u64,
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("arena", &self.arena)
            .field("resolvers", &format!("[{} resolvers]", self.resolvers.len()))
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

impl Simulation {
    /// Creates a simulation over `arena` with the default resolvers
    /// (Collision, Combat, Steering).
    ///
    /// # Arguments
    ///
    /// * `arena` - Populated arena to simulate
    /// * `seed` - Seed for combat rolls
    /// * `speed_scale` - Arena units per second per speed point
    #[must_use]
    pub fn new(arena: Arena, seed: u64, speed_scale: f32) -> Self {
        let mut sim = Self::bare(arena, seed);
        sim.add_resolver(Box::new(CollisionResolver::new()));
        sim.add_resolver(Box::new(CombatResolver::new()));
        sim.add_resolver(Box::new(SteeringResolver::new(speed_scale)));
        sim
    }

    /// Creates a simulation with no resolvers.
    ///
    /// Steps only refresh the grid and advance the tick until resolvers are
    /// added.
    #[must_use]
    pub fn bare(arena: Arena, seed: u64) -> Self {
        Self {
            arena,
            resolvers: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// Executes one tick of length `dt` seconds and returns what it produced.
    pub fn step(&mut self, dt: f32) -> TickFrame {
        let tick = self.arena.current_tick();
        let mut frame = TickFrame::new(tick);

        // REFRESH
        self.arena.refresh_grid();

        // RESOLVE
        let mut ctx = TickContext {
            tick,
            dt,
            rng: &mut self.rng,
        };
        for resolver in &self.resolvers {
            resolver.resolve(&mut ctx, &mut self.arena, &mut frame);
        }

        // ADVANCE
        self.arena.advance_tick();
        frame
    }

    /// Adds a resolver. Resolvers run in stage order; within a stage, in the
    /// order they were added.
    pub fn add_resolver(&mut self, resolver: Box<dyn Resolver>) {
        self.resolvers.push(resolver);
        self.resolvers.sort_by_key(|r| r.stage());
    }

    /// Returns the number of resolvers in the simulation.
    #[must_use]
    pub fn resolver_count(&self) -> usize {
        self.resolvers.len()
    }

    /// Returns a read-only reference to the arena.
    #[must_use]
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Returns a mutable reference to the arena.
    ///
    /// Use this for setup between steps (spawning, registering callbacks).
    #[must_use]
    pub fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }

    /// Returns the current simulation tick.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.arena.current_tick()
    }

    /// Returns the seed combat rolls were drawn from.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Hash of the grid, positions and health of every live entity.
    ///
    /// Two simulations with equal hashes are in the same observable state.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        pit_grid::hash_grid(self.arena.grid()).hash(&mut hasher);
        self.arena.current_tick().hash(&mut hasher);
        for id in self.arena.alive_ids() {
            id.hash(&mut hasher);
            if let Some(t) = self.arena.get::<Transform>(id) {
                t.position.x.to_bits().hash(&mut hasher);
                t.position.y.to_bits().hash(&mut hasher);
            }
            if let Some(s) = self.arena.get::<Status>(id) {
                s.health.to_bits().hash(&mut hasher);
                s.kills.hash(&mut hasher);
            }
        }
        hasher.finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{Stage, FIXED_DT};
    use crate::tests::{spawn_body, spawn_fighter};
    use glam::Vec2;
    use std::sync::{Arc, Mutex};

    // Records the order stages ran in.
    struct Probe {
        stage: Stage,
        log: Arc<Mutex<Vec<Stage>>>,
    }

    impl Resolver for Probe {
        fn stage(&self) -> Stage {
            self.stage
        }

        fn resolve(&self, _ctx: &mut TickContext<'_>, _arena: &mut Arena, _frame: &mut TickFrame) {
            self.log.lock().unwrap().push(self.stage);
        }
    }

    fn arena() -> Arena {
        Arena::new(10, 10).unwrap()
    }

    #[test]
    fn new_has_default_resolvers() {
        let sim = Simulation::new(arena(), 1, 0.005);
        assert_eq!(sim.resolver_count(), 3);
        assert_eq!(sim.tick(), 0);
        assert_eq!(sim.seed(), 1);
    }

    #[test]
    fn step_advances_tick_and_stamps_frame() {
        let mut sim = Simulation::bare(arena(), 1);
        let first = sim.step(FIXED_DT);
        let second = sim.step(FIXED_DT);
        assert_eq!(first.tick, 0);
        assert_eq!(second.tick, 1);
        assert_eq!(sim.tick(), 2);
    }

    #[test]
    fn resolvers_run_in_stage_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut sim = Simulation::bare(arena(), 1);
        for stage in [Stage::Steering, Stage::Collision, Stage::Combat] {
            sim.add_resolver(Box::new(Probe {
                stage,
                log: Arc::clone(&log),
            }));
        }

        sim.step(FIXED_DT);
        assert_eq!(*log.lock().unwrap(), vec![Stage::Collision, Stage::Combat, Stage::Steering]);
    }

    #[test]
    fn step_refreshes_grid_before_collision() {
        let mut a = arena();
        let left = spawn_body(&mut a, Vec2::new(-0.5, 0.0), Vec2::ZERO);
        let right = spawn_body(&mut a, Vec2::new(0.5, 0.0), Vec2::ZERO);
        let mut sim = Simulation::bare(a, 1);
        sim.add_resolver(Box::new(CollisionResolver::new()));

        // Teleport into overlap without touching the grid.
        sim.arena_mut().get_mut::<Transform>(left).unwrap().position = Vec2::new(0.46, 0.0);

        let frame = sim.step(FIXED_DT);
        assert_eq!(frame.collisions.len(), 1);
        assert!(frame.collisions[0].involves(right));
    }

    #[test]
    fn fighters_close_in_and_collide() {
        let mut a = arena();
        spawn_fighter(&mut a, Vec2::new(-0.2, 0.0), Status::new(10.0, 0.0, 100.0, 500.0));
        spawn_fighter(&mut a, Vec2::new(0.2, 0.0), Status::new(10.0, 0.0, 100.0, 500.0));
        let mut sim = Simulation::new(a, 7, 0.01);

        let collided = (0..120).any(|_| !sim.step(FIXED_DT).collisions.is_empty());
        assert!(collided);
    }

    #[test]
    fn state_hash_tracks_changes() {
        let mut a = arena();
        spawn_fighter(&mut a, Vec2::new(-0.2, 0.0), Status::new(10.0, 0.0, 100.0, 500.0));
        let mut sim = Simulation::new(a, 7, 0.01);
        let before = sim.state_hash();
        sim.step(FIXED_DT);
        assert_ne!(before, sim.state_hash());
    }

    #[test]
    fn debug_summarizes_resolvers() {
        let sim = Simulation::new(arena(), 1, 0.005);
        assert!(format!("{sim:?}").contains("[3 resolvers]"));
    }
}
