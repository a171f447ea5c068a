//! Collision resolver: swept dynamic and static collision, then integration.
//!
//! The `CollisionResolver` handles, in order:
//! - Broad phase: each dynamic body `i` against the later bodies sharing a
//!   grid bucket with it
//! - Narrow phase: swept-volume test on the relative displacement over `dt`
//! - Dynamic response: pairs sorted by contact time, velocity pushed apart
//!   along the normal, pre-existing overlaps separated positionally until
//!   none remain
//! - Static response: the same against occupied neighbour cells, with an
//!   amplified correction
//! - Integration: `position += velocity * dt`, clamped inside the arena
//!
//! Every intersecting dynamic pair is written to [`TickFrame::collisions`]
//! in discovery order, whatever order it is resolved in.

use glam::Vec2;
use pit_grid::{sweep, Aabb, Contact, ARENA_MAX, ARENA_MIN};

use crate::arena::Arena;
use crate::entity::{EntityId, Rigidbody, Transform};
use crate::output::{CollisionPair, TickFrame};

use super::{Resolver, Stage, TickContext};

/// Extra separation added when pushing overlapping boxes apart.
pub const SKIN: f32 = 1e-4;

/// Correction multiplier against static cells, biasing bodies off walls.
pub const STATIC_CORRECTION: f32 = 1.001;

/// Upper bound on positional separation passes per tick.
const MAX_SEPARATION_PASSES: usize = 64;

/// A dynamic pair found by the narrow phase.
#[derive(Debug, Clone, Copy)]
struct Impact {
    a: EntityId,
    b: EntityId,
    contact: Contact,
}

/// Resolver for collision detection, response and position integration.
///
/// # Example
///
/// ```
/// use glam::Vec2;
/// use pit_core::arena::Arena;
/// use pit_core::entity::Rigidbody;
/// use pit_core::output::TickFrame;
/// use pit_core::resolver::{CollisionResolver, Resolver, TickContext, FIXED_DT};
/// use rand::SeedableRng;
/// use rand_chacha::ChaCha8Rng;
///
/// let mut arena = Arena::new(10, 10).unwrap();
/// let id = arena.create(Vec2::ZERO, true);
/// arena.attach(id, Rigidbody::with_half_extent(0.05));
/// arena.get_mut::<Rigidbody>(id).unwrap().velocity = Vec2::new(0.6, 0.0);
/// arena.add_dynamic(id);
///
/// let mut rng = ChaCha8Rng::seed_from_u64(0);
/// let mut ctx = TickContext { tick: 0, dt: FIXED_DT, rng: &mut rng };
/// let mut frame = TickFrame::new(0);
/// CollisionResolver::new().resolve(&mut ctx, &mut arena, &mut frame);
///
/// assert!(frame.collisions.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CollisionResolver;

impl CollisionResolver {
    /// Creates a collision resolver.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Narrow-phase test of every broad-phase candidate pair.
    fn find_impacts(arena: &Arena, dt: f32) -> Vec<Impact> {
        let grid = arena.grid();
        let mut impacts = Vec::new();

        for i in 0..grid.dynamic_count() {
            let Some(a) = grid.key_at(i) else { continue };
            let Some((a_box, a_velocity)) = Self::body(arena, a) else {
                continue;
            };

            for j in grid.candidates(i) {
                let Some(b) = grid.key_at(j) else { continue };
                let Some((b_box, b_velocity)) = Self::body(arena, b) else {
                    continue;
                };
                let displacement = (a_velocity - b_velocity) * dt;
                if let Some(contact) = sweep(&a_box, displacement, &b_box) {
                    impacts.push(Impact { a, b, contact });
                }
            }
        }
        impacts
    }

    /// Box and velocity of a live dynamic body.
    fn body(arena: &Arena, id: EntityId) -> Option<(Aabb, Vec2)> {
        if arena.is_destroyed(id) {
            return None;
        }
        let aabb = arena.aabb_of(id)?;
        let velocity = arena.get::<Rigidbody>(id)?.velocity;
        Some((aabb, velocity))
    }

    /// Applies velocity and overlap corrections for one dynamic pair.
    fn resolve_pair(arena: &mut Arena, impact: &Impact) {
        let Impact { a, b, contact } = *impact;
        let (Some(body_a), Some(body_b)) = (
            arena.get::<Rigidbody>(a).copied(),
            arena.get::<Rigidbody>(b).copied(),
        ) else {
            return;
        };

        let (velocity_a, velocity_b) = if contact.is_degenerate() {
            (Vec2::ZERO, Vec2::ZERO)
        } else {
            let n = contact.normal;
            let remaining = 1.0 - contact.time;
            (
                body_a.velocity + n * body_a.velocity.length() * remaining * body_a.bounce,
                body_b.velocity - n * body_b.velocity.length() * remaining * body_b.bounce,
            )
        };
        if let Some(body) = arena.get_mut::<Rigidbody>(a) {
            body.velocity = velocity_a;
        }
        if let Some(body) = arena.get_mut::<Rigidbody>(b) {
            body.velocity = velocity_b;
        }

        if contact.is_resting() {
            Self::separate_pair(arena, a, b);
        }
    }

    /// Pushes `a` and `b` apart by their current overlap plus [`SKIN`],
    /// split evenly. Returns `false` if they no longer overlap.
    fn separate_pair(arena: &mut Arena, a: EntityId, b: EntityId) -> bool {
        let (Some(box_a), Some(box_b)) = (arena.aabb_of(a), arena.aabb_of(b)) else {
            return false;
        };
        let Some(contact) = sweep(&box_a, Vec2::ZERO, &box_b).filter(Contact::is_resting) else {
            return false;
        };
        let push = contact.normal * (contact.penetration + SKIN) * 0.5;
        if let Some(t) = arena.get_mut::<Transform>(a) {
            t.position += push;
        }
        if let Some(t) = arena.get_mut::<Transform>(b) {
            t.position -= push;
        }
        true
    }

    /// Repeats positional separation until no two dynamic bodies overlap.
    ///
    /// Separating one pair can push a body into a third, so each pass
    /// refreshes the grid and re-tests every candidate pair.
    fn relax(arena: &mut Arena, tick: u64) {
        for _ in 0..MAX_SEPARATION_PASSES {
            arena.refresh_grid();
            let grid = arena.grid();
            let pairs: Vec<(EntityId, EntityId)> = (0..grid.dynamic_count())
                .filter_map(|i| Some((i, grid.key_at(i)?)))
                .flat_map(|(i, a)| {
                    grid.candidates(i)
                        .into_iter()
                        .filter_map(move |j| Some((a, grid.key_at(j)?)))
                })
                .filter(|&(a, b)| !arena.is_destroyed(a) && !arena.is_destroyed(b))
                .collect();

            let mut moved = false;
            for (a, b) in pairs {
                moved |= Self::separate_pair(arena, a, b);
            }
            if !moved {
                return;
            }
        }
        tracing::debug!(tick, passes = MAX_SEPARATION_PASSES, "overlaps left after separation");
    }

    /// Resolves one dynamic body against its occupied neighbour cells.
    fn resolve_statics(arena: &mut Arena, id: EntityId, dt: f32) {
        let Some((aabb, velocity)) = Self::body(arena, id) else {
            return;
        };
        let grid = arena.grid();
        let anchor = grid.cell_of(aabb.center);

        let mut contacts: Vec<Contact> = grid
            .static_neighbors(anchor)
            .into_iter()
            .filter_map(|cell| sweep(&aabb, velocity * dt, &grid.static_aabb(cell)))
            .collect();
        if contacts.is_empty() {
            return;
        }
        contacts.sort_by(|x, y| x.time.abs().total_cmp(&y.time.abs()));

        let mut push = Vec2::ZERO;
        let Some(body) = arena.get_mut::<Rigidbody>(id) else {
            return;
        };
        for contact in &contacts {
            if contact.is_degenerate() {
                body.velocity = Vec2::ZERO;
                continue;
            }
            let n = contact.normal;
            body.velocity +=
                n * body.velocity.length() * (1.0 - contact.time) * STATIC_CORRECTION * body.bounce;
            if contact.is_resting() {
                push += n * (contact.penetration + SKIN);
            }
        }
        if push != Vec2::ZERO {
            if let Some(t) = arena.get_mut::<Transform>(id) {
                t.position += push;
            }
        }
    }

    /// Moves every dynamic body by its velocity and keeps its box inside
    /// the arena.
    fn integrate(arena: &mut Arena, ids: &[EntityId], dt: f32) {
        for &id in ids {
            let Some(velocity) = arena.get::<Rigidbody>(id).map(|b| b.velocity) else {
                continue;
            };
            let Some(half) = arena.aabb_of(id).map(|aabb| aabb.half_extents) else {
                continue;
            };
            let Some(t) = arena.get_mut::<Transform>(id) else {
                continue;
            };
            let lo = Vec2::splat(ARENA_MIN) + half;
            let hi = (Vec2::splat(ARENA_MAX) - half).max(lo);
            t.position = (t.position + velocity * dt).max(lo).min(hi);
        }
    }
}

impl Resolver for CollisionResolver {
    fn stage(&self) -> Stage {
        Stage::Collision
    }

    fn resolve(&self, ctx: &mut TickContext<'_>, arena: &mut Arena, frame: &mut TickFrame) {
        let dt = ctx.dt;
        let mut impacts = Self::find_impacts(arena, dt);

        frame.collisions = impacts
            .iter()
            .map(|impact| CollisionPair {
                a: impact.a,
                b: impact.b,
                normal: impact.contact.normal,
                time: impact.contact.time,
            })
            .collect();

        // Stable: equal contact times keep discovery order.
        impacts.sort_by(|x, y| x.contact.time.abs().total_cmp(&y.contact.time.abs()));
        for impact in &impacts {
            Self::resolve_pair(arena, impact);
        }
        if impacts.iter().any(|impact| impact.contact.is_resting()) {
            Self::relax(arena, ctx.tick);
        }

        let ids: Vec<EntityId> = arena.grid().dynamics().map(|(id, _)| id).collect();
        for &id in &ids {
            Self::resolve_statics(arena, id, dt);
        }
        Self::integrate(arena, &ids, dt);

        if !impacts.is_empty() {
            tracing::debug!(tick = ctx.tick, pairs = impacts.len(), "collisions resolved");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::FIXED_DT;
    use crate::tests::{run_resolver, spawn_body};

    fn arena() -> Arena {
        Arena::new(10, 10).unwrap()
    }

    fn velocity(arena: &Arena, id: EntityId) -> Vec2 {
        arena.get::<Rigidbody>(id).unwrap().velocity
    }

    fn position(arena: &Arena, id: EntityId) -> Vec2 {
        arena.get::<Transform>(id).unwrap().position
    }

    fn assert_separated(arena: &Arena, ids: &[EntityId]) {
        for (n, &x) in ids.iter().enumerate() {
            for &y in &ids[n + 1..] {
                let (bx, by) = (arena.aabb_of(x).unwrap(), arena.aabb_of(y).unwrap());
                assert!(!bx.intersects(&by), "{x} still overlaps {y}");
            }
        }
    }

    mod dynamic_tests {
        use super::*;

        #[test]
        fn single_collision_pushes_apart() {
            let mut a = arena();
            let left = spawn_body(&mut a, Vec2::new(-0.04, 0.0), Vec2::new(1.0, 0.0));
            let right = spawn_body(&mut a, Vec2::new(0.04, 0.0), Vec2::ZERO);

            let frame = run_resolver(&CollisionResolver::new(), &mut a, FIXED_DT);

            assert_eq!(frame.collisions.len(), 1);
            let pair = frame.collisions[0];
            assert_eq!((pair.a, pair.b), (left, right));
            assert_eq!(pair.normal, Vec2::new(-1.0, 0.0));
            assert_eq!(pair.time, 0.0);

            assert!(velocity(&a, left).length() < 1e-6);
            assert_eq!(velocity(&a, right), Vec2::ZERO);

            let box_l = a.aabb_of(left).unwrap();
            let box_r = a.aabb_of(right).unwrap();
            assert!(!box_l.intersects(&box_r));
            assert!(position(&a, left).x < position(&a, right).x);
        }

        #[test]
        fn separated_bodies_do_not_collide() {
            let mut a = arena();
            spawn_body(&mut a, Vec2::new(-0.5, 0.0), Vec2::ZERO);
            spawn_body(&mut a, Vec2::new(0.5, 0.0), Vec2::ZERO);
            let frame = run_resolver(&CollisionResolver::new(), &mut a, FIXED_DT);
            assert!(frame.collisions.is_empty());
        }

        #[test]
        fn swept_contact_within_step() {
            let mut a = arena();
            // Edges 0.02 apart inside cell (6, 4); closing 0.025 per step.
            let left = spawn_body(&mut a, Vec2::new(0.24, 0.1), Vec2::new(1.5, 0.0));
            let right = spawn_body(&mut a, Vec2::new(0.36, 0.1), Vec2::ZERO);

            let frame = run_resolver(&CollisionResolver::new(), &mut a, FIXED_DT);

            assert_eq!(frame.collisions.len(), 1);
            let pair = frame.collisions[0];
            assert!((pair.time - 0.8).abs() < 1e-3);
            assert_eq!(pair.normal, Vec2::new(-1.0, 0.0));
            assert!(velocity(&a, left).x < 1.5);
            assert_eq!(velocity(&a, right), Vec2::ZERO);
        }

        #[test]
        fn head_on_corner_stops_both() {
            let mut a = arena();
            // Diagonal approach entering both slabs at the same instant.
            let mover = spawn_body(&mut a, Vec2::new(0.24, -0.24), Vec2::new(1.2, -1.2));
            let other = spawn_body(&mut a, Vec2::new(0.36, -0.36), Vec2::new(-1.2, 1.2));

            let frame = run_resolver(&CollisionResolver::new(), &mut a, FIXED_DT);

            assert_eq!(frame.collisions.len(), 1);
            assert_eq!(frame.collisions[0].normal, Vec2::ZERO);
            assert_eq!(velocity(&a, mover), Vec2::ZERO);
            assert_eq!(velocity(&a, other), Vec2::ZERO);
        }

        #[test]
        fn pairs_recorded_in_discovery_order() {
            let mut a = arena();
            let x = spawn_body(&mut a, Vec2::new(0.0, 0.0), Vec2::ZERO);
            let y = spawn_body(&mut a, Vec2::new(0.06, 0.0), Vec2::ZERO);
            let z = spawn_body(&mut a, Vec2::new(-0.06, 0.0), Vec2::ZERO);

            let frame = run_resolver(&CollisionResolver::new(), &mut a, FIXED_DT);
            let pairs: Vec<_> = frame.collisions.iter().map(|p| (p.a, p.b)).collect();
            assert_eq!(pairs, vec![(x, y), (x, z)]);
        }

        #[test]
        fn shared_body_separates_from_both() {
            let mut a = arena();
            let ids = [
                spawn_body(&mut a, Vec2::new(0.0, 0.0), Vec2::ZERO),
                spawn_body(&mut a, Vec2::new(0.06, 0.0), Vec2::ZERO),
                spawn_body(&mut a, Vec2::new(-0.06, 0.0), Vec2::ZERO),
            ];

            run_resolver(&CollisionResolver::new(), &mut a, FIXED_DT);

            assert_separated(&a, &ids);
            assert!(position(&a, ids[2]).x < position(&a, ids[0]).x);
            assert!(position(&a, ids[0]).x < position(&a, ids[1]).x);
            let again = run_resolver(&CollisionResolver::new(), &mut a, FIXED_DT);
            assert!(again.collisions.is_empty());
        }

        #[test]
        fn cluster_settles_without_oscillating() {
            let mut a = arena();
            let ids: Vec<_> = [(0.0, 0.0), (0.03, 0.02), (-0.02, 0.04), (0.05, -0.03), (-0.04, -0.01)]
                .into_iter()
                .map(|(x, y)| spawn_body(&mut a, Vec2::new(x, y), Vec2::ZERO))
                .collect();

            run_resolver(&CollisionResolver::new(), &mut a, FIXED_DT);
            assert_separated(&a, &ids);
            let settled: Vec<_> = ids.iter().map(|&id| position(&a, id)).collect();

            for _ in 0..5 {
                let frame = run_resolver(&CollisionResolver::new(), &mut a, FIXED_DT);
                assert!(frame.collisions.is_empty());
            }
            let after: Vec<_> = ids.iter().map(|&id| position(&a, id)).collect();
            assert_eq!(settled, after);
        }

        #[test]
        fn destroyed_bodies_are_skipped() {
            let mut a = arena();
            let left = spawn_body(&mut a, Vec2::new(-0.04, 0.0), Vec2::new(1.0, 0.0));
            let right = spawn_body(&mut a, Vec2::new(0.04, 0.0), Vec2::ZERO);
            a.destroy(right);

            let frame = run_resolver(&CollisionResolver::new(), &mut a, FIXED_DT);
            assert!(frame.collisions.is_empty());
            assert_eq!(velocity(&a, left), Vec2::new(1.0, 0.0));
        }
    }

    mod static_tests {
        use super::*;

        #[test]
        fn wall_contact_stops_approach() {
            let mut a = arena();
            // Cell (6, 4) spans x [0.2, 0.4], y [0.0, 0.2].
            a.add_static(6, 4);
            let id = spawn_body(&mut a, Vec2::new(0.14, 0.1), Vec2::new(1.0, 0.0));

            run_resolver(&CollisionResolver::new(), &mut a, FIXED_DT);

            assert!(velocity(&a, id).x < 1.0);
            let wall = a.grid().static_aabb(pit_grid::CellCoord::new(6, 4));
            assert!(!a.aabb_of(id).unwrap().intersects(&wall));
        }

        #[test]
        fn overlapping_wall_pushes_out() {
            let mut a = arena();
            a.add_static(6, 4);
            let id = spawn_body(&mut a, Vec2::new(0.17, 0.1), Vec2::ZERO);

            run_resolver(&CollisionResolver::new(), &mut a, FIXED_DT);

            let wall = a.grid().static_aabb(pit_grid::CellCoord::new(6, 4));
            assert!(!a.aabb_of(id).unwrap().intersects(&wall));
            assert!(position(&a, id).x < 0.15);
        }

        #[test]
        fn statics_are_not_mutated() {
            let mut a = arena();
            a.add_static(6, 4);
            spawn_body(&mut a, Vec2::new(0.17, 0.1), Vec2::new(1.0, 0.0));
            run_resolver(&CollisionResolver::new(), &mut a, FIXED_DT);
            assert_eq!(a.grid().static_count(), 1);
            assert!(a.grid().is_static(pit_grid::CellCoord::new(6, 4)));
        }
    }

    mod integration_tests {
        use super::*;

        #[test]
        fn integrates_velocity() {
            let mut a = arena();
            let id = spawn_body(&mut a, Vec2::ZERO, Vec2::new(0.6, -0.3));
            run_resolver(&CollisionResolver::new(), &mut a, 0.5);
            assert!((position(&a, id) - Vec2::new(0.3, -0.15)).length() < 1e-6);
        }

        #[test]
        fn clamps_inside_arena() {
            let mut a = arena();
            let id = spawn_body(&mut a, Vec2::new(0.9, -0.9), Vec2::new(10.0, -10.0));
            run_resolver(&CollisionResolver::new(), &mut a, FIXED_DT);
            let p = position(&a, id);
            assert!((p.x - 0.95).abs() < 1e-6);
            assert!((p.y + 0.95).abs() < 1e-6);
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn resolved_overlap_stays_resolved(
                ax in -0.5f32..0.5,
                ay in -0.5f32..0.5,
                dx in -0.09f32..0.09,
                dy in -0.09f32..0.09,
            ) {
                let mut a = arena();
                let first = spawn_body(&mut a, Vec2::new(ax, ay), Vec2::ZERO);
                let second = spawn_body(&mut a, Vec2::new(ax + dx, ay + dy), Vec2::ZERO);

                run_resolver(&CollisionResolver::new(), &mut a, FIXED_DT);
                a.refresh_grid();
                prop_assert!(!a.aabb_of(first).unwrap().intersects(&a.aabb_of(second).unwrap()));

                let again = run_resolver(&CollisionResolver::new(), &mut a, FIXED_DT);
                prop_assert!(again.collisions.is_empty());
            }

            #[test]
            fn crowd_separates_in_one_pass(
                layout in prop::collection::vec((-0.25f32..0.25, -0.25f32..0.25), 3..7),
            ) {
                let mut a = arena();
                let ids: Vec<_> = layout
                    .iter()
                    .map(|&(x, y)| spawn_body(&mut a, Vec2::new(x, y), Vec2::ZERO))
                    .collect();

                run_resolver(&CollisionResolver::new(), &mut a, FIXED_DT);
                for (n, &x) in ids.iter().enumerate() {
                    for &y in &ids[n + 1..] {
                        prop_assert!(!a.aabb_of(x).unwrap().intersects(&a.aabb_of(y).unwrap()));
                    }
                }

                let again = run_resolver(&CollisionResolver::new(), &mut a, FIXED_DT);
                prop_assert!(again.collisions.is_empty());
            }
        }
    }
}
