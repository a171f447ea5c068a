//! Steering resolver: chase the nearest living opponent.
//!
//! Runs last in the tick so the velocities it sets are the ones the next
//! tick's collision pass sweeps with.

use glam::Vec2;

use crate::arena::Arena;
use crate::entity::{Behavior, EntityId, Rigidbody, Status, Transform};
use crate::output::TickFrame;

use super::{Resolver, Stage, TickContext};

/// Resolver that points every living combatant at its nearest opponent.
///
/// Velocity is `direction * speed * speed_scale`, where `speed` is the
/// combatant's [`Status`] speed stat. A combatant with no living opponent
/// stops.
#[derive(Debug, Clone)]
pub struct SteeringResolver {
    speed_scale: f32,
}

impl SteeringResolver {
    /// Creates a steering resolver converting speed points to arena units
    /// per second with `speed_scale`.
    #[must_use]
    pub fn new(speed_scale: f32) -> Self {
        Self { speed_scale }
    }

    /// Arena units per second per speed point.
    #[must_use]
    pub fn speed_scale(&self) -> f32 {
        self.speed_scale
    }

    /// Nearest of `others` to `from`; ties go to the lower id.
    fn nearest(from: (EntityId, Vec2), others: &[(EntityId, Vec2)]) -> Option<(EntityId, Vec2)> {
        let (id, position) = from;
        others
            .iter()
            .filter(|(other, _)| *other != id)
            .fold(None, |best: Option<(EntityId, Vec2, f32)>, &(other, at)| {
                let d = position.distance_squared(at);
                match best {
                    Some((_, _, best_d)) if best_d <= d => best,
                    _ => Some((other, at, d)),
                }
            })
            .map(|(other, at, _)| (other, at))
    }
}

impl Resolver for SteeringResolver {
    fn stage(&self) -> Stage {
        Stage::Steering
    }

    fn resolve(&self, _ctx: &mut TickContext<'_>, arena: &mut Arena, _frame: &mut TickFrame) {
        let living: Vec<(EntityId, Vec2)> = arena
            .ids_with::<Status>()
            .into_iter()
            .filter(|&id| arena.get::<Status>(id).is_some_and(Status::is_alive))
            .filter_map(|id| arena.get::<Transform>(id).map(|t| (id, t.position)))
            .collect();

        for &(id, position) in &living {
            let nearest = Self::nearest((id, position), &living);
            let speed = arena.get::<Status>(id).map_or(0.0, Status::speed);

            if let Some(behavior) = arena.get_mut::<Behavior>(id) {
                behavior.nearest = nearest.map(|(other, _)| other);
            }
            if let Some(body) = arena.get_mut::<Rigidbody>(id) {
                body.velocity = nearest.map_or(Vec2::ZERO, |(_, at)| {
                    (at - position).normalize_or_zero() * speed * self.speed_scale
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::FIXED_DT;
    use crate::tests::{run_resolver, spawn_fighter};

    fn fighter(arena: &mut Arena, x: f32, y: f32) -> EntityId {
        spawn_fighter(arena, Vec2::new(x, y), Status::new(10.0, 0.0, 50.0, 100.0))
    }

    #[test]
    fn chases_nearest() {
        let mut a = Arena::new(10, 10).unwrap();
        let x = fighter(&mut a, 0.0, 0.0);
        let near = fighter(&mut a, 0.3, 0.0);
        let _far = fighter(&mut a, -0.6, 0.0);

        run_resolver(&SteeringResolver::new(0.01), &mut a, FIXED_DT);

        assert_eq!(a.get::<Behavior>(x).unwrap().nearest, Some(near));
        let v = a.get::<Rigidbody>(x).unwrap().velocity;
        assert!((v - Vec2::new(0.5, 0.0)).length() < 1e-6);
    }

    #[test]
    fn ties_go_to_lower_id() {
        let mut a = Arena::new(10, 10).unwrap();
        let x = fighter(&mut a, 0.0, 0.0);
        let left = fighter(&mut a, -0.2, 0.0);
        let _right = fighter(&mut a, 0.2, 0.0);

        run_resolver(&SteeringResolver::new(0.01), &mut a, FIXED_DT);
        assert_eq!(a.get::<Behavior>(x).unwrap().nearest, Some(left));
    }

    #[test]
    fn alone_stops() {
        let mut a = Arena::new(10, 10).unwrap();
        let x = fighter(&mut a, 0.0, 0.0);
        let y = fighter(&mut a, 0.4, 0.0);
        a.get_mut::<Rigidbody>(x).unwrap().velocity = Vec2::ONE;
        a.destroy(y);

        run_resolver(&SteeringResolver::new(0.01), &mut a, FIXED_DT);

        assert_eq!(a.get::<Behavior>(x).unwrap().nearest, None);
        assert_eq!(a.get::<Rigidbody>(x).unwrap().velocity, Vec2::ZERO);
    }

    #[test]
    fn dead_status_is_not_chased() {
        let mut a = Arena::new(10, 10).unwrap();
        let x = fighter(&mut a, 0.0, 0.0);
        let dying = fighter(&mut a, 0.1, 0.0);
        let alive = fighter(&mut a, 0.5, 0.0);
        a.get_mut::<Status>(dying).unwrap().take_hit(x, 1_000.0);

        run_resolver(&SteeringResolver::new(0.01), &mut a, FIXED_DT);
        assert_eq!(a.get::<Behavior>(x).unwrap().nearest, Some(alive));
    }
}
