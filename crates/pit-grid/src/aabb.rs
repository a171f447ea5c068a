//! Axis-aligned boxes and the swept-volume test.
//!
//! Every collision volume in the arena is an axis-aligned box. Moving boxes
//! are tested with [`sweep`], which treats the relative displacement over one
//! tick as a ray cast against the target box grown by the mover's half
//! extents (a Minkowski sum). The entry time along that ray is the contact
//! time.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Axis-aligned box described by its centre and half extents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Centre of the box.
    pub center: Vec2,
    /// Half width and half height.
    pub half_extents: Vec2,
}

impl Aabb {
    /// Creates a box from its centre and half extents.
    #[must_use]
    pub const fn new(center: Vec2, half_extents: Vec2) -> Self {
        Self {
            center,
            half_extents,
        }
    }

    /// Minimum corner.
    #[must_use]
    pub fn min(&self) -> Vec2 {
        self.center - self.half_extents
    }

    /// Maximum corner.
    #[must_use]
    pub fn max(&self) -> Vec2 {
        self.center + self.half_extents
    }

    /// Returns this box grown by `extra` on each side.
    #[must_use]
    pub fn expanded(&self, extra: Vec2) -> Self {
        Self::new(self.center, self.half_extents + extra)
    }

    /// Penetration depth on each axis, positive on both axes only when the
    /// boxes strictly overlap. Touching boxes report zero on the touching axis.
    #[must_use]
    pub fn overlap(&self, other: &Self) -> Vec2 {
        (self.half_extents + other.half_extents) - (self.center - other.center).abs()
    }

    /// Returns `true` if the boxes strictly overlap.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        let overlap = self.overlap(other);
        overlap.x > 0.0 && overlap.y > 0.0
    }
}

/// First contact between a moving box and a target box within one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// Unit normal of the touched face, pointing from the target towards the
    /// mover. Zero when a moving box enters both axes at the same instant.
    pub normal: Vec2,
    /// Fraction of the step, in `[0, 1]`, at which contact begins. Zero for
    /// boxes that already overlap at the start of the step.
    pub time: f32,
    /// Overlap depth along `normal` at the start of the step. Only non-zero
    /// when the boxes already overlap.
    pub penetration: f32,
}

impl Contact {
    /// Returns `true` for the corner case where neither axis dominates.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.normal == Vec2::ZERO
    }

    /// Returns `true` if the boxes were already overlapping when the step began.
    #[must_use]
    pub fn is_resting(&self) -> bool {
        self.penetration > 0.0
    }
}

/// Swept-volume test of `mover` travelling by `displacement` against `target`.
///
/// `displacement` is the mover's motion relative to the target over one step
/// (`(v_mover - v_target) * dt`). Returns `None` when the boxes neither
/// overlap now nor touch within the step.
///
/// # Example
///
/// ```
/// use glam::Vec2;
/// use pit_grid::{sweep, Aabb};
///
/// let mover = Aabb::new(Vec2::new(-0.5, 0.0), Vec2::splat(0.1));
/// let wall = Aabb::new(Vec2::new(0.5, 0.0), Vec2::splat(0.1));
///
/// let contact = sweep(&mover, Vec2::new(1.6, 0.0), &wall).unwrap();
/// assert!((contact.time - 0.5).abs() < 1e-5);
/// assert_eq!(contact.normal, Vec2::new(-1.0, 0.0));
/// ```
#[must_use]
pub fn sweep(mover: &Aabb, displacement: Vec2, target: &Aabb) -> Option<Contact> {
    let expanded = target.expanded(mover.half_extents);
    let delta = mover.center - target.center;
    let overlap = expanded.half_extents - delta.abs();

    if overlap.x > 0.0 && overlap.y > 0.0 {
        return Some(resting_contact(delta, overlap));
    }

    if displacement == Vec2::ZERO {
        return None;
    }

    let (near_x, far_x) = slab(mover.center.x, displacement.x, expanded.min().x, expanded.max().x)?;
    let (near_y, far_y) = slab(mover.center.y, displacement.y, expanded.min().y, expanded.max().y)?;

    let t_near = near_x.max(near_y);
    let t_far = far_x.min(far_y);

    if t_near > t_far || t_far <= 0.0 || t_near > 1.0 {
        return None;
    }

    #[allow(clippy::float_cmp)]
    let normal = if near_x > near_y {
        Vec2::new(-displacement.x.signum(), 0.0)
    } else if near_y > near_x {
        Vec2::new(0.0, -displacement.y.signum())
    } else {
        Vec2::ZERO
    };

    Some(Contact {
        normal,
        time: t_near.max(0.0),
        penetration: 0.0,
    })
}

/// Contact for boxes that already overlap: push out along the shallower axis.
/// Equal depths resolve along x.
fn resting_contact(delta: Vec2, overlap: Vec2) -> Contact {
    let away = |d: f32| if d < 0.0 { -1.0 } else { 1.0 };
    if overlap.x <= overlap.y {
        Contact {
            normal: Vec2::new(away(delta.x), 0.0),
            time: 0.0,
            penetration: overlap.x,
        }
    } else {
        Contact {
            normal: Vec2::new(0.0, away(delta.y)),
            time: 0.0,
            penetration: overlap.y,
        }
    }
}

/// Entry and exit times of a 1D ray against the interval `[min, max]`.
///
/// A ray with no motion on this axis is either always inside the slab or
/// never inside it.
fn slab(origin: f32, direction: f32, min: f32, max: f32) -> Option<(f32, f32)> {
    if direction == 0.0 {
        return (origin > min && origin < max).then_some((f32::NEG_INFINITY, f32::INFINITY));
    }
    let a = (min - origin) / direction;
    let b = (max - origin) / direction;
    Some((a.min(b), a.max(b)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box(x: f32, y: f32) -> Aabb {
        Aabb::new(Vec2::new(x, y), Vec2::splat(0.05))
    }

    mod aabb_tests {
        use super::*;

        #[test]
        fn corners() {
            let b = Aabb::new(Vec2::new(1.0, 2.0), Vec2::new(0.5, 0.25));
            assert_eq!(b.min(), Vec2::new(0.5, 1.75));
            assert_eq!(b.max(), Vec2::new(1.5, 2.25));
        }

        #[test]
        fn intersects_is_strict() {
            let a = unit_box(0.0, 0.0);
            assert!(a.intersects(&unit_box(0.09, 0.0)));
            // Exactly touching faces do not count as overlap.
            assert!(!a.intersects(&unit_box(0.1, 0.0)));
            assert!(!a.intersects(&unit_box(0.5, 0.5)));
        }

        #[test]
        fn serialization_roundtrip() {
            let b = unit_box(0.25, -0.5);
            let json = serde_json::to_string(&b).unwrap();
            let back: Aabb = serde_json::from_str(&json).unwrap();
            assert_eq!(b, back);
        }
    }

    mod resting_tests {
        use super::*;

        #[test]
        fn overlap_reports_time_zero_and_shallow_axis() {
            // 0.08 apart with half extents 0.05: 0.02 deep on x, 0.1 on y.
            let a = unit_box(-0.04, 0.0);
            let b = unit_box(0.04, 0.0);
            let contact = sweep(&a, Vec2::new(1.0 / 60.0, 0.0), &b).unwrap();

            assert_eq!(contact.time, 0.0);
            assert_eq!(contact.normal, Vec2::new(-1.0, 0.0));
            assert!((contact.penetration - 0.02).abs() < 1e-6);
            assert!(contact.is_resting());
        }

        #[test]
        fn overlap_detected_without_motion() {
            let a = unit_box(0.0, 0.03);
            let b = unit_box(0.0, 0.0);
            let contact = sweep(&a, Vec2::ZERO, &b).unwrap();
            assert_eq!(contact.normal, Vec2::new(0.0, 1.0));
        }

        #[test]
        fn equal_depth_resolves_along_x() {
            let a = unit_box(0.05, 0.05);
            let b = unit_box(0.0, 0.0);
            let contact = sweep(&a, Vec2::ZERO, &b).unwrap();
            assert_eq!(contact.normal, Vec2::new(1.0, 0.0));
            assert!(!contact.is_degenerate());
        }
    }

    mod swept_tests {
        use super::*;

        #[test]
        fn no_motion_no_overlap_misses() {
            assert!(sweep(&unit_box(0.0, 0.0), Vec2::ZERO, &unit_box(0.5, 0.0)).is_none());
        }

        #[test]
        fn head_on_contact_time() {
            // Gap of 0.2 between faces, travelling 0.4 in the step.
            let a = unit_box(-0.2, 0.0);
            let b = unit_box(0.1, 0.0);
            let contact = sweep(&a, Vec2::new(0.4, 0.0), &b).unwrap();
            assert!((contact.time - 0.5).abs() < 1e-5);
            assert_eq!(contact.normal, Vec2::new(-1.0, 0.0));
            assert!(!contact.is_resting());
        }

        #[test]
        fn falls_short_within_step() {
            let a = unit_box(-0.2, 0.0);
            let b = unit_box(0.1, 0.0);
            assert!(sweep(&a, Vec2::new(0.1, 0.0), &b).is_none());
        }

        #[test]
        fn moving_away_misses() {
            let a = unit_box(-0.2, 0.0);
            let b = unit_box(0.1, 0.0);
            assert!(sweep(&a, Vec2::new(-0.4, 0.0), &b).is_none());
        }

        #[test]
        fn vertical_contact_normal() {
            let a = unit_box(0.0, 0.5);
            let b = unit_box(0.0, 0.0);
            let contact = sweep(&a, Vec2::new(0.0, -0.8), &b).unwrap();
            assert_eq!(contact.normal, Vec2::new(0.0, 1.0));
        }

        #[test]
        fn exact_diagonal_is_degenerate() {
            let a = unit_box(-0.3, -0.3);
            let b = unit_box(0.0, 0.0);
            let contact = sweep(&a, Vec2::new(0.6, 0.6), &b).unwrap();
            assert!(contact.is_degenerate());
        }

        #[test]
        fn passing_beside_misses() {
            let a = unit_box(-0.3, 0.5);
            let b = unit_box(0.0, 0.0);
            assert!(sweep(&a, Vec2::new(0.6, 0.0), &b).is_none());
        }

        #[test]
        fn touching_and_sliding_away_misses() {
            let a = unit_box(-0.1, 0.0);
            let b = unit_box(0.0, 0.0);
            assert!(sweep(&a, Vec2::new(-0.1, 0.0), &b).is_none());
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn contact_time_is_in_unit_interval(
                ax in -0.9f32..0.9, ay in -0.9f32..0.9,
                bx in -0.9f32..0.9, by in -0.9f32..0.9,
                dx in -0.5f32..0.5, dy in -0.5f32..0.5,
            ) {
                let a = unit_box(ax, ay);
                let b = unit_box(bx, by);
                if let Some(contact) = sweep(&a, Vec2::new(dx, dy), &b) {
                    prop_assert!((0.0..=1.0).contains(&contact.time));
                    let len = contact.normal.length();
                    prop_assert!(len == 0.0 || (len - 1.0).abs() < 1e-6);
                }
            }
        }
    }
}
