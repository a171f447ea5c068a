//! State hashing for determinism verification.
//!
//! Two grids built from the same sequence of operations must hash equal.
//! Floats are hashed by their bit patterns.

use std::collections::hash_map::DefaultHasher;
use std::fmt::Debug;
use std::hash::{Hash, Hasher};

use crate::aabb::Aabb;
use crate::grid::SpatialGrid;

/// Compute a deterministic hash of grid state.
///
/// This hash includes:
/// - Grid dimensions
/// - Every static cell, row-major
/// - Every dynamic body in insertion order with its box and occupancy
#[must_use]
pub fn hash_grid<K>(grid: &SpatialGrid<K>) -> u64
where
    K: Copy + Eq + Hash + Debug,
{
    let mut hasher = DefaultHasher::new();

    grid.width().hash(&mut hasher);
    grid.height().hash(&mut hasher);

    grid.static_count().hash(&mut hasher);
    for cell in grid.static_cells() {
        cell.hash(&mut hasher);
    }

    grid.dynamic_count().hash(&mut hasher);
    for (key, occupancy) in grid.dynamics() {
        key.hash(&mut hasher);
        hash_aabb(&occupancy.aabb, &mut hasher);
        occupancy.anchor.hash(&mut hasher);
        occupancy.footprint.hash(&mut hasher);
    }

    hasher.finish()
}

fn hash_aabb<H: Hasher>(aabb: &Aabb, hasher: &mut H) {
    aabb.center.x.to_bits().hash(hasher);
    aabb.center.y.to_bits().hash(hasher);
    aabb.half_extents.x.to_bits().hash(hasher);
    aabb.half_extents.y.to_bits().hash(hasher);
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn populated() -> SpatialGrid<u64> {
        let mut grid = SpatialGrid::new(10, 10).unwrap();
        grid.add_static(0, 0);
        grid.add_static(9, 9);
        grid.add_dynamic(1, Aabb::new(Vec2::new(0.2, 0.2), Vec2::splat(0.05)));
        grid.add_dynamic(2, Aabb::new(Vec2::new(-0.2, 0.4), Vec2::splat(0.05)));
        grid
    }

    #[test]
    fn test_hash_identical_grids() {
        assert_eq!(hash_grid(&populated()), hash_grid(&populated()));
    }

    #[test]
    fn test_hash_changes_after_refresh() {
        let mut grid = populated();
        let before = hash_grid(&grid);
        grid.refresh(|_| Some(Aabb::new(Vec2::new(0.21, 0.2), Vec2::splat(0.05))));
        assert_ne!(before, hash_grid(&grid));
    }

    #[test]
    fn test_hash_sensitive_to_statics() {
        let mut grid = populated();
        let before = hash_grid(&grid);
        grid.remove_static(9, 9);
        assert_ne!(before, hash_grid(&grid));
    }

    #[test]
    fn test_hash_sensitive_to_insertion_order() {
        let mut a: SpatialGrid<u64> = SpatialGrid::new(4, 4).unwrap();
        let mut b: SpatialGrid<u64> = SpatialGrid::new(4, 4).unwrap();
        let p = Aabb::new(Vec2::ZERO, Vec2::splat(0.05));
        a.add_dynamic(1, p);
        a.add_dynamic(2, p);
        b.add_dynamic(2, p);
        b.add_dynamic(1, p);
        assert_ne!(hash_grid(&a), hash_grid(&b));
    }
}
