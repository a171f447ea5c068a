//! # Pit Grid
//!
//! Broad-phase spatial substrate for the arena simulation.
//!
//! The arena is a fixed square in normalized coordinates, `[-1, 1]` on both
//! axes. This crate partitions it into a uniform cell grid and provides:
//!
//! - **Dynamic occupancy**: which cells each moving body covers, recomputed
//!   every tick by [`SpatialGrid::refresh`]
//! - **Static obstacles**: immovable wall cells registered at match setup
//! - **Swept-volume tests**: [`sweep`] reports the first contact of a moving
//!   box against another box within one tick step
//! - **State hashing**: [`hash_grid`] for determinism checks
//!
//! ## Quick Start
//!
//! ```
//! use glam::Vec2;
//! use pit_grid::{Aabb, SpatialGrid};
//!
//! let mut grid: SpatialGrid<u64> = SpatialGrid::new(10, 10).unwrap();
//! grid.add_static(0, 0);
//! grid.add_dynamic(7, Aabb::new(Vec2::new(0.0, 0.0), Vec2::splat(0.05)));
//!
//! assert!(grid.contains_dynamic(7));
//! assert_eq!(grid.static_count(), 1);
//! ```
//!
//! The grid is generic over its key type so it never needs to know what an
//! entity is. The simulation core keys it by entity id.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod aabb;
pub mod grid;
pub mod hash;

use serde::{Deserialize, Serialize};
use std::fmt;

// Re-exports for convenience
pub use aabb::{sweep, Aabb, Contact};
pub use grid::{CellRange, GridError, Occupancy, SpatialGrid};
pub use hash::hash_grid;

/// Lower bound of the normalized arena on both axes.
pub const ARENA_MIN: f32 = -1.0;

/// Upper bound of the normalized arena on both axes.
pub const ARENA_MAX: f32 = 1.0;

/// Integer coordinate of a grid cell.
///
/// Column 0 is the left edge of the arena and row 0 is the top edge, so rows
/// grow downwards while arena `y` grows upwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellCoord {
    /// Column index, left to right.
    pub col: u32,
    /// Row index, top to bottom.
    pub row: u32,
}

impl CellCoord {
    /// Creates a cell coordinate.
    #[must_use]
    pub const fn new(col: u32, row: u32) -> Self {
        Self { col, row }
    }

    /// Returns the coordinate offset by `(dc, dr)`, or `None` if it would
    /// leave a `width × height` grid.
    #[must_use]
    pub fn offset(self, dc: i64, dr: i64, width: u32, height: u32) -> Option<Self> {
        let col = i64::from(self.col) + dc;
        let row = i64::from(self.row) + dr;
        if col < 0 || row < 0 || col >= i64::from(width) || row >= i64::from(height) {
            return None;
        }
        // Both values were just bounds-checked against u32 dimensions.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let cell = Self::new(col as u32, row as u32);
        Some(cell)
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.col, self.row)
    }
}
