//! Uniform cell grid over the normalized arena.
//!
//! The grid tracks two kinds of occupant:
//!
//! - **Dynamic** bodies, keyed by `K`, in insertion order. Each carries an
//!   [`Occupancy`]: its current box, the anchor cell under its centre, and
//!   the range of cells its box covers. Occupancy is recomputed on every
//!   [`SpatialGrid::refresh`].
//! - **Static** cells, stored row-major as a flat occupancy mask. A static
//!   cell's collision volume is the cell itself.
//!
//! Bucket membership is by footprint, so a body straddling a cell boundary
//! is a candidate against bodies on both sides of it.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aabb::Aabb;
use crate::{CellCoord, ARENA_MAX, ARENA_MIN};

/// Order in which the 8-neighbourhood of a cell is visited.
///
/// Starts at the top-left and walks clockwise.
pub const NEIGHBOR_OFFSETS: [(i64, i64); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
];

/// Errors from grid construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    /// Width or height was zero.
    #[error("grid dimensions must be non-zero, got {width}x{height}")]
    ZeroDimension {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
}

/// Inclusive rectangle of cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRange {
    /// Top-left cell.
    pub min: CellCoord,
    /// Bottom-right cell.
    pub max: CellCoord,
}

impl CellRange {
    /// Creates the range spanned by two corner cells, in either order.
    #[must_use]
    pub fn spanning(a: CellCoord, b: CellCoord) -> Self {
        Self {
            min: CellCoord::new(a.col.min(b.col), a.row.min(b.row)),
            max: CellCoord::new(a.col.max(b.col), a.row.max(b.row)),
        }
    }

    /// Returns `true` if `cell` lies inside the range.
    #[must_use]
    pub fn contains(&self, cell: CellCoord) -> bool {
        (self.min.col..=self.max.col).contains(&cell.col)
            && (self.min.row..=self.max.row).contains(&cell.row)
    }

    /// Iterates the covered cells row by row.
    pub fn cells(&self) -> impl Iterator<Item = CellCoord> + '_ {
        (self.min.row..=self.max.row)
            .flat_map(move |row| (self.min.col..=self.max.col).map(move |col| CellCoord::new(col, row)))
    }
}

/// Where a dynamic body currently sits in the grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Occupancy {
    /// The body's collision box at the last refresh.
    pub aabb: Aabb,
    /// Cell containing the box centre.
    pub anchor: CellCoord,
    /// Cells covered by the box.
    pub footprint: CellRange,
}

/// Uniform broad-phase grid keyed by `K`.
#[derive(Debug, Clone)]
pub struct SpatialGrid<K> {
    width: u32,
    height: u32,
    statics: Vec<bool>,
    static_count: usize,
    dynamics: Vec<(K, Occupancy)>,
    index: HashMap<K, usize>,
    buckets: Vec<Vec<usize>>,
}

impl<K> SpatialGrid<K>
where
    K: Copy + Eq + Hash + Debug,
{
    /// Creates an empty `width × height` grid.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::ZeroDimension`] if either dimension is zero.
    pub fn new(width: u32, height: u32) -> Result<Self, GridError> {
        if width == 0 || height == 0 {
            return Err(GridError::ZeroDimension { width, height });
        }
        let cells = width as usize * height as usize;
        Ok(Self {
            width,
            height,
            statics: vec![false; cells],
            static_count: 0,
            dynamics: Vec::new(),
            index: HashMap::new(),
            buckets: vec![Vec::new(); cells],
        })
    }

    /// Number of columns.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Width and height of one cell in arena units.
    #[must_use]
    pub fn cell_size(&self) -> Vec2 {
        #[allow(clippy::cast_precision_loss)]
        let dims = Vec2::new(self.width as f32, self.height as f32);
        Vec2::splat(ARENA_MAX - ARENA_MIN) / dims
    }

    /// Cell containing `position`, clamped into the grid.
    #[must_use]
    pub fn cell_of(&self, position: Vec2) -> CellCoord {
        let span = ARENA_MAX - ARENA_MIN;
        let u = (position.x - ARENA_MIN) / span;
        let v = 1.0 - (position.y - ARENA_MIN) / span;
        CellCoord::new(quantize(u, self.width), quantize(v, self.height))
    }

    fn flat(&self, cell: CellCoord) -> usize {
        cell.row as usize * self.width as usize + cell.col as usize
    }

    fn checked_cell(&self, col: i64, row: i64) -> Option<CellCoord> {
        CellCoord::new(0, 0).offset(col, row, self.width, self.height)
    }

    // ========================================================================
    // Static cells
    // ========================================================================

    /// Marks `(col, row)` as a static obstacle.
    ///
    /// Out-of-range coordinates are ignored. Returns `true` if the cell was
    /// newly marked.
    pub fn add_static(&mut self, col: i64, row: i64) -> bool {
        let Some(cell) = self.checked_cell(col, row) else {
            tracing::debug!(col, row, "ignoring out-of-range static cell");
            return false;
        };
        let idx = self.flat(cell);
        if self.statics[idx] {
            return false;
        }
        self.statics[idx] = true;
        self.static_count += 1;
        true
    }

    /// Clears the static obstacle at `(col, row)`.
    ///
    /// Out-of-range coordinates are ignored. Returns `true` if a static cell
    /// was removed.
    pub fn remove_static(&mut self, col: i64, row: i64) -> bool {
        let Some(cell) = self.checked_cell(col, row) else {
            tracing::debug!(col, row, "ignoring out-of-range static cell");
            return false;
        };
        let idx = self.flat(cell);
        if !self.statics[idx] {
            return false;
        }
        self.statics[idx] = false;
        self.static_count -= 1;
        true
    }

    /// Returns `true` if `cell` is a static obstacle.
    #[must_use]
    pub fn is_static(&self, cell: CellCoord) -> bool {
        cell.col < self.width && cell.row < self.height && self.statics[self.flat(cell)]
    }

    /// Number of static cells.
    #[must_use]
    pub fn static_count(&self) -> usize {
        self.static_count
    }

    /// Static cells in row-major order.
    pub fn static_cells(&self) -> impl Iterator<Item = CellCoord> + '_ {
        let width = self.width as usize;
        self.statics.iter().enumerate().filter(|(_, set)| **set).map(move |(i, _)| {
            #[allow(clippy::cast_possible_truncation)]
            let cell = CellCoord::new((i % width) as u32, (i / width) as u32);
            cell
        })
    }

    /// Collision box of a cell: centred on the cell, half a cell each way.
    #[must_use]
    pub fn static_aabb(&self, cell: CellCoord) -> Aabb {
        let size = self.cell_size();
        #[allow(clippy::cast_precision_loss)]
        let center = Vec2::new(
            ARENA_MIN + (cell.col as f32 + 0.5) * size.x,
            ARENA_MAX - (cell.row as f32 + 0.5) * size.y,
        );
        Aabb::new(center, size * 0.5)
    }

    /// Occupied static cells in the 8-neighbourhood of `anchor`, in
    /// [`NEIGHBOR_OFFSETS`] order.
    #[must_use]
    pub fn static_neighbors(&self, anchor: CellCoord) -> Vec<CellCoord> {
        NEIGHBOR_OFFSETS
            .iter()
            .filter_map(|&(dc, dr)| anchor.offset(dc, dr, self.width, self.height))
            .filter(|&cell| self.is_static(cell))
            .collect()
    }

    // ========================================================================
    // Dynamic bodies
    // ========================================================================

    /// Inserts a dynamic body with its current box and computes its occupancy.
    ///
    /// Re-adding an existing key updates its box in place and keeps its
    /// insertion index.
    pub fn add_dynamic(&mut self, key: K, aabb: Aabb) {
        let occupancy = self.occupancy_of(aabb);
        if let Some(&i) = self.index.get(&key) {
            self.dynamics[i].1 = occupancy;
        } else {
            self.index.insert(key, self.dynamics.len());
            self.dynamics.push((key, occupancy));
        }
        self.rebuild_buckets();
    }

    /// Removes a dynamic body. Returns `true` if it was present.
    pub fn remove_dynamic(&mut self, key: K) -> bool {
        let Some(i) = self.index.remove(&key) else {
            return false;
        };
        self.dynamics.remove(i);
        for (j, (k, _)) in self.dynamics.iter().enumerate().skip(i) {
            self.index.insert(*k, j);
        }
        self.rebuild_buckets();
        true
    }

    /// Returns `true` if `key` is a registered dynamic body.
    #[must_use]
    pub fn contains_dynamic(&self, key: K) -> bool {
        self.index.contains_key(&key)
    }

    /// Number of dynamic bodies.
    #[must_use]
    pub fn dynamic_count(&self) -> usize {
        self.dynamics.len()
    }

    /// Insertion index of `key`.
    #[must_use]
    pub fn index_of(&self, key: K) -> Option<usize> {
        self.index.get(&key).copied()
    }

    /// Key at insertion index `i`.
    #[must_use]
    pub fn key_at(&self, i: usize) -> Option<K> {
        self.dynamics.get(i).map(|(k, _)| *k)
    }

    /// Current occupancy of `key`.
    #[must_use]
    pub fn occupancy(&self, key: K) -> Option<&Occupancy> {
        self.index.get(&key).map(|&i| &self.dynamics[i].1)
    }

    /// Dynamic bodies in insertion order.
    pub fn dynamics(&self) -> impl Iterator<Item = (K, &Occupancy)> {
        self.dynamics.iter().map(|(k, o)| (*k, o))
    }

    /// Recomputes every dynamic body's occupancy.
    ///
    /// `locate` returns the body's current box. A body it cannot locate keeps
    /// its previous occupancy.
    pub fn refresh<F>(&mut self, mut locate: F)
    where
        F: FnMut(K) -> Option<Aabb>,
    {
        for i in 0..self.dynamics.len() {
            let key = self.dynamics[i].0;
            match locate(key) {
                Some(aabb) => self.dynamics[i].1 = self.occupancy_of(aabb),
                None => tracing::debug!(?key, "dynamic body not located, keeping occupancy"),
            }
        }
        self.rebuild_buckets();
    }

    /// Insertion indices of dynamic bodies in the bucket at `cell`.
    #[must_use]
    pub fn bucket(&self, cell: CellCoord) -> &[usize] {
        if cell.col >= self.width || cell.row >= self.height {
            return &[];
        }
        &self.buckets[self.flat(cell)]
    }

    /// Later bodies (insertion index greater than `i`) sharing at least one
    /// bucket with body `i`, ascending and without duplicates.
    #[must_use]
    pub fn candidates(&self, i: usize) -> Vec<usize> {
        let Some((_, occupancy)) = self.dynamics.get(i) else {
            return Vec::new();
        };
        let mut out: Vec<usize> = occupancy
            .footprint
            .cells()
            .flat_map(|cell| self.bucket(cell).iter().copied())
            .filter(|&j| j > i)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    fn occupancy_of(&self, aabb: Aabb) -> Occupancy {
        Occupancy {
            aabb,
            anchor: self.cell_of(aabb.center),
            footprint: CellRange::spanning(self.cell_of(aabb.min()), self.cell_of(aabb.max())),
        }
    }

    fn rebuild_buckets(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        for (i, (_, occupancy)) in self.dynamics.iter().enumerate() {
            for cell in occupancy.footprint.cells() {
                let idx = cell.row as usize * self.width as usize + cell.col as usize;
                self.buckets[idx].push(i);
            }
        }
    }
}

/// Maps a unit-interval coordinate onto `[0, cells)`.
fn quantize(unit: f32, cells: u32) -> u32 {
    #[allow(clippy::cast_precision_loss)]
    let scaled = (unit * cells as f32).floor();
    if scaled.is_nan() || scaled < 0.0 {
        return 0;
    }
    // Clamped below `cells`, so the cast cannot truncate.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let cell = scaled as u32;
    cell.min(cells - 1)
}
