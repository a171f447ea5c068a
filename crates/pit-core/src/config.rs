//! Match configuration.
//!
//! [`MatchConfig`] carries every tunable of a match: grid size, tick rate,
//! phase delays, dispatch limits, arena layout and targeting priorities.
//! Every field has a default, so a config file only lists what it changes:
//!
//! ```json
//! {
//!   "tick_rate": 30,
//!   "settlement_floor_ms": 2000,
//!   "arena_layout": { "kind": "cells", "cells": [[4, 4], [5, 5]] },
//!   "tier_priority": { "wolf": ["serpent", "hound"] }
//! }
//! ```
//!
//! Durations are written in milliseconds.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::entity::{Strategy, Tier};
use crate::error::ConfigError;

/// Static obstacle layout placed at spawn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArenaLayout {
    /// Every edge cell of the grid.
    #[default]
    Border,
    /// Exactly these `(col, row)` cells. Out-of-range cells are ignored.
    Cells {
        /// Obstacle cells.
        cells: Vec<(u32, u32)>,
    },
    /// No obstacles.
    Empty,
}

impl ArenaLayout {
    /// Obstacle cells for a `width × height` grid, row by row for `Border`.
    #[must_use]
    pub fn cells(&self, width: u32, height: u32) -> Vec<(i64, i64)> {
        match self {
            Self::Border => (0..height)
                .flat_map(|row| (0..width).map(move |col| (col, row)))
                .filter(|&(col, row)| col == 0 || row == 0 || col + 1 == width || row + 1 == height)
                .map(|(col, row)| (i64::from(col), i64::from(row)))
                .collect(),
            Self::Cells { cells } => cells
                .iter()
                .map(|&(col, row)| (i64::from(col), i64::from(row)))
                .collect(),
            Self::Empty => Vec::new(),
        }
    }
}

/// Configuration for one match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Grid columns.
    pub grid_width: u32,
    /// Grid rows.
    pub grid_height: u32,
    /// Fight ticks per second.
    pub tick_rate: u32,
    /// Pause between spawn and the first countdown phase.
    #[serde(rename = "setup_delay_ms", with = "millis")]
    pub setup_delay: Duration,
    /// Pause between countdown phases.
    #[serde(rename = "countdown_step_ms", with = "millis")]
    pub countdown_step: Duration,
    /// Minimum time from the last death to `Ended`.
    #[serde(rename = "settlement_floor_ms", with = "millis")]
    pub settlement_floor: Duration,
    /// Longest wait for outstanding dispatches at settlement.
    #[serde(rename = "settlement_timeout_ms", with = "millis")]
    pub settlement_timeout: Duration,
    /// Wait before answering a new connection with the roster size.
    #[serde(rename = "connection_reply_delay_ms", with = "millis")]
    pub connection_reply_delay: Duration,
    /// Default timeout of a correlated gateway request.
    #[serde(rename = "request_timeout_ms", with = "millis")]
    pub request_timeout: Duration,
    /// Dispatches allowed in flight at once.
    pub max_pending_dispatches: usize,
    /// Seed for spawn jitter and combat rolls.
    pub seed: u64,
    /// Half width and height of a participant's collision box.
    pub participant_half_extent: f32,
    /// Arena units per second per speed point.
    pub speed_scale: f32,
    /// Static obstacles.
    pub arena_layout: ArenaLayout,
    /// Preferred target tiers, keyed by the attacker's tier.
    pub tier_priority: BTreeMap<Tier, Vec<Tier>>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            grid_width: 10,
            grid_height: 10,
            tick_rate: 60,
            setup_delay: Duration::from_secs(3),
            countdown_step: Duration::from_secs(1),
            settlement_floor: Duration::from_secs(5),
            settlement_timeout: Duration::from_secs(10),
            connection_reply_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(5),
            max_pending_dispatches: 256,
            seed: 0,
            participant_half_extent: 0.05,
            speed_scale: 0.005,
            arena_layout: ArenaLayout::Border,
            tier_priority: BTreeMap::new(),
        }
    }
}

impl MatchConfig {
    /// Reads and validates a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Parse`] if it is not a valid config, and
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_width == 0 || self.grid_height == 0 {
            return Err(ConfigError::Invalid(format!(
                "grid must be non-zero, got {}x{}",
                self.grid_width, self.grid_height
            )));
        }
        if self.tick_rate == 0 {
            return Err(ConfigError::Invalid("tick_rate must be positive".into()));
        }
        if self.max_pending_dispatches == 0 {
            return Err(ConfigError::Invalid("max_pending_dispatches must be positive".into()));
        }
        if !(self.participant_half_extent > 0.0 && self.participant_half_extent < 0.5) {
            return Err(ConfigError::Invalid(format!(
                "participant_half_extent must be in (0, 0.5), got {}",
                self.participant_half_extent
            )));
        }
        if !(self.speed_scale.is_finite() && self.speed_scale >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "speed_scale must be finite and non-negative, got {}",
                self.speed_scale
            )));
        }
        Ok(())
    }

    /// Wall-clock length of one fight tick.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.tick_rate.max(1)))
    }

    /// Targeting strategy for a participant of `tier`.
    #[must_use]
    pub fn strategy_for(&self, tier: Tier) -> Strategy {
        Strategy::new(self.tier_priority.get(&tier).cloned().unwrap_or_default())
    }
}

/// Serde adapter writing a [`Duration`] as whole milliseconds.
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let ms = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
