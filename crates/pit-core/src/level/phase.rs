//! Match phases.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Phase of a match. Phases only ever move forward, one step at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Participants placed, nothing moves.
    Spawn,
    /// Three.
    #[serde(rename = "countdown-3")]
    Countdown3,
    /// Two.
    #[serde(rename = "countdown-2")]
    Countdown2,
    /// One.
    #[serde(rename = "countdown-1")]
    Countdown1,
    /// Go.
    #[serde(rename = "countdown-0")]
    Countdown0,
    /// Simulation running.
    Fight,
    /// Match settled.
    Ended,
}

impl Phase {
    /// Every phase in order.
    pub const ALL: [Self; 7] = [
        Self::Spawn,
        Self::Countdown3,
        Self::Countdown2,
        Self::Countdown1,
        Self::Countdown0,
        Self::Fight,
        Self::Ended,
    ];

    /// The phase after this one, or `None` after [`Phase::Ended`].
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Spawn => Some(Self::Countdown3),
            Self::Countdown3 => Some(Self::Countdown2),
            Self::Countdown2 => Some(Self::Countdown1),
            Self::Countdown1 => Some(Self::Countdown0),
            Self::Countdown0 => Some(Self::Fight),
            Self::Fight => Some(Self::Ended),
            Self::Ended => None,
        }
    }

    /// Returns `true` for the countdown phases.
    #[must_use]
    pub const fn is_countdown(self) -> bool {
        matches!(
            self,
            Self::Countdown3 | Self::Countdown2 | Self::Countdown1 | Self::Countdown0
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Spawn => "spawn",
            Self::Countdown3 => "countdown-3",
            Self::Countdown2 => "countdown-2",
            Self::Countdown1 => "countdown-1",
            Self::Countdown0 => "countdown-0",
            Self::Fight => "fight",
            Self::Ended => "ended",
        };
        f.write_str(name)
    }
}
