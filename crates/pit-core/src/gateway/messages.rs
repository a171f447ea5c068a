//! Wire messages of the realtime gateway.
//!
//! All messages are JSON objects tagged by a kebab-case `msgType` field:
//!
//! ```json
//! { "msgType": "remain-players", "remainingPlayers": 4, "totalPlayers": 8 }
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::level::Phase;

/// Lobby state reported by `game-status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GameStatus {
    /// A match is loaded or running.
    Lobby,
    /// The last match ended; waiting for the next.
    Awaiting,
}

/// Message sent from the server to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msgType", rename_all = "kebab-case")]
pub enum OutboundMessage {
    /// Roster size.
    #[serde(rename_all = "camelCase")]
    RemainPlayers {
        /// Living participants.
        remaining_players: usize,
        /// Participants at spawn.
        total_players: usize,
    },
    /// Elapsed fight time.
    GameTime {
        /// Whole hours.
        hours: u64,
        /// Minutes past the hour.
        minutes: u64,
        /// Seconds past the minute.
        seconds: u64,
    },
    /// Current phase.
    GameState {
        /// The phase.
        phase: Phase,
    },
    /// Lobby status.
    #[serde(rename_all = "camelCase")]
    GameStatus {
        /// Match currently loaded.
        game_id: String,
        /// Match loaded before it, if any.
        last_game_id: Option<String>,
        /// Lobby state.
        game_status: GameStatus,
    },
    /// Participant names keyed by participant id.
    #[serde(rename_all = "camelCase")]
    PlayerNames {
        /// Match the names belong to.
        game_id: String,
        /// Participant id to display name.
        names: BTreeMap<String, String>,
    },
}

impl OutboundMessage {
    /// `game-time` for `elapsed` fight time, truncated to whole seconds.
    #[must_use]
    pub fn game_time(elapsed: Duration) -> Self {
        let total = elapsed.as_secs();
        Self::GameTime {
            hours: total / 3600,
            minutes: total / 60 % 60,
            seconds: total % 60,
        }
    }
}

/// Category an inbound message is dispatched by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageCategory {
    /// `game-status` queries.
    GameStatus,
    /// `player-names` queries.
    PlayerNames,
    /// `game-state` queries.
    GameState,
    /// A client connected.
    ConnectionOpen,
    /// A reply to a correlated request.
    Response,
}

/// Message received from clients or the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msgType", rename_all = "kebab-case")]
pub enum InboundMessage {
    /// Query for the lobby status.
    GameStatus,
    /// Query for participant names.
    PlayerNames,
    /// Query for the current phase.
    GameState,
    /// A client connected.
    ConnectionOpen {
        /// Transport-assigned client id.
        client: String,
    },
    /// A reply to a correlated request.
    Response {
        /// Correlation id of the request answered.
        correlation: Uuid,
        /// Reply body.
        payload: serde_json::Value,
    },
}

impl InboundMessage {
    /// The category listeners are keyed by.
    #[must_use]
    pub fn category(&self) -> MessageCategory {
        match self {
            Self::GameStatus => MessageCategory::GameStatus,
            Self::PlayerNames => MessageCategory::PlayerNames,
            Self::GameState => MessageCategory::GameState,
            Self::ConnectionOpen { .. } => MessageCategory::ConnectionOpen,
            Self::Response { .. } => MessageCategory::Response,
        }
    }
}

/// A correlated request handed to the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundRequest {
    /// Id the response must carry.
    pub correlation: Uuid,
    /// Request body.
    pub payload: serde_json::Value,
}
