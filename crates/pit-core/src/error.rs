//! Error types for match setup, persistence, messaging and configuration.
//!
//! Tick-time problems are never errors: resolvers and the level log them and
//! carry on. Only setup, persistence calls, correlated requests and config
//! loading can fail.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Failures reported by the persistence collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The requested record does not exist.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Record kind, e.g. `"match"` or `"profile"`.
        kind: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// The store refused the write.
    #[error("write rejected: {0}")]
    Rejected(String),

    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failures that stop a match before the fight starts.
#[derive(Debug, Error)]
pub enum LevelError {
    /// The match record could not be loaded.
    #[error("failed to load match {match_id}")]
    MatchLookup {
        /// Match that was requested.
        match_id: String,
        /// Underlying store failure.
        #[source]
        source: StoreError,
    },

    /// A participant profile could not be loaded.
    #[error("failed to load profile for participant {participant}")]
    ProfileLookup {
        /// Participant whose profile was requested.
        participant: String,
        /// Underlying store failure.
        #[source]
        source: StoreError,
    },

    /// A participant token is not of the form `collection/token`.
    #[error("participant {participant} has malformed token {token:?}")]
    InvalidToken {
        /// Participant carrying the token.
        participant: String,
        /// The offending token.
        token: String,
    },

    /// The match has no participants.
    #[error("match {match_id} has no participants")]
    EmptyRoster {
        /// Match that was requested.
        match_id: String,
    },

    /// The arena grid could not be built.
    #[error("invalid arena grid")]
    Grid(#[from] pit_grid::GridError),
}

/// Failures of a correlated request over the messaging gateway.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// No matching response arrived in time.
    #[error("request {correlation} timed out after {after:?}")]
    Timeout {
        /// Correlation id of the request.
        correlation: Uuid,
        /// How long the caller waited.
        after: Duration,
    },

    /// The transport side of the gateway is gone.
    #[error("gateway transport disconnected")]
    Disconnected,
}

/// Failures loading or validating a [`MatchConfig`](crate::config::MatchConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {path}")]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON for the config schema.
    #[error("failed to parse config")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}
