//! Persistence boundary.
//!
//! The match reads its roster from, and writes outcomes and logs to, an
//! external store behind the [`MatchStore`] trait. Records are plain serde
//! types; the wire shape of each is fixed here so any backend can map it.
//!
//! [`InMemoryStore`] is the bundled backend used by the server binary and
//! by tests.

mod memory;

pub use memory::InMemoryStore;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize};

use crate::entity::Tier;
use crate::error::StoreError;

/// Boxed future returned by [`MatchStore`] calls.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// One participant entry of a match record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantEntry {
    /// Participant id, unique within the match.
    pub id: String,
    /// Profile token in the form `collection/token`.
    pub token: String,
    /// Display name.
    pub name: String,
}

impl ParticipantEntry {
    /// Splits the token into `(collection, token)`. Returns `None` unless
    /// both parts are non-empty.
    #[must_use]
    pub fn token_parts(&self) -> Option<(&str, &str)> {
        let (collection, token) = self.token.split_once('/')?;
        (!collection.is_empty() && !token.is_empty()).then_some((collection, token))
    }
}

/// A scheduled match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Match id.
    pub id: String,
    /// Participants in entry order.
    pub participants: Vec<ParticipantEntry>,
}

/// Combat profile of a participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParticipantProfile {
    /// Display name.
    #[serde(rename = "name")]
    pub name: String,
    /// Creature class. Any creature name is accepted; unknown names map to
    /// [`Tier::Unknown`].
    #[serde(deserialize_with = "creature_name")]
    pub creature: Tier,
    /// Attack stat.
    pub attack: f32,
    /// Defence stat.
    pub defence: f32,
    /// Speed stat.
    pub speed: f32,
    /// Starting health.
    pub health: f32,
}

fn creature_name<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Tier, D::Error> {
    String::deserialize(deserializer).map(|name| Tier::from_creature(&name))
}

/// Final result of one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    /// Participant id.
    pub participant_id: String,
    /// Whole seconds survived in the fight.
    pub survived_seconds: u64,
    /// Kills scored.
    pub kills: u32,
    /// Health at the end, rounded up.
    pub final_health: i64,
}

/// Kind of a match log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    /// A participant entered the match.
    Entrants,
    /// A participant killed another; `value` is the victim.
    Kills,
    /// A participant died; `value` is its rank.
    FinalRank,
    /// A participant took damage; `value` is the amount.
    Damage,
    /// The match winner.
    Winners,
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Entrants => "entrants",
            Self::Kills => "kills",
            Self::FinalRank => "final_rank",
            Self::Damage => "damage",
            Self::Winners => "winners",
        };
        f.write_str(name)
    }
}

/// One match log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// What happened.
    pub event: LogKind,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Match the entry belongs to.
    pub match_id: String,
    /// Participant the entry is about.
    pub participant_id: String,
    /// Event-specific value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl LogRecord {
    /// Creates a log entry stamped with the current time.
    #[must_use]
    pub fn now(
        event: LogKind,
        match_id: impl Into<String>,
        participant_id: impl Into<String>,
        value: Option<String>,
    ) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
        Self {
            event,
            timestamp,
            match_id: match_id.into(),
            participant_id: participant_id.into(),
            value,
        }
    }
}

/// The persistence collaborator.
///
/// Implementations must be cheap to share: the level holds one behind an
/// `Arc` and the event bridge calls it from spawned tasks.
pub trait MatchStore: Send + Sync {
    /// Loads a match record.
    fn get_match<'a>(&'a self, match_id: &'a str) -> StoreFuture<'a, MatchRecord>;

    /// Loads the profile behind `collection/token`.
    fn get_participant_profile<'a>(
        &'a self,
        collection: &'a str,
        token: &'a str,
    ) -> StoreFuture<'a, ParticipantProfile>;

    /// Writes a participant outcome.
    fn create_outcome(&self, record: OutcomeRecord) -> StoreFuture<'_, ()>;

    /// Writes a log entry.
    fn create_log(&self, record: LogRecord) -> StoreFuture<'_, ()>;
}
