//! In-memory [`MatchStore`] backend.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::error::StoreError;

use super::{LogRecord, MatchRecord, MatchStore, OutcomeRecord, ParticipantProfile, StoreFuture};

/// A [`MatchStore`] holding everything in process memory.
///
/// Reads come from records registered up front with the builder methods.
/// Writes are kept in arrival order and can be inspected afterwards. Write
/// latency and write failures can be injected.
///
/// # Example
///
/// ```
/// use pit_core::store::{InMemoryStore, MatchRecord};
///
/// let store = InMemoryStore::new().with_match(MatchRecord {
///     id: "m1".into(),
///     participants: vec![],
/// });
/// assert!(store.outcomes().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    matches: HashMap<String, MatchRecord>,
    profiles: HashMap<(String, String), ParticipantProfile>,
    write_latency: Duration,
    fail_writes: bool,
    outcomes: Mutex<Vec<OutcomeRecord>>,
    logs: Mutex<Vec<LogRecord>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a match record.
    #[must_use]
    pub fn with_match(mut self, record: MatchRecord) -> Self {
        self.matches.insert(record.id.clone(), record);
        self
    }

    /// Registers the profile behind `collection/token`.
    #[must_use]
    pub fn with_profile(
        mut self,
        collection: impl Into<String>,
        token: impl Into<String>,
        profile: ParticipantProfile,
    ) -> Self {
        self.profiles.insert((collection.into(), token.into()), profile);
        self
    }

    /// Delays every write by `latency`.
    #[must_use]
    pub fn with_write_latency(mut self, latency: Duration) -> Self {
        self.write_latency = latency;
        self
    }

    /// Makes every write fail with [`StoreError::Unavailable`].
    #[must_use]
    pub fn with_failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Outcomes written so far, in arrival order.
    #[must_use]
    pub fn outcomes(&self) -> Vec<OutcomeRecord> {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Logs written so far, in arrival order.
    #[must_use]
    pub fn logs(&self) -> Vec<LogRecord> {
        self.logs.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    async fn write_delay(&self) -> Result<(), StoreError> {
        if !self.write_latency.is_zero() {
            tokio::time::sleep(self.write_latency).await;
        }
        if self.fail_writes {
            return Err(StoreError::Unavailable("writes disabled".into()));
        }
        Ok(())
    }
}

impl MatchStore for InMemoryStore {
    fn get_match<'a>(&'a self, match_id: &'a str) -> StoreFuture<'a, MatchRecord> {
        Box::pin(async move {
            self.matches
                .get(match_id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound {
                    kind: "match",
                    id: match_id.to_owned(),
                })
        })
    }

    fn get_participant_profile<'a>(
        &'a self,
        collection: &'a str,
        token: &'a str,
    ) -> StoreFuture<'a, ParticipantProfile> {
        Box::pin(async move {
            self.profiles
                .get(&(collection.to_owned(), token.to_owned()))
                .cloned()
                .ok_or_else(|| StoreError::NotFound {
                    kind: "profile",
                    id: format!("{collection}/{token}"),
                })
        })
    }

    fn create_outcome(&self, record: OutcomeRecord) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.write_delay().await?;
            self.outcomes
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(record);
            Ok(())
        })
    }

    fn create_log(&self, record: LogRecord) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.write_delay().await?;
            self.logs
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(record);
            Ok(())
        })
    }
}
