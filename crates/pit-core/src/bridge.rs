//! Event bridge: non-blocking persistence of match events.
//!
//! The level queues [`PersistRequest`]s while it ticks. [`EventBridge::flush`]
//! spawns queued requests as tasks on the current tokio runtime without
//! waiting for them, so a slow store never stalls the tick. Finished tasks
//! are reaped on the next flush.
//!
//! # Architecture
//!
//! ```text
//! enqueue ──► queue (VecDeque) ──flush──► pending (JoinSet, ≤ capacity)
//!                                             │
//!                       drain_and_await ◄─────┘  (settlement only)
//! ```
//!
//! Failures are counted and logged, never retried.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;

use crate::error::StoreError;
use crate::store::{LogRecord, MatchStore, OutcomeRecord};

/// A write waiting to go to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PersistRequest {
    /// A participant outcome.
    Outcome(OutcomeRecord),
    /// A match log entry.
    Log(LogRecord),
}

impl PersistRequest {
    /// Sends this request to `store`.
    ///
    /// # Errors
    ///
    /// Returns whatever the store reports.
    pub async fn send(self, store: &dyn MatchStore) -> Result<(), StoreError> {
        match self {
            Self::Outcome(record) => store.create_outcome(record).await,
            Self::Log(record) => store.create_log(record).await,
        }
    }
}

/// Aggregate result of dispatched requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    /// Requests the store accepted.
    pub succeeded: usize,
    /// Requests the store rejected or that panicked.
    pub failed: usize,
    /// Requests abandoned when a drain ran out of time.
    pub timed_out: usize,
}

impl DispatchReport {
    /// Returns `true` if nothing failed or timed out.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.timed_out == 0
    }
}

/// Queue plus bounded pending set in front of a [`MatchStore`].
pub struct EventBridge {
    store: Arc<dyn MatchStore>,
    queue: VecDeque<PersistRequest>,
    pending: JoinSet<Result<(), StoreError>>,
    capacity: usize,
    report: DispatchReport,
}

impl fmt::Debug for EventBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBridge")
            .field("queued", &self.queue.len())
            .field("in_flight", &self.pending.len())
            .field("capacity", &self.capacity)
            .field("report", &self.report)
            .finish_non_exhaustive()
    }
}

impl EventBridge {
    /// Creates a bridge allowing at most `capacity` dispatches in flight.
    /// A capacity of zero is treated as one.
    #[must_use]
    pub fn new(store: Arc<dyn MatchStore>, capacity: usize) -> Self {
        Self {
            store,
            queue: VecDeque::new(),
            pending: JoinSet::new(),
            capacity: capacity.max(1),
            report: DispatchReport::default(),
        }
    }

    /// Appends a request to the queue. Nothing is sent until the next flush.
    pub fn enqueue(&mut self, request: PersistRequest) {
        self.queue.push_back(request);
    }

    /// Requests waiting for a free slot.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Dispatches spawned and not yet reaped.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Counts so far.
    #[must_use]
    pub fn report(&self) -> DispatchReport {
        self.report
    }

    /// The store requests go to.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn MatchStore> {
        &self.store
    }

    /// Reaps finished dispatches, then spawns queued requests oldest first
    /// until the pending set is full. Returns the number spawned.
    ///
    /// Never waits. Must be called from within a tokio runtime.
    pub fn flush(&mut self) -> usize {
        while let Some(result) = self.pending.try_join_next() {
            self.record(result);
        }

        let mut spawned = 0;
        while self.pending.len() < self.capacity {
            let Some(request) = self.queue.pop_front() else {
                break;
            };
            let store = Arc::clone(&self.store);
            self.pending.spawn(async move { request.send(store.as_ref()).await });
            spawned += 1;
        }
        spawned
    }

    /// Dispatches everything still queued and waits for every dispatch to
    /// settle, for at most `limit`.
    ///
    /// On timeout the unfinished dispatches are aborted, the queue is dropped
    /// and both are counted as timed out. Returns the report for the whole
    /// lifetime of the bridge.
    pub async fn drain_and_await(&mut self, limit: Duration) -> DispatchReport {
        let deadline = Instant::now() + limit;
        loop {
            self.flush();
            match tokio::time::timeout_at(deadline, self.pending.join_next()).await {
                Ok(Some(result)) => self.record(result),
                Ok(None) if self.queue.is_empty() => break,
                Ok(None) => {}
                Err(_) => {
                    let abandoned = self.pending.len() + self.queue.len();
                    tracing::warn!(abandoned, ?limit, "dispatch drain timed out");
                    self.report.timed_out += abandoned;
                    self.queue.clear();
                    self.pending.shutdown().await;
                    break;
                }
            }
        }
        tracing::info!(
            succeeded = self.report.succeeded,
            failed = self.report.failed,
            timed_out = self.report.timed_out,
            "dispatches settled"
        );
        self.report
    }

    /// Sends `request` immediately, bypassing the queue, and waits at most
    /// `limit` for the store. Returns `true` if the store accepted it.
    ///
    /// The result is counted in the report like any queued dispatch.
    pub async fn dispatch_now(&mut self, request: PersistRequest, limit: Duration) -> bool {
        match tokio::time::timeout(limit, request.send(self.store.as_ref())).await {
            Ok(result) => {
                let accepted = result.is_ok();
                self.record(Ok(result));
                accepted
            }
            Err(_) => {
                tracing::warn!(?limit, "direct dispatch timed out");
                self.report.timed_out += 1;
                false
            }
        }
    }

    fn record(&mut self, result: Result<Result<(), StoreError>, JoinError>) {
        match result {
            Ok(Ok(())) => self.report.succeeded += 1,
            Ok(Err(error)) => {
                tracing::warn!(%error, "dispatch failed");
                self.report.failed += 1;
            }
            Err(error) => {
                tracing::warn!(%error, "dispatch task did not complete");
                self.report.failed += 1;
            }
        }
    }
}
