//! Match lifecycle.
//!
//! A [`MatchLevel`] runs one match from setup to settlement:
//!
//! ```text
//! setup ─► Spawn ─► Countdown3 ─► … ─► Countdown0 ─► Fight ─► settlement ─► Ended
//!  │                                                   │
//!  └ store lookups                    Simulation::step per tick, deaths and
//!                                     hits queued on the EventBridge
//! ```
//!
//! The simulation only ticks during `Fight`. Every phase change and roster
//! change is broadcast before the next tick runs. Inbound queries are
//! answered from a [`LevelSnapshot`] the level refreshes between ticks.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use pit_core::config::MatchConfig;
//! use pit_core::gateway::Gateway;
//! use pit_core::level::MatchLevel;
//! use pit_core::store::InMemoryStore;
//!
//! # async fn demo() -> Result<(), pit_core::error::LevelError> {
//! let config = MatchConfig::default();
//! let (gateway, _requests) = Gateway::new(config.request_timeout);
//! let store = Arc::new(InMemoryStore::new());
//! let summary = MatchLevel::new("m1", config, store, gateway).run().await?;
//! println!("winner: {:?}", summary.winner);
//! # Ok(())
//! # }
//! ```

mod phase;
mod roster;

pub use phase::Phase;
pub use roster::{Roster, RosterEntry};

use std::collections::BTreeMap;
use std::f32::consts::TAU;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{interval, sleep, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::arena::Arena;
use crate::bridge::{DispatchReport, EventBridge, PersistRequest};
use crate::config::MatchConfig;
use crate::entity::{Behavior, DeathReport, Rigidbody, Status};
use crate::error::LevelError;
use crate::gateway::{
    GameStatus, Gateway, InboundMessage, ListenerId, MessageCategory, OutboundMessage,
};
use crate::simulation::Simulation;
use crate::store::{LogKind, LogRecord, MatchStore, OutcomeRecord, ParticipantProfile};

/// Radius of the ring participants spawn on.
pub const SPAWN_RADIUS: f32 = 0.6;

const RADIUS_JITTER: f32 = 0.05;
const ANGLE_JITTER: f32 = 0.1;

// =============================================================================
// Snapshot
// =============================================================================

/// Authoritative values inbound queries are answered with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSnapshot {
    /// Match being run.
    pub match_id: String,
    /// Match run before it, if any.
    pub last_match_id: Option<String>,
    /// Current phase.
    pub phase: Phase,
    /// Lobby state.
    pub status: GameStatus,
    /// Living participants.
    pub remaining: usize,
    /// Participants at spawn.
    pub total: usize,
    /// Participant id to display name.
    pub names: BTreeMap<String, String>,
}

impl LevelSnapshot {
    /// `remain-players` for the current roster.
    #[must_use]
    pub fn remain_players(&self) -> OutboundMessage {
        OutboundMessage::RemainPlayers {
            remaining_players: self.remaining,
            total_players: self.total,
        }
    }

    /// `game-status` for the current lobby state.
    #[must_use]
    pub fn game_status(&self) -> OutboundMessage {
        OutboundMessage::GameStatus {
            game_id: self.match_id.clone(),
            last_game_id: self.last_match_id.clone(),
            game_status: self.status,
        }
    }

    /// Answers an inbound query. Returns whether the message was handled.
    ///
    /// `connection-open` gets no direct reply and is left unhandled so other
    /// listeners still see the connection. The level broadcasts the roster
    /// size to new connections after `connection_reply_delay`.
    pub fn answer(&self, message: &InboundMessage, replies: &mut Vec<OutboundMessage>) -> bool {
        match message {
            InboundMessage::GameStatus => {
                replies.push(self.game_status());
                true
            }
            InboundMessage::PlayerNames => {
                replies.push(OutboundMessage::PlayerNames {
                    game_id: self.match_id.clone(),
                    names: self.names.clone(),
                });
                true
            }
            InboundMessage::GameState => {
                replies.push(OutboundMessage::GameState { phase: self.phase });
                true
            }
            InboundMessage::ConnectionOpen { .. } | InboundMessage::Response { .. } => false,
        }
    }
}

// =============================================================================
// Summary
// =============================================================================

/// One participant's death.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Elimination {
    /// Participant that died.
    pub participant_id: String,
    /// Participant that landed the lethal hit.
    pub killer: Option<String>,
    /// Participants alive just before the death.
    pub rank: usize,
    /// Outcome persisted for the participant.
    pub outcome: OutcomeRecord,
}

/// Result of a completed match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSummary {
    /// Match that ran.
    pub match_id: String,
    /// Last participant standing.
    pub winner: Option<String>,
    /// Deaths in the order they happened.
    pub eliminations: Vec<Elimination>,
    /// Simulation ticks run during the fight.
    pub fight_ticks: u64,
    /// Persistence totals.
    pub dispatch: DispatchReport,
}

// =============================================================================
// MatchLevel
// =============================================================================

/// One match, ready to run.
pub struct MatchLevel {
    match_id: String,
    last_match_id: Option<String>,
    config: MatchConfig,
    store: Arc<dyn MatchStore>,
    gateway: Gateway,
}

impl fmt::Debug for MatchLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchLevel")
            .field("match_id", &self.match_id)
            .field("last_match_id", &self.last_match_id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MatchLevel {
    /// Creates a level for `match_id`. Nothing is loaded until [`run`](Self::run).
    #[must_use]
    pub fn new(
        match_id: impl Into<String>,
        config: MatchConfig,
        store: Arc<dyn MatchStore>,
        gateway: Gateway,
    ) -> Self {
        Self {
            match_id: match_id.into(),
            last_match_id: None,
            config,
            store,
            gateway,
        }
    }

    /// Records the match run before this one, reported by `game-status`.
    #[must_use]
    pub fn with_last_match(mut self, last_match_id: Option<String>) -> Self {
        self.last_match_id = last_match_id;
        self
    }

    /// Match this level runs.
    #[must_use]
    pub fn match_id(&self) -> &str {
        &self.match_id
    }

    /// Runs the match to completion.
    ///
    /// # Errors
    ///
    /// Returns a [`LevelError`] if setup fails. Nothing is broadcast and no
    /// listener stays registered in that case. Once the fight starts the
    /// match always completes; persistence failures are only counted.
    pub async fn run(self) -> Result<MatchSummary, LevelError> {
        let mut live = self.setup().await?;
        live.spawn();
        live.countdown().await;
        live.fight().await;
        Ok(live.settle().await)
    }

    async fn setup(self) -> Result<LiveMatch, LevelError> {
        let Self {
            match_id,
            last_match_id,
            config,
            store,
            gateway,
        } = self;

        let record = store
            .get_match(&match_id)
            .await
            .map_err(|source| LevelError::MatchLookup {
                match_id: match_id.clone(),
                source,
            })?;
        if record.participants.is_empty() {
            return Err(LevelError::EmptyRoster { match_id });
        }

        let mut entrants = Vec::with_capacity(record.participants.len());
        for entry in record.participants {
            let Some((collection, token)) = entry.token_parts() else {
                return Err(LevelError::InvalidToken {
                    participant: entry.id.clone(),
                    token: entry.token.clone(),
                });
            };
            let profile = store
                .get_participant_profile(collection, token)
                .await
                .map_err(|source| LevelError::ProfileLookup {
                    participant: entry.id.clone(),
                    source,
                })?;
            entrants.push((entry, profile));
        }

        let mut arena = Arena::new(config.grid_width, config.grid_height)?;
        for (col, row) in config
            .arena_layout
            .cells(config.grid_width, config.grid_height)
        {
            arena.add_static(col, row);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let (death_tx, deaths) = mpsc::unbounded_channel();
        let mut roster = Roster::new();
        let mut bridge = EventBridge::new(Arc::clone(&store), config.max_pending_dispatches);
        let count = entrants.len();

        for (index, (entry, profile)) in entrants.into_iter().enumerate() {
            let entity = arena.create(spawn_point(index, count, &mut rng), true);
            arena.attach(entity, Rigidbody::with_half_extent(config.participant_half_extent));
            arena.attach(entity, status_for(&profile, death_tx.clone()));
            arena.attach(entity, Behavior::default());
            arena.attach(entity, config.strategy_for(profile.creature));
            arena.add_dynamic(entity);

            bridge.enqueue(PersistRequest::Log(LogRecord::now(
                LogKind::Entrants,
                match_id.as_str(),
                entry.id.as_str(),
                None,
            )));
            let name = if entry.name.is_empty() {
                profile.name
            } else {
                entry.name
            };
            roster.push(RosterEntry {
                participant_id: entry.id,
                name,
                entity,
            });
        }

        let snapshot = Arc::new(Mutex::new(LevelSnapshot {
            match_id: match_id.clone(),
            last_match_id,
            phase: Phase::Spawn,
            status: GameStatus::Lobby,
            remaining: roster.remaining(),
            total: roster.total(),
            names: roster.names(),
        }));
        let listeners = register_listeners(&gateway, &snapshot, config.connection_reply_delay);
        let sim = Simulation::new(arena, config.seed, config.speed_scale);

        info!(match_id = %match_id, participants = count, "match loaded");
        Ok(LiveMatch {
            match_id,
            config,
            gateway,
            sim,
            roster,
            bridge,
            deaths,
            snapshot,
            listeners,
            phase: Phase::Spawn,
            elapsed: Duration::ZERO,
            announced_seconds: 0,
            fight_ticks: 0,
            eliminations: Vec::new(),
        })
    }
}

fn status_for(profile: &ParticipantProfile, deaths: mpsc::UnboundedSender<DeathReport>) -> Status {
    let mut status = Status::new(profile.attack, profile.defence, profile.speed, profile.health)
        .with_tier(profile.creature);
    status.set_on_die(Box::new(move |report| {
        // The receiver only goes away with the level itself.
        let _ = deaths.send(report);
    }));
    status
}

#[allow(clippy::cast_precision_loss)]
fn spawn_point(index: usize, count: usize, rng: &mut ChaCha8Rng) -> Vec2 {
    let angle = TAU * index as f32 / count as f32 + rng.gen_range(-ANGLE_JITTER..=ANGLE_JITTER);
    let radius = SPAWN_RADIUS + rng.gen_range(-RADIUS_JITTER..=RADIUS_JITTER);
    Vec2::from_angle(angle) * radius
}

fn register_listeners(
    gateway: &Gateway,
    snapshot: &Arc<Mutex<LevelSnapshot>>,
    reply_delay: Duration,
) -> Vec<ListenerId> {
    let mut ids: Vec<ListenerId> = [
        MessageCategory::GameStatus,
        MessageCategory::PlayerNames,
        MessageCategory::GameState,
    ]
    .into_iter()
    .map(|category| {
        let snapshot = Arc::clone(snapshot);
        gateway.add_listener(
            category,
            Box::new(move |message, replies| {
                snapshot
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .answer(message, replies)
            }),
        )
    })
    .collect();

    let snapshot = Arc::clone(snapshot);
    let notifier = gateway.clone();
    ids.push(gateway.add_listener(
        MessageCategory::ConnectionOpen,
        Box::new(move |_, _| {
            announce_roster_later(&notifier, &snapshot, reply_delay);
            false
        }),
    ));
    ids
}

/// Broadcasts `remain-players` from the snapshot once `delay` has passed.
fn announce_roster_later(gateway: &Gateway, snapshot: &Arc<Mutex<LevelSnapshot>>, delay: Duration) {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        warn!("connection opened outside a runtime, roster reply dropped");
        return;
    };
    let gateway = gateway.clone();
    let snapshot = Arc::clone(snapshot);
    runtime.spawn(async move {
        sleep(delay).await;
        let message = snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remain_players();
        gateway.broadcast(message);
    });
}

/// Damage log value: applied damage rounded to a whole number.
#[allow(clippy::cast_possible_truncation)]
fn damage_value(applied: f32) -> String {
    (applied.round() as i64).to_string()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn outcome_record(participant_id: &str, status: &Status) -> OutcomeRecord {
    OutcomeRecord {
        participant_id: participant_id.to_owned(),
        survived_seconds: status.survived.max(0.0).floor() as u64,
        kills: status.kills,
        final_health: status.health.ceil() as i64,
    }
}

// =============================================================================
// LiveMatch
// =============================================================================

/// A loaded match. Removes its listeners when dropped.
struct LiveMatch {
    match_id: String,
    config: MatchConfig,
    gateway: Gateway,
    sim: Simulation,
    roster: Roster,
    bridge: EventBridge,
    deaths: mpsc::UnboundedReceiver<DeathReport>,
    snapshot: Arc<Mutex<LevelSnapshot>>,
    listeners: Vec<ListenerId>,
    phase: Phase,
    elapsed: Duration,
    announced_seconds: u64,
    fight_ticks: u64,
    eliminations: Vec<Elimination>,
}

impl fmt::Debug for LiveMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveMatch")
            .field("match_id", &self.match_id)
            .field("phase", &self.phase)
            .field("remaining", &self.roster.remaining())
            .field("fight_ticks", &self.fight_ticks)
            .field("bridge", &self.bridge)
            .finish_non_exhaustive()
    }
}

impl Drop for LiveMatch {
    fn drop(&mut self) {
        for id in self.listeners.drain(..) {
            self.gateway.remove_listener(id);
        }
    }
}

impl LiveMatch {
    fn spawn(&mut self) {
        self.bridge.flush();
        self.broadcast(self.remain_players());
        self.broadcast(OutboundMessage::GameState { phase: self.phase });
        info!(match_id = %self.match_id, phase = %self.phase, "phase entered");
    }

    async fn countdown(&mut self) {
        sleep(self.config.setup_delay).await;
        while self.advance().is_some_and(Phase::is_countdown) {
            sleep(self.config.countdown_step).await;
        }
    }

    async fn fight(&mut self) {
        debug_assert_eq!(self.phase, Phase::Fight);
        self.elapsed = Duration::ZERO;
        self.announced_seconds = 0;

        let step = self.config.tick_interval();
        let mut ticker = interval(step);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        while self.roster.remaining() > 1 {
            ticker.tick().await;
            self.update(step);
        }
    }

    /// One fight tick: step the simulation, turn its events into
    /// persistence requests and broadcasts, then refresh the snapshot.
    fn update(&mut self, step: Duration) {
        self.elapsed += step;
        self.fight_ticks += 1;
        let frame = self.sim.step(step.as_secs_f32());

        for (_, target, applied) in frame.hits() {
            let Some(participant) = self.roster.participant_of(target) else {
                continue;
            };
            let record = LogRecord::now(
                LogKind::Damage,
                self.match_id.as_str(),
                participant,
                Some(damage_value(applied)),
            );
            self.bridge.enqueue(PersistRequest::Log(record));
        }

        while let Ok(report) = self.deaths.try_recv() {
            self.eliminate(&report);
        }

        let seconds = self.elapsed.as_secs();
        if seconds > self.announced_seconds {
            self.announced_seconds = seconds;
            self.broadcast(OutboundMessage::game_time(self.elapsed));
        }

        self.bridge.flush();
        self.sync_snapshot(|_| {});
    }

    fn eliminate(&mut self, report: &DeathReport) {
        let Some((entry, rank)) = self.roster.eliminate(report.entity) else {
            warn!(match_id = %self.match_id, entity = %report.entity, "death of unknown participant");
            return;
        };
        let killer = report
            .killer
            .and_then(|k| self.roster.participant_of(k))
            .map(str::to_owned);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let outcome = OutcomeRecord {
            participant_id: entry.participant_id.clone(),
            survived_seconds: report.survived.max(0.0).floor() as u64,
            kills: report.kills,
            final_health: report.final_health.ceil() as i64,
        };
        self.bridge.enqueue(PersistRequest::Outcome(outcome.clone()));
        if let Some(killer) = &killer {
            self.bridge.enqueue(PersistRequest::Log(LogRecord::now(
                LogKind::Kills,
                self.match_id.as_str(),
                killer.as_str(),
                Some(entry.participant_id.clone()),
            )));
        }
        self.bridge.enqueue(PersistRequest::Log(LogRecord::now(
            LogKind::FinalRank,
            self.match_id.as_str(),
            entry.participant_id.as_str(),
            Some(rank.to_string()),
        )));

        info!(
            match_id = %self.match_id,
            participant = %entry.participant_id,
            killer = ?killer,
            rank,
            "participant eliminated"
        );
        self.sync_snapshot(|_| {});
        self.broadcast(self.remain_players());
        self.eliminations.push(Elimination {
            participant_id: entry.participant_id,
            killer,
            rank,
            outcome,
        });
    }

    async fn settle(mut self) -> MatchSummary {
        let started = Instant::now();
        self.broadcast(self.remain_players());
        self.bridge.drain_and_await(self.config.settlement_timeout).await;

        let winner = self.roster.survivors().next().cloned();
        if let Some(entry) = &winner {
            let outcome = self
                .sim
                .arena()
                .get::<Status>(entry.entity)
                .map(|status| outcome_record(&entry.participant_id, status));
            let winners = LogRecord::now(
                LogKind::Winners,
                self.match_id.as_str(),
                entry.participant_id.as_str(),
                None,
            );
            let requests = outcome
                .map(PersistRequest::Outcome)
                .into_iter()
                .chain([PersistRequest::Log(winners)]);
            for request in requests {
                if !self
                    .bridge
                    .dispatch_now(request, self.config.settlement_timeout)
                    .await
                {
                    warn!(match_id = %self.match_id, participant = %entry.participant_id, "winner record not persisted");
                }
            }
            info!(match_id = %self.match_id, winner = %entry.participant_id, "match won");
        }

        sleep_until(started + self.config.settlement_floor).await;
        self.advance();
        self.sync_snapshot(|s| s.status = GameStatus::Awaiting);
        let status = self.lock_snapshot().game_status();
        self.broadcast(status);

        MatchSummary {
            match_id: self.match_id.clone(),
            winner: winner.map(|e| e.participant_id),
            eliminations: std::mem::take(&mut self.eliminations),
            fight_ticks: self.fight_ticks,
            dispatch: self.bridge.report(),
        }
    }

    /// Moves to the next phase and broadcasts it.
    fn advance(&mut self) -> Option<Phase> {
        let next = self.phase.next()?;
        self.phase = next;
        self.sync_snapshot(|_| {});
        self.broadcast(OutboundMessage::GameState { phase: next });
        info!(match_id = %self.match_id, phase = %next, "phase entered");
        Some(next)
    }

    fn remain_players(&self) -> OutboundMessage {
        OutboundMessage::RemainPlayers {
            remaining_players: self.roster.remaining(),
            total_players: self.roster.total(),
        }
    }

    fn broadcast(&self, message: OutboundMessage) {
        let receivers = self.gateway.broadcast(message);
        debug!(match_id = %self.match_id, receivers, "broadcast sent");
    }

    fn lock_snapshot(&self) -> std::sync::MutexGuard<'_, LevelSnapshot> {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sync_snapshot(&self, edit: impl FnOnce(&mut LevelSnapshot)) {
        let mut snapshot = self.lock_snapshot();
        snapshot.phase = self.phase;
        snapshot.remaining = self.roster.remaining();
        edit(&mut snapshot);
    }
}
