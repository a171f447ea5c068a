//! Test helper functions for setting up arenas, stores and matches.
//!
//! This module provides factory functions that make writing tests more
//! ergonomic and consistent.

use std::time::Duration;

use glam::Vec2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::arena::Arena;
use crate::config::{ArenaLayout, MatchConfig};
use crate::entity::{Behavior, EntityId, Rigidbody, Status, Strategy, Tier};
use crate::gateway::{GameStatus, Gateway, OutboundMessage};
use crate::output::{CollisionPair, TickFrame};
use crate::resolver::{Resolver, TickContext};
use crate::store::{InMemoryStore, MatchRecord, ParticipantEntry, ParticipantProfile};

/// Half extent every test body uses.
pub const HALF_EXTENT: f32 = 0.05;

// =============================================================================
// Bodies
// =============================================================================

/// Spawns a dynamic body with the standard half extent and `velocity`, and
/// inserts it into the grid.
pub fn spawn_body(arena: &mut Arena, position: Vec2, velocity: Vec2) -> EntityId {
    let id = arena.create(position, true);
    let mut body = Rigidbody::with_half_extent(HALF_EXTENT);
    body.velocity = velocity;
    arena.attach(id, body);
    arena.add_dynamic(id);
    id
}

/// Spawns a resting body carrying `status`, a fresh [`Behavior`] and an
/// empty [`Strategy`].
pub fn spawn_fighter(arena: &mut Arena, position: Vec2, status: Status) -> EntityId {
    let id = spawn_body(arena, position, Vec2::ZERO);
    arena.attach(id, status);
    arena.attach(id, Behavior::default());
    arena.attach(id, Strategy::default());
    id
}

/// A pre-existing overlap between `a` and `b`.
pub fn touching(a: EntityId, b: EntityId) -> CollisionPair {
    CollisionPair {
        a,
        b,
        normal: Vec2::new(-1.0, 0.0),
        time: 0.0,
    }
}

/// Runs one resolver once on a refreshed grid with a fixed seed.
pub fn run_resolver(resolver: &dyn Resolver, arena: &mut Arena, dt: f32) -> TickFrame {
    arena.refresh_grid();
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let mut ctx = TickContext {
        tick: arena.current_tick(),
        dt,
        rng: &mut rng,
    };
    let mut frame = TickFrame::new(ctx.tick);
    resolver.resolve(&mut ctx, arena, &mut frame);
    frame
}

// =============================================================================
// Matches
// =============================================================================

/// A profile with the given creature and stats.
pub fn profile(creature: &str, attack: f32, defence: f32, speed: f32, health: f32) -> ParticipantProfile {
    ParticipantProfile {
        name: format!("{creature} #{attack}"),
        creature: Tier::from_creature(creature),
        attack,
        defence,
        speed,
        health,
    }
}

/// A store holding match `match_id` with one participant per entry. Tokens
/// are `0xarena/<index>`.
pub fn arena_store(match_id: &str, participants: &[(&str, ParticipantProfile)]) -> InMemoryStore {
    let mut store = InMemoryStore::new();
    let mut entries = Vec::with_capacity(participants.len());
    for (index, (id, profile)) in participants.iter().enumerate() {
        entries.push(ParticipantEntry {
            id: (*id).to_owned(),
            token: format!("0xarena/{index}"),
            name: profile.name.clone(),
        });
        store = store.with_profile("0xarena", index.to_string(), profile.clone());
    }
    store.with_match(MatchRecord {
        id: match_id.to_owned(),
        participants: entries,
    })
}

/// Short phase delays and a walled arena.
pub fn fast_config() -> MatchConfig {
    MatchConfig {
        setup_delay: Duration::from_millis(300),
        countdown_step: Duration::from_millis(100),
        settlement_floor: Duration::from_secs(1),
        settlement_timeout: Duration::from_secs(2),
        speed_scale: 0.005,
        seed: 7,
        arena_layout: ArenaLayout::Border,
        ..MatchConfig::default()
    }
}

/// Two mismatched fighters: `p1` always wins.
pub fn duel_store(match_id: &str) -> InMemoryStore {
    arena_store(
        match_id,
        &[
            ("p1", profile("Wolves", 90.0, 30.0, 100.0, 200.0)),
            ("p2", profile("Avian", 40.0, 5.0, 100.0, 60.0)),
        ],
    )
}

/// Collects broadcasts with their arrival time until the final
/// `game-status awaiting`.
pub fn collect_broadcasts(gateway: &Gateway) -> JoinHandle<Vec<(Instant, OutboundMessage)>> {
    let mut rx = gateway.subscribe();
    tokio::spawn(async move {
        let mut seen = Vec::new();
        loop {
            match rx.recv().await {
                Ok(message) => {
                    let done = matches!(
                        message,
                        OutboundMessage::GameStatus {
                            game_status: GameStatus::Awaiting,
                            ..
                        }
                    );
                    seen.push((Instant::now(), message));
                    if done {
                        break;
                    }
                }
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
        seen
    })
}
