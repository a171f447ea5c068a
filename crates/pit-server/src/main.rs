//! Headless match runner.
//!
//! Runs matches back to back against an in-memory store seeded with demo
//! rosters. Broadcasts and outbound requests are logged as JSON to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Three matches of eight participants with default settings
//! cargo run -p pit-server -- --matches m1 m2 m3
//!
//! # Custom config, fixed seed, debug logging
//! RUST_LOG=debug cargo run -p pit-server -- --config match.json --seed 42
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pit_core::gateway::OutboundMessage;
use pit_core::store::{MatchRecord, ParticipantEntry, ParticipantProfile};
use pit_core::{Gateway, InMemoryStore, MatchConfig, MatchLevel, Tier};

const CREATURES: [&str; 5] = ["Wolves", "Avian", "Hounds", "Insectoid", "Serpents"];
const COLLECTION: &str = "0xdemo";

#[derive(Parser)]
#[command(name = "pit-server")]
#[command(about = "Headless arena match runner")]
#[command(version)]
struct Cli {
    /// Match config (JSON). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Match ids to run, in order
    #[arg(short, long, num_args = 1.., default_value = "demo-1")]
    matches: Vec<String>,

    /// Participants per demo match
    #[arg(short, long, default_value = "8")]
    participants: u32,

    /// Override the config seed
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => MatchConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => MatchConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    config.validate().context("invalid config")?;

    let store = Arc::new(demo_store(&cli.matches, cli.participants));
    let (gateway, mut requests) = Gateway::new(config.request_timeout);

    let mut broadcasts = gateway.subscribe();
    tokio::spawn(async move {
        use tokio::sync::broadcast::error::RecvError;
        loop {
            match broadcasts.recv().await {
                Ok(message) => log_broadcast(&message),
                Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "broadcast log lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });
    tokio::spawn(async move {
        while let Some(request) = requests.recv().await {
            tracing::info!(correlation = %request.correlation, payload = %request.payload, "outbound request");
        }
    });

    tracing::info!(matches = cli.matches.len(), seed = config.seed, "starting pit server");
    let mut last_match = None;
    for match_id in &cli.matches {
        let summary = MatchLevel::new(match_id.as_str(), config.clone(), store.clone(), gateway.clone())
            .with_last_match(last_match.take())
            .run()
            .await
            .with_context(|| format!("match {match_id} failed to start"))?;
        tracing::info!(
            match_id = %summary.match_id,
            winner = ?summary.winner,
            deaths = summary.eliminations.len(),
            ticks = summary.fight_ticks,
            succeeded = summary.dispatch.succeeded,
            failed = summary.dispatch.failed,
            timed_out = summary.dispatch.timed_out,
            "match finished"
        );
        last_match = Some(match_id.clone());
    }

    let outcomes = store.outcomes().len();
    let logs = store.logs().len();
    tracing::info!(outcomes, logs, "all matches finished");
    Ok(())
}

fn log_broadcast(message: &OutboundMessage) {
    match serde_json::to_string(message) {
        Ok(json) => tracing::info!(target: "pit_server::broadcast", "{json}"),
        Err(error) => tracing::warn!(%error, "unserializable broadcast"),
    }
}

/// One roster per match, stats varied by position.
fn demo_store(matches: &[String], participants: u32) -> InMemoryStore {
    let mut store = InMemoryStore::new();
    for i in 0..participants {
        let creature = CREATURES[i as usize % CREATURES.len()];
        let step = f32::from(u16::try_from(i % 7).unwrap_or(0));
        store = store.with_profile(
            COLLECTION,
            i.to_string(),
            ParticipantProfile {
                name: format!("{creature} {i}"),
                creature: Tier::from_creature(creature),
                attack: 30.0 + 6.0 * step,
                defence: 5.0 + 2.0 * step,
                speed: 60.0 + 10.0 * step,
                health: 120.0 - 5.0 * step,
            },
        );
    }
    for match_id in matches {
        let entries = (0..participants)
            .map(|i| ParticipantEntry {
                id: format!("{match_id}-p{i}"),
                token: format!("{COLLECTION}/{i}"),
                name: String::new(),
            })
            .collect();
        store = store.with_match(MatchRecord {
            id: match_id.clone(),
            participants: entries,
        });
    }
    store
}
