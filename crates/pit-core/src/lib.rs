//! # Pit Core
//!
//! Server-authoritative arena battle simulation.
//!
//! A fixed roster of combatants is placed in a walled arena and fights
//! autonomously until one remains. Clients only observe: every phase,
//! roster and clock change is broadcast, and queries are answered from the
//! server's own state.
//!
//! ## Architecture
//!
//! - **Arena**: entity store with typed component storage and the spatial grid
//! - **Resolvers**: collision, combat and steering stages run once per tick
//! - **Simulation**: owns the arena, the resolvers and the seeded RNG
//! - **Level**: the match state machine around the simulation
//! - **Bridge**: non-blocking persistence of deaths, hits and outcomes
//! - **Gateway**: listener dispatch, broadcasts and correlated requests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pit_core::{Gateway, InMemoryStore, MatchConfig, MatchLevel};
//!
//! let config = MatchConfig::from_json_file("match.json")?;
//! let (gateway, requests) = Gateway::new(config.request_timeout);
//! let summary = MatchLevel::new("m1", config, store, gateway).run().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod arena;
pub mod bridge;
pub mod config;
pub mod entity;
pub mod error;
pub mod gateway;
pub mod level;
pub mod output;
pub mod resolver;
pub mod simulation;
pub mod store;

#[cfg(test)]
mod tests;

pub use arena::{Arena, Component};
pub use bridge::{DispatchReport, EventBridge, PersistRequest};
pub use config::{ArenaLayout, MatchConfig};
pub use entity::{EntityId, Status, Tier};
pub use error::{ConfigError, GatewayError, LevelError, StoreError};
pub use gateway::{Gateway, InboundMessage, OutboundMessage};
pub use level::{MatchLevel, MatchSummary, Phase};
pub use output::{CollisionPair, CombatEvent, TickFrame};
pub use resolver::{Resolver, Stage, TickContext};
pub use simulation::Simulation;
pub use store::{InMemoryStore, MatchStore};
