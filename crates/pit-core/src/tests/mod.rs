//! In-crate tests spanning several modules.
//!
//! - `determinism.rs`: same seed, same ticks and same match
//! - `integration.rs`: whole matches on tokio's paused clock
//! - `helpers.rs`: arena, store and match factories shared with unit tests

mod helpers;

pub use helpers::*;
