//! # Mission Engine - Progress Tracking and Reward Distribution
//!
//! A gamification core for community platforms: users make progress on
//! missions by doing things (owning items, making friends, posting), and
//! completing a mission grants its rewards (titles, coins, experience).
//!
//! ## Features
//!
//! - **Pluggable Progress**: Each requirement names a key; a strategy registered
//!   under that key computes the user's current count.
//! - **Idempotent Persistence**: One progress row per (user, requirement),
//!   overwritten in place, so repeated evaluation never duplicates state.
//! - **Fault-Isolated Rewards**: A failing reward is logged and skipped; the rest
//!   of the batch is still granted.
//! - **Completion Guard**: A mission is completed, and its rewards granted, at most
//!   once per user.
//! - **Sled Storage**: Bincode-encoded, schema-versioned records in named trees.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mission_engine::mission::{MissionEngine, MissionStoreBuilder};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MissionStoreBuilder::new("./data/missions")
//!         .with_starter_content()
//!         .open()?;
//!     let engine = MissionEngine::builder(store.clone()).build()?;
//!
//!     store.record_interaction("alice", "posts_published", 1)?;
//!     for (mission, outcome) in engine.handle_event("alice", "posts_published")? {
//!         println!("{}: {:?}", mission, outcome);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`mission`] - Data model, storage, strategies, and the completion pipeline
//! - [`config`] - Configuration management
//! - [`metrics`] - Process-wide pipeline counters
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  MissionEngine  │ ← event → progress → guard → complete → rewards
//! └─────────────────┘
//!     │         │
//! ┌────────┐ ┌────────┐
//! │Progress│ │ Award  │ ← strategy registries
//! └────────┘ └────────┘
//!     │         │
//! ┌─────────────────┐
//! │  MissionStore   │ ← Sled trees
//! └─────────────────┘
//! ```

pub mod config;
pub mod metrics;
pub mod mission;
