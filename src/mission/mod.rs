//! Mission engine: requirement progress, completion tracking, and reward
//! dispatch over a Sled-backed store.
//!
//! Progress and award behavior are pluggable strategies looked up in
//! registries built once at startup; [`MissionEngine`] ties the pieces
//! together for callers that just want "something happened, advance it".

pub mod award;
pub mod calculator;
pub mod errors;
pub mod experience;
pub mod logging;
pub mod notify;
pub mod orchestrator;
pub mod resolver;
pub mod state;
pub mod storage;
pub mod strategy;
pub mod tracker;
pub mod types;
pub mod validation;
pub mod wallet;

pub use award::{AwardService, AwardSummary};
pub use calculator::ProgressCalculator;
pub use errors::{MissionError, StrategyFamily};
pub use experience::{ExperienceLedger, ExperienceService, LevelCache};
pub use logging::{error_trace, escape_log, escape_log_full, ErrorLogger, StoreErrorLogger};
pub use notify::{MailboxNotifier, Notifier};
pub use orchestrator::{MissionAdvance, MissionEngine, MissionEngineBuilder};
pub use resolver::{AwardStrategyRegistry, ProgressStrategyRegistry};
pub use state::{seed_starter_missions, seed_starter_titles};
pub use storage::{MissionStore, MissionStoreBuilder, StoreStats};
pub use strategy::{ActivityStats, AwardStrategy, ProgressStrategy};
pub use tracker::ProgressTracker;
pub use types::*;
pub use validation::{validate_identifier, validate_username, IdentifierError};
pub use wallet::{StoreWallet, Wallet};
