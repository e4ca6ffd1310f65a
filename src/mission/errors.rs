use thiserror::Error;

use crate::mission::validation::IdentifierError;

/// Which strategy registry a failed lookup went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyFamily {
    Progress,
    Award,
}

impl std::fmt::Display for StrategyFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyFamily::Progress => write!(f, "progress"),
            StrategyFamily::Award => write!(f, "award"),
        }
    }
}

/// Errors that can arise while tracking missions and distributing rewards.
#[derive(Debug, Error)]
pub enum MissionError {
    /// Wrapper around sled's error type.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Wrapper around bincode serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Wrapper around IO errors (directory creation, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Returned when fetching a record that is not present.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Returned when deserializing a record with an unexpected schema version.
    #[error("schema mismatch for {entity}: expected {expected}, got {found}")]
    SchemaMismatch {
        entity: &'static str,
        expected: u8,
        found: u8,
    },

    /// No strategy registered for a discriminant. Always a configuration bug.
    #[error("no {family} strategy registered for '{key}'")]
    UnresolvedStrategy { family: StrategyFamily, key: String },

    /// Mission exists but is not in the available state.
    #[error("mission not available: {0}")]
    MissionUnavailable(String),

    /// Mission is restricted to assigned users and this user is not one of them.
    #[error("mission {mission_id} is not assigned to {username}")]
    MissionNotAssigned { username: String, mission_id: String },

    /// Completion guard tripped: the user already won this mission.
    #[error("mission {mission_id} already completed by {username}")]
    MissionAlreadyCompleted { username: String, mission_id: String },

    /// Title grant refused because the user already owns it.
    #[error("{username} already has title {title_id}")]
    AlreadyHasTitle { username: String, title_id: String },

    /// Wallet refused a mutation (zero amount, overflow).
    #[error("invalid currency operation: {0}")]
    InvalidCurrency(String),

    /// Identifier failed validation before reaching the store.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(#[from] IdentifierError),

    /// Non-UTF-8 bytes where a string key or log line was expected.
    #[error("utf-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Internal error (poisoned locks, unexpected conditions)
    #[error("internal error: {0}")]
    Internal(String),
}

impl MissionError {
    pub(crate) fn unresolved(family: StrategyFamily, key: impl Into<String>) -> Self {
        MissionError::UnresolvedStrategy {
            family,
            key: key.into(),
        }
    }

    /// True for errors that indicate a registry/configuration problem rather than data.
    pub fn is_configuration(&self) -> bool {
        matches!(self, MissionError::UnresolvedStrategy { .. })
    }
}
