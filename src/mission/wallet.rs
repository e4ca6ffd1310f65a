//! Wallet collaborator: balance mutation with an append-only ledger.

use std::sync::Mutex;

use log::debug;

use crate::mission::errors::MissionError;
use crate::mission::storage::MissionStore;
use crate::mission::types::LedgerEntry;

/// Fund-addition primitive consumed by the award side.
pub trait Wallet: Send + Sync {
    /// Credit `amount` coins and record a ledger entry tagged with `description`.
    fn add_funds(&self, username: &str, amount: i64, description: &str) -> Result<LedgerEntry, MissionError>;

    fn balance(&self, username: &str) -> Result<i64, MissionError>;
}

/// Wallet backed by the user records and ledger tree of a [`MissionStore`].
pub struct StoreWallet {
    store: MissionStore,
    // ledger key order follows commit order
    guard: Mutex<()>,
}

impl StoreWallet {
    pub fn new(store: MissionStore) -> Self {
        Self {
            store,
            guard: Mutex::new(()),
        }
    }
}

impl Wallet for StoreWallet {
    fn add_funds(&self, username: &str, amount: i64, description: &str) -> Result<LedgerEntry, MissionError> {
        if amount <= 0 {
            return Err(MissionError::InvalidCurrency(format!(
                "credit amount must be positive, got {}",
                amount
            )));
        }

        let _held = self
            .guard
            .lock()
            .map_err(|_| MissionError::Internal("wallet lock poisoned".to_string()))?;

        let entry = self.store.credit_user(username, amount, description)?;
        debug!("credited {} coins to {} ({})", amount, username, description);
        Ok(entry)
    }

    fn balance(&self, username: &str) -> Result<i64, MissionError> {
        match self.store.get_user(username) {
            Ok(user) => Ok(user.balance),
            Err(MissionError::NotFound(_)) => Ok(0),
            Err(e) => Err(e),
        }
    }
}
