//! Experience collaborator and the read-through level table cache.

use std::sync::{Arc, Mutex, RwLock};

use log::info;

use crate::mission::errors::MissionError;
use crate::mission::storage::MissionStore;
use crate::mission::types::{ExperienceGrant, LevelTable};

/// Experience addition primitive consumed by the award side.
pub trait ExperienceLedger: Send + Sync {
    fn add_experience(&self, username: &str, amount: u32) -> Result<ExperienceGrant, MissionError>;
}

/// Read-through cache over the stored level table.
///
/// The table is loaded on first use and kept until [`LevelCache::invalidate`]
/// runs; [`LevelCache::replace`] writes a new table and invalidates in one step.
pub struct LevelCache {
    store: MissionStore,
    fallback: LevelTable,
    cached: RwLock<Option<Arc<LevelTable>>>,
}

impl LevelCache {
    pub fn new(store: MissionStore, fallback: LevelTable) -> Self {
        Self {
            store,
            fallback,
            cached: RwLock::new(None),
        }
    }

    pub fn table(&self) -> Result<Arc<LevelTable>, MissionError> {
        {
            let cached = self
                .cached
                .read()
                .map_err(|_| MissionError::Internal("level cache lock poisoned".to_string()))?;
            if let Some(table) = cached.as_ref() {
                return Ok(Arc::clone(table));
            }
        }

        let loaded = Arc::new(
            self.store
                .get_level_table()?
                .unwrap_or_else(|| self.fallback.clone()),
        );
        let mut cached = self
            .cached
            .write()
            .map_err(|_| MissionError::Internal("level cache lock poisoned".to_string()))?;
        *cached = Some(Arc::clone(&loaded));
        Ok(loaded)
    }

    pub fn invalidate(&self) {
        if let Ok(mut cached) = self.cached.write() {
            *cached = None;
        }
    }

    /// Persist a new table and drop the cached copy.
    pub fn replace(&self, table: &LevelTable) -> Result<(), MissionError> {
        self.store.put_level_table(table)?;
        self.invalidate();
        Ok(())
    }
}

pub struct ExperienceService {
    store: MissionStore,
    levels: Arc<LevelCache>,
    guard: Mutex<()>,
}

impl ExperienceService {
    pub fn new(store: MissionStore, levels: Arc<LevelCache>) -> Self {
        Self {
            store,
            levels,
            guard: Mutex::new(()),
        }
    }
}

impl ExperienceLedger for ExperienceService {
    fn add_experience(&self, username: &str, amount: u32) -> Result<ExperienceGrant, MissionError> {
        let table = self.levels.table()?;
        let _held = self
            .guard
            .lock()
            .map_err(|_| MissionError::Internal("experience lock poisoned".to_string()))?;

        let mut level_before = 1;
        let user = self.store.update_user(username, |user| {
            level_before = user.level;
            user.experience = user.experience.saturating_add(u64::from(amount));
            // never demote when the table changes underneath a user
            user.level = table.level_for(user.experience).max(user.level);
            Ok(())
        })?;
        let grant = ExperienceGrant {
            amount,
            total: user.experience,
            level_before,
            level_after: user.level,
        };

        if grant.leveled_up() {
            info!(
                "{} reached level {} ({} XP)",
                username, grant.level_after, grant.total
            );
        }
        Ok(grant)
    }
}
