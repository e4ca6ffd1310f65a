//! Completion orchestration: the glue a caller runs when something happened
//! that may have moved a user closer to a mission.
//!
//! Sequence per (user, mission): update every requirement's progress, re-check
//! completion against the freshly written state, consult the completion guard,
//! mark the mission complete, then dispatch its rewards. Work on one
//! (user, mission) pair is serialized through a keyed lock table so two events
//! racing on the same pair cannot both pass the guard.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use log::{debug, info};

use crate::metrics;
use crate::mission::award::{AwardService, AwardSummary};
use crate::mission::calculator::ProgressCalculator;
use crate::mission::errors::MissionError;
use crate::mission::experience::{ExperienceLedger, ExperienceService, LevelCache};
use crate::mission::logging::{ErrorLogger, StoreErrorLogger};
use crate::mission::notify::{MailboxNotifier, Notifier};
use crate::mission::resolver::{AwardStrategyRegistry, ProgressStrategyRegistry};
use crate::mission::storage::MissionStore;
use crate::mission::strategy::{AwardStrategy, CurrencyAwardStrategy, ProgressStrategy};
use crate::mission::tracker::ProgressTracker;
use crate::mission::types::{LevelTable, MissionRecord, RewardableKind};
use crate::mission::validation::{validate_identifier, validate_username};
use crate::mission::wallet::{StoreWallet, Wallet};

/// Result of advancing one mission for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissionAdvance {
    InProgress { completed: usize, total: usize },
    Completed { summary: AwardSummary },
}

impl MissionAdvance {
    pub fn is_completed(&self) -> bool {
        matches!(self, MissionAdvance::Completed { .. })
    }
}

/// One mutex per (user, mission) pair, created on first use and dropped once
/// no caller holds a lease on it.
#[derive(Clone, Default)]
struct MissionLocks {
    slots: Arc<RwLock<HashMap<String, Arc<Mutex<()>>>>>,
}

/// A claim on one slot of the lock table. Dropping it prunes the slot when it
/// was the last claim.
struct SlotLease<'a> {
    table: &'a MissionLocks,
    key: String,
    slot: Arc<Mutex<()>>,
}

impl MissionLocks {
    fn slot(&self, username: &str, mission_id: &str) -> Result<SlotLease<'_>, MissionError> {
        let key = format!("{}:{}", username.to_ascii_lowercase(), mission_id);
        {
            let slots = self
                .slots
                .read()
                .map_err(|_| MissionError::Internal("mission lock table poisoned".to_string()))?;
            if let Some(slot) = slots.get(&key) {
                let slot = Arc::clone(slot);
                return Ok(SlotLease { table: self, key, slot });
            }
        }
        let mut slots = self
            .slots
            .write()
            .map_err(|_| MissionError::Internal("mission lock table poisoned".to_string()))?;
        let slot = Arc::clone(slots.entry(key.clone()).or_default());
        Ok(SlotLease { table: self, key, slot })
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.read().map(|slots| slots.len()).unwrap_or(0)
    }
}

impl SlotLease<'_> {
    fn lock(&self) -> Result<MutexGuard<'_, ()>, MissionError> {
        self.slot
            .lock()
            .map_err(|_| MissionError::Internal("mission lock poisoned".to_string()))
    }
}

impl Drop for SlotLease<'_> {
    fn drop(&mut self) {
        // leases are only cloned out of the table under its lock, so a count of
        // two here (table + this lease) cannot grow while the write lock is held
        if let Ok(mut slots) = self.table.slots.write() {
            if Arc::strong_count(&self.slot) == 2 {
                slots.remove(&self.key);
            }
        }
    }
}

pub struct MissionEngine {
    store: MissionStore,
    tracker: ProgressTracker,
    awards: AwardService,
    levels: Arc<LevelCache>,
    locks: MissionLocks,
}

impl MissionEngine {
    pub fn builder(store: MissionStore) -> MissionEngineBuilder {
        MissionEngineBuilder::new(store)
    }

    pub fn store(&self) -> &MissionStore {
        &self.store
    }

    pub fn calculator(&self) -> &ProgressCalculator {
        self.tracker.calculator()
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    pub fn awards(&self) -> &AwardService {
        &self.awards
    }

    pub fn levels(&self) -> &LevelCache {
        &self.levels
    }

    /// Run the full pipeline for one mission.
    ///
    /// Errors: `NotFound`, `MissionUnavailable`, `MissionNotAssigned`,
    /// `MissionAlreadyCompleted` (the guard), plus configuration and
    /// persistence errors from the steps below.
    pub fn advance_mission(&self, username: &str, mission_id: &str) -> Result<MissionAdvance, MissionError> {
        validate_username(username)?;
        validate_identifier("mission id", mission_id)?;
        let mission = self.store.get_mission(mission_id)?;
        if !mission.status.is_available() {
            return Err(MissionError::MissionUnavailable(mission.id));
        }
        if !mission.for_all && !self.store.is_assigned(username, &mission.id)? {
            return Err(MissionError::MissionNotAssigned {
                username: username.to_string(),
                mission_id: mission.id,
            });
        }

        let lease = self.locks.slot(username, &mission.id)?;
        let _held = lease.lock()?;

        let user = self.store.ensure_user(username)?;
        if self.tracker.user_already_completed_mission(&user, &mission)? {
            metrics::inc_completions_skipped();
            return Err(MissionError::MissionAlreadyCompleted {
                username: user.username,
                mission_id: mission.id,
            });
        }

        let requirements = self.store.list_requirements(&mission.id)?;
        let mut met = 0usize;
        for requirement in &requirements {
            if self.tracker.update_progress(&user, requirement)?.completed {
                met += 1;
            }
        }

        // decide on what was just written, not on the counts above
        if !self.calculator().is_mission_complete(&user, &mission)? {
            debug!(
                "{} at {}/{} requirements on {}",
                user.username,
                met,
                requirements.len(),
                mission.id
            );
            return Ok(MissionAdvance::InProgress {
                completed: met,
                total: requirements.len(),
            });
        }

        self.finish(&mission, username)
    }

    fn finish(&self, mission: &MissionRecord, username: &str) -> Result<MissionAdvance, MissionError> {
        let rewards = self.store.list_rewards(&mission.id)?;
        // a registry gap must surface before the guard flips
        self.awards.check_resolvable(&rewards)?;

        let user = self.store.ensure_user(username)?;
        self.tracker.mark_mission_complete(&user, mission)?;
        info!("{} completed mission {}", user.username, mission.id);

        let summary = self.awards.award_rewards(&user, &rewards)?;
        Ok(MissionAdvance::Completed { summary })
    }

    /// Advance every mission visible to the user that has a requirement keyed
    /// `requirement_key`, is available, and is not already completed.
    pub fn handle_event(
        &self,
        username: &str,
        requirement_key: &str,
    ) -> Result<Vec<(String, MissionAdvance)>, MissionError> {
        validate_username(username)?;
        let user = self.store.ensure_user(username)?;
        let mut outcomes = Vec::new();

        for mission in self.store.missions_visible_to(username)? {
            if !mission.status.is_available() {
                continue;
            }
            let requirements = self.store.list_requirements(&mission.id)?;
            if !requirements.iter().any(|r| r.key == requirement_key) {
                continue;
            }
            if self.tracker.user_already_completed_mission(&user, &mission)? {
                continue;
            }
            match self.advance_mission(username, &mission.id) {
                Ok(advance) => outcomes.push((mission.id, advance)),
                // lost a race with a concurrent event on the same pair
                Err(MissionError::MissionAlreadyCompleted { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(outcomes)
    }
}

/// Wires the engine from a store, defaulting every collaborator to its
/// store-backed implementation. Strategy overrides are applied on top of the
/// standard registries.
pub struct MissionEngineBuilder {
    store: MissionStore,
    level_table: LevelTable,
    logger: Option<Arc<dyn ErrorLogger>>,
    notifier: Option<Arc<dyn Notifier>>,
    wallet: Option<Arc<dyn Wallet>>,
    currency_description: Option<String>,
    progress_overrides: Vec<(String, Box<dyn ProgressStrategy>)>,
    award_overrides: Vec<(RewardableKind, Box<dyn AwardStrategy>)>,
    check_coverage: bool,
}

impl MissionEngineBuilder {
    pub fn new(store: MissionStore) -> Self {
        Self {
            store,
            level_table: LevelTable::default(),
            logger: None,
            notifier: None,
            wallet: None,
            currency_description: None,
            progress_overrides: Vec::new(),
            award_overrides: Vec::new(),
            check_coverage: true,
        }
    }

    /// Level table used when the store has none.
    pub fn with_level_table(mut self, table: LevelTable) -> Self {
        self.level_table = table;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn ErrorLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_wallet(mut self, wallet: Arc<dyn Wallet>) -> Self {
        self.wallet = Some(wallet);
        self
    }

    /// Ledger description for currency rewards stored without one.
    pub fn with_currency_description(mut self, description: &str) -> Self {
        self.currency_description = Some(description.to_string());
        self
    }

    pub fn with_progress_strategy<S: ProgressStrategy + 'static>(mut self, key: &str, strategy: S) -> Self {
        self.progress_overrides
            .push((key.to_string(), Box::new(strategy)));
        self
    }

    pub fn with_award_strategy<S: AwardStrategy + 'static>(mut self, kind: RewardableKind, strategy: S) -> Self {
        self.award_overrides.push((kind, Box::new(strategy)));
        self
    }

    /// Skip the startup check that every stored requirement key resolves.
    pub fn without_coverage_check(mut self) -> Self {
        self.check_coverage = false;
        self
    }

    pub fn build(self) -> Result<MissionEngine, MissionError> {
        let store = self.store;
        let notifier: Arc<dyn Notifier> = self
            .notifier
            .unwrap_or_else(|| Arc::new(MailboxNotifier::new(store.clone())));
        let logger: Arc<dyn ErrorLogger> = self
            .logger
            .unwrap_or_else(|| Arc::new(StoreErrorLogger::new(store.clone())));
        let wallet: Arc<dyn Wallet> = self
            .wallet
            .unwrap_or_else(|| Arc::new(StoreWallet::new(store.clone())));
        let levels = Arc::new(LevelCache::new(store.clone(), self.level_table));
        let experience: Arc<dyn ExperienceLedger> =
            Arc::new(ExperienceService::new(store.clone(), Arc::clone(&levels)));

        let mut progress = ProgressStrategyRegistry::standard(store.clone(), store.clone());
        for (key, strategy) in self.progress_overrides {
            progress.register_boxed(&key, strategy);
        }
        if self.check_coverage {
            let keys = store.list_requirement_keys()?;
            progress.ensure_covers(keys.iter().map(String::as_str))?;
        }

        let mut award_registry = AwardStrategyRegistry::standard(
            store.clone(),
            Arc::clone(&wallet),
            Arc::clone(&experience),
            Arc::clone(&notifier),
        );
        if let Some(description) = self.currency_description {
            award_registry.register(
                RewardableKind::Currency,
                CurrencyAwardStrategy::new(Arc::clone(&wallet), notifier)
                    .with_fallback_description(&description),
            );
        }
        for (kind, strategy) in self.award_overrides {
            award_registry.register_boxed(kind, strategy);
        }

        let calculator = ProgressCalculator::new(store.clone(), Arc::new(progress));
        let tracker = ProgressTracker::new(store.clone(), calculator);
        let awards = AwardService::new(award_registry, wallet, experience, logger);

        Ok(MissionEngine {
            store,
            tracker,
            awards,
            levels,
            locks: MissionLocks::default(),
        })
    }
}
