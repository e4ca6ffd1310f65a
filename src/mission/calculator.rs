//! Progress calculation against mission requirements.
//!
//! Provides the three read-side questions the rest of the engine asks:
//! how far along is a user on a requirement, is that requirement met, and
//! is every requirement of a mission met.

use std::sync::Arc;

use log::debug;

use crate::mission::errors::MissionError;
use crate::mission::resolver::ProgressStrategyRegistry;
use crate::mission::storage::MissionStore;
use crate::mission::types::{MissionRecord, MissionRequirement, UserRecord};

#[derive(Clone)]
pub struct ProgressCalculator {
    store: MissionStore,
    strategies: Arc<ProgressStrategyRegistry>,
}

impl ProgressCalculator {
    pub fn new(store: MissionStore, strategies: Arc<ProgressStrategyRegistry>) -> Self {
        Self { store, strategies }
    }

    pub fn strategies(&self) -> &ProgressStrategyRegistry {
        &self.strategies
    }

    /// Current progress of `user` on `requirement`.
    ///
    /// Requirements of a mission that is not available report `0` and no
    /// strategy runs. Otherwise the strategy's value is returned as-is.
    pub fn determine_progress(
        &self,
        user: &UserRecord,
        requirement: &MissionRequirement,
    ) -> Result<u32, MissionError> {
        let mission = self.store.get_mission(&requirement.mission_id)?;
        if !mission.status.is_available() {
            debug!(
                "mission {} is {}, progress for {} pinned to 0",
                mission.id, mission.status, requirement.id
            );
            return Ok(0);
        }

        let strategy = self.strategies.resolve(&requirement.key)?;
        strategy.calculate_progress(user, requirement)
    }

    /// `determine_progress >= goal`; reaching the goal exactly counts.
    pub fn is_requirement_complete(
        &self,
        user: &UserRecord,
        requirement: &MissionRequirement,
    ) -> Result<bool, MissionError> {
        let progress = self.determine_progress(user, requirement)?;
        Ok(requirement.is_met_by(progress))
    }

    /// True iff every requirement currently attached to the mission is complete.
    /// A mission with no requirements is complete.
    pub fn is_mission_complete(
        &self,
        user: &UserRecord,
        mission: &MissionRecord,
    ) -> Result<bool, MissionError> {
        let requirements = self.store.list_requirements(&mission.id)?;
        for requirement in &requirements {
            if !self.is_requirement_complete(user, requirement)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
