//! Persistence of per-user progress and mission completion.
//!
//! All writes are keyed upserts: (user, requirement) for progress and
//! (user, mission) for completion. Repeating a call with the same inputs
//! converges on the same row.

use chrono::Utc;
use log::debug;

use crate::metrics;
use crate::mission::calculator::ProgressCalculator;
use crate::mission::errors::MissionError;
use crate::mission::storage::MissionStore;
use crate::mission::types::{
    MissionRecord, MissionRequirement, UserMission, UserMissionProgress, UserRecord,
    PROGRESS_SCHEMA_VERSION,
};

#[derive(Clone)]
pub struct ProgressTracker {
    store: MissionStore,
    calculator: ProgressCalculator,
}

impl ProgressTracker {
    pub fn new(store: MissionStore, calculator: ProgressCalculator) -> Self {
        Self { store, calculator }
    }

    pub fn calculator(&self) -> &ProgressCalculator {
        &self.calculator
    }

    /// Recompute progress on `requirement` and upsert the (user, requirement) row.
    pub fn update_progress(
        &self,
        user: &UserRecord,
        requirement: &MissionRequirement,
    ) -> Result<UserMissionProgress, MissionError> {
        let progress = self.calculator.determine_progress(user, requirement)?;
        let row = UserMissionProgress {
            username: user.username.clone(),
            requirement_id: requirement.id.clone(),
            mission_id: requirement.mission_id.clone(),
            progress,
            completed: requirement.is_met_by(progress),
            updated_at: Utc::now(),
            schema_version: PROGRESS_SCHEMA_VERSION,
        };
        self.store.upsert_progress(row.clone())?;
        metrics::inc_progress_writes();
        debug!(
            "progress {}/{} for {} on {}",
            row.progress, requirement.goal, user.username, requirement.id
        );
        Ok(row)
    }

    /// Upsert the (user, mission) row as completed now. Does not check requirements.
    pub fn mark_mission_complete(
        &self,
        user: &UserRecord,
        mission: &MissionRecord,
    ) -> Result<UserMission, MissionError> {
        let mut row = self
            .store
            .find_user_mission(&user.username, &mission.id)?
            .unwrap_or_else(|| UserMission::new(&user.username, &mission.id));
        row.mark_completed();
        self.store.upsert_user_mission(row.clone())?;
        metrics::inc_missions_completed();
        Ok(row)
    }

    /// Guard to consult before completing a mission and dispatching its rewards.
    pub fn user_already_completed_mission(
        &self,
        user: &UserRecord,
        mission: &MissionRecord,
    ) -> Result<bool, MissionError> {
        self.store.user_mission_completed(&user.username, &mission.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mission::resolver::ProgressStrategyRegistry;
    use crate::mission::storage::MissionStoreBuilder;
    use crate::mission::strategy::ProgressStrategy;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct Dial(Arc<AtomicU32>);

    impl ProgressStrategy for Dial {
        fn calculate_progress(&self, _: &UserRecord, _: &MissionRequirement) -> Result<u32, MissionError> {
            Ok(self.0.load(Ordering::SeqCst))
        }
    }

    fn setup() -> (TempDir, MissionStore, ProgressTracker, Dial) {
        let dir = TempDir::new().unwrap();
        let store = MissionStoreBuilder::new(dir.path()).open().unwrap();
        store.put_mission(MissionRecord::new("m1", "Mission", "")).unwrap();
        store
            .put_requirement(MissionRequirement::new("r1", "m1", "dial", 5))
            .unwrap();
        let dial = Dial::default();
        let mut registry = ProgressStrategyRegistry::new();
        registry.register("dial", dial.clone());
        let calc = ProgressCalculator::new(store.clone(), Arc::new(registry));
        (dir, store.clone(), ProgressTracker::new(store, calc), dial)
    }

    #[test]
    fn update_progress_is_idempotent() {
        let (_dir, store, tracker, dial) = setup();
        let user = UserRecord::new("alice", "Alice");
        let req = store.list_requirements("m1").unwrap().remove(0);
        dial.0.store(3, Ordering::SeqCst);

        let first = tracker.update_progress(&user, &req).unwrap();
        let second = tracker.update_progress(&user, &req).unwrap();

        let rows = store.list_progress("alice").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!((first.progress, first.completed), (3, false));
        assert_eq!((second.progress, second.completed), (3, false));
        assert_eq!((rows[0].progress, rows[0].completed), (3, false));
    }

    #[test]
    fn completed_flag_follows_goal_at_write_time() {
        let (_dir, store, tracker, dial) = setup();
        let user = UserRecord::new("alice", "Alice");
        let req = store.list_requirements("m1").unwrap().remove(0);

        dial.0.store(5, Ordering::SeqCst);
        assert!(tracker.update_progress(&user, &req).unwrap().completed);

        // progress can regress (items sold, friends removed); the flag follows
        dial.0.store(4, Ordering::SeqCst);
        let row = tracker.update_progress(&user, &req).unwrap();
        assert!(!row.completed);
        let stored = store.find_progress("alice", "m1", "r1").unwrap().unwrap();
        assert_eq!((stored.progress, stored.completed), (4, false));
    }

    #[test]
    fn completion_guard_flips_after_mark() {
        let (_dir, store, tracker, _dial) = setup();
        let user = UserRecord::new("alice", "Alice");
        let other = UserRecord::new("bob", "Bob");
        let mission = store.get_mission("m1").unwrap();

        assert!(!tracker.user_already_completed_mission(&user, &mission).unwrap());
        let row = tracker.mark_mission_complete(&user, &mission).unwrap();
        assert!(row.completed);
        assert!(row.last_completed_at.is_some());
        assert!(tracker.user_already_completed_mission(&user, &mission).unwrap());
        assert!(!tracker.user_already_completed_mission(&other, &mission).unwrap());
        assert_eq!(store.list_user_missions("alice").unwrap().len(), 1);
    }
}
