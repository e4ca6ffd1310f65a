//! Test utilities & fixtures shared by the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use mission_engine::mission::{
    ErrorLogger, MissionEngine, MissionRecord, MissionRequirement, MissionStore,
    MissionStoreBuilder, Notifier, RewardRecord, TitleRecord,
};
use tempfile::TempDir;

/// Throwaway store. Keep the `TempDir` alive for as long as the store is used.
pub fn temp_store() -> (TempDir, MissionStore) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = MissionStoreBuilder::new(dir.path()).open().expect("open store");
    (dir, store)
}

/// Store with the starter titles and missions already inserted.
pub fn seeded_store() -> (TempDir, MissionStore) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = MissionStoreBuilder::new(dir.path())
        .with_starter_content()
        .open()
        .expect("open store");
    (dir, store)
}

/// Insert a mission with its requirements and rewards in one go.
pub fn put_mission(
    store: &MissionStore,
    mission: MissionRecord,
    requirements: Vec<MissionRequirement>,
    rewards: Vec<RewardRecord>,
) {
    store.put_mission(mission).unwrap();
    for requirement in requirements {
        store.put_requirement(requirement).unwrap();
    }
    for reward in rewards {
        store.put_reward(reward).unwrap();
    }
}

pub fn put_title(store: &MissionStore, id: &str) {
    store
        .put_title(TitleRecord::new(id, &format!("the {}", id), ""))
        .unwrap();
}

#[derive(Default)]
pub struct RecordingLogger {
    pub entries: Mutex<Vec<(String, String, String)>>,
}

impl RecordingLogger {
    pub fn count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn titles(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|(title, _, _)| title.clone())
            .collect()
    }
}

impl ErrorLogger for RecordingLogger {
    fn error(&self, title: &str, message: &str, trace: &str) {
        self.entries
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string(), trace.to_string()));
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn for_user(&self, username: &str) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(user, _)| user == username)
            .map(|(_, message)| message.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, username: &str, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((username.to_string(), message.to_string()));
    }
}

/// Engine over `store` with recording doubles plugged in.
pub fn engine_with_doubles(
    store: &MissionStore,
) -> (MissionEngine, Arc<RecordingLogger>, Arc<RecordingNotifier>) {
    let logger = Arc::new(RecordingLogger::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let engine = MissionEngine::builder(store.clone())
        .with_logger(logger.clone())
        .with_notifier(notifier.clone())
        .build()
        .expect("engine");
    (engine, logger, notifier)
}
