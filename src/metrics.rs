//! Process-wide counters for the mission pipeline.
//! Read by `missionctl status`; cheap enough to bump on every write.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};

use serde::Serialize;

use crate::mission::types::RewardableKind;

static PROGRESS_WRITES: AtomicU64 = AtomicU64::new(0);
static MISSIONS_COMPLETED: AtomicU64 = AtomicU64::new(0);
static REWARDS_GRANTED: AtomicU64 = AtomicU64::new(0);
static REWARDS_FAILED: AtomicU64 = AtomicU64::new(0);
static COMPLETIONS_SKIPPED: AtomicU64 = AtomicU64::new(0);

static REWARD_COUNTERS: OnceLock<Mutex<HashMap<RewardableKind, RewardCounter>>> = OnceLock::new();

pub fn inc_progress_writes() {
    PROGRESS_WRITES.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_missions_completed() {
    MISSIONS_COMPLETED.fetch_add(1, Ordering::Relaxed);
}

/// A completion attempt stopped by the already-completed guard.
pub fn inc_completions_skipped() {
    COMPLETIONS_SKIPPED.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RewardCounter {
    pub granted: u64,
    pub failed: u64,
}

fn reward_counter_lock() -> &'static Mutex<HashMap<RewardableKind, RewardCounter>> {
    REWARD_COUNTERS.get_or_init(|| Mutex::new(HashMap::new()))
}

pub fn record_reward_granted(kind: RewardableKind) -> RewardCounter {
    REWARDS_GRANTED.fetch_add(1, Ordering::Relaxed);
    let mut guard = reward_counter_lock()
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    let counter = guard.entry(kind).or_default();
    counter.granted = counter.granted.saturating_add(1);
    *counter
}

pub fn record_reward_failed(kind: RewardableKind) -> RewardCounter {
    REWARDS_FAILED.fetch_add(1, Ordering::Relaxed);
    let mut guard = reward_counter_lock()
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    let counter = guard.entry(kind).or_default();
    counter.failed = counter.failed.saturating_add(1);
    *counter
}

pub fn reward_counters_snapshot() -> HashMap<RewardableKind, RewardCounter> {
    reward_counter_lock()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct Snapshot {
    pub progress_writes: u64,
    pub missions_completed: u64,
    pub completions_skipped: u64,
    pub rewards_granted: u64,
    pub rewards_failed: u64,
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        progress_writes: PROGRESS_WRITES.load(Ordering::Relaxed),
        missions_completed: MISSIONS_COMPLETED.load(Ordering::Relaxed),
        completions_skipped: COMPLETIONS_SKIPPED.load(Ordering::Relaxed),
        rewards_granted: REWARDS_GRANTED.load(Ordering::Relaxed),
        rewards_failed: REWARDS_FAILED.load(Ordering::Relaxed),
    }
}
