use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MISSION_SCHEMA_VERSION: u8 = 1;
pub const USER_SCHEMA_VERSION: u8 = 1;
pub const PROGRESS_SCHEMA_VERSION: u8 = 1;

// ============================================================================
// Missions
// ============================================================================

/// Lifecycle status of a mission. Only `Available` missions accumulate progress.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum MissionStatus {
    #[default]
    Available,
    Unavailable,
    /// Retired missions kept for history.
    Archived,
}

impl MissionStatus {
    pub fn is_available(&self) -> bool {
        matches!(self, MissionStatus::Available)
    }
}

impl std::fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            MissionStatus::Available => "available",
            MissionStatus::Unavailable => "unavailable",
            MissionStatus::Archived => "archived",
        };
        write!(f, "{}", label)
    }
}

/// Mission template. Requirements and rewards are stored as their own rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MissionRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: MissionStatus,
    /// Visible to every user; otherwise only to users it was assigned to.
    pub for_all: bool,
    pub created_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl MissionRecord {
    pub fn new(id: &str, name: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            status: MissionStatus::Available,
            for_all: true,
            created_at: Utc::now(),
            schema_version: MISSION_SCHEMA_VERSION,
        }
    }

    pub fn with_status(mut self, status: MissionStatus) -> Self {
        self.status = status;
        self
    }

    /// Restrict the mission to explicitly assigned users.
    pub fn assigned_only(mut self) -> Self {
        self.for_all = false;
        self
    }
}

/// One measurable condition of a mission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MissionRequirement {
    pub id: String,
    pub mission_id: String,
    /// Discriminant used to resolve the progress strategy.
    pub key: String,
    pub goal: u32,
    #[serde(default)]
    pub description: String,
}

impl MissionRequirement {
    pub fn new(id: &str, mission_id: &str, key: &str, goal: u32) -> Self {
        Self {
            id: id.to_string(),
            mission_id: mission_id.to_string(),
            key: key.to_string(),
            goal,
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn is_met_by(&self, progress: u32) -> bool {
        progress >= self.goal
    }
}

// ============================================================================
// Rewards
// ============================================================================

/// Closed set of reward targets. Used as the award strategy discriminant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RewardableKind {
    Title,
    Currency,
    Experience,
}

impl RewardableKind {
    pub const ALL: [RewardableKind; 3] = [
        RewardableKind::Title,
        RewardableKind::Currency,
        RewardableKind::Experience,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RewardableKind::Title => "title",
            RewardableKind::Currency => "currency",
            RewardableKind::Experience => "experience",
        }
    }
}

impl std::fmt::Display for RewardableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a reward actually grants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Rewardable {
    /// Unlock a title from the title registry
    Title { title_id: String },
    /// Credit the wallet; `description` tags the ledger entry
    Currency { amount: i64, description: String },
    /// Add experience points
    Experience { amount: u32 },
}

impl Rewardable {
    pub fn kind(&self) -> RewardableKind {
        match self {
            Rewardable::Title { .. } => RewardableKind::Title,
            Rewardable::Currency { .. } => RewardableKind::Currency,
            Rewardable::Experience { .. } => RewardableKind::Experience,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RewardRecord {
    pub id: String,
    pub mission_id: String,
    pub rewardable: Rewardable,
}

impl RewardRecord {
    pub fn new(id: &str, mission_id: &str, rewardable: Rewardable) -> Self {
        Self {
            id: id.to_string(),
            mission_id: mission_id.to_string(),
            rewardable,
        }
    }

    pub fn title(id: &str, mission_id: &str, title_id: &str) -> Self {
        Self::new(
            id,
            mission_id,
            Rewardable::Title {
                title_id: title_id.to_string(),
            },
        )
    }

    pub fn currency(id: &str, mission_id: &str, amount: i64, description: &str) -> Self {
        Self::new(
            id,
            mission_id,
            Rewardable::Currency {
                amount,
                description: description.to_string(),
            },
        )
    }

    pub fn experience(id: &str, mission_id: &str, amount: u32) -> Self {
        Self::new(id, mission_id, Rewardable::Experience { amount })
    }

    pub fn kind(&self) -> RewardableKind {
        self.rewardable.kind()
    }
}

/// Title registry entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TitleRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl TitleRecord {
    pub fn new(id: &str, name: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
        }
    }
}

// ============================================================================
// Per-user state
// ============================================================================

/// Stored progress for one (user, requirement) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserMissionProgress {
    pub username: String,
    pub requirement_id: String,
    pub mission_id: String,
    pub progress: u32,
    pub completed: bool,
    pub updated_at: DateTime<Utc>,
    pub schema_version: u8,
}

/// Completion record for one (user, mission) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserMission {
    pub username: String,
    pub mission_id: String,
    pub completed: bool,
    pub last_completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub times_completed: u32,
    pub schema_version: u8,
}

impl UserMission {
    pub fn new(username: &str, mission_id: &str) -> Self {
        Self {
            username: username.to_string(),
            mission_id: mission_id.to_string(),
            completed: false,
            last_completed_at: None,
            times_completed: 0,
            schema_version: PROGRESS_SCHEMA_VERSION,
        }
    }

    pub fn mark_completed(&mut self) {
        self.completed = true;
        self.last_completed_at = Some(Utc::now());
        self.times_completed = self.times_completed.saturating_add(1);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRecord {
    pub username: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Lifetime experience points
    #[serde(default)]
    pub experience: u64,
    /// Level derived from `experience` through the level table
    #[serde(default = "default_level")]
    pub level: u32,
    /// Wallet balance in whole coins
    #[serde(default)]
    pub balance: i64,
    /// Owned title ids, in unlock order
    #[serde(default)]
    pub titles: Vec<String>,
    #[serde(default)]
    pub equipped_title: Option<String>,
    pub schema_version: u8,
}

fn default_level() -> u32 {
    1
}

impl UserRecord {
    pub fn new(username: &str, display_name: &str) -> Self {
        let now = Utc::now();
        Self {
            username: username.to_string(),
            display_name: display_name.to_string(),
            created_at: now,
            updated_at: now,
            experience: 0,
            level: default_level(),
            balance: 0,
            titles: Vec::new(),
            equipped_title: None,
            schema_version: USER_SCHEMA_VERSION,
        }
    }

    pub fn has_title(&self, title_id: &str) -> bool {
        self.titles.iter().any(|t| t == title_id)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// ============================================================================
// Wallet & experience
// ============================================================================

/// Wallet audit trail entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerEntry {
    pub id: String,
    pub username: String,
    pub amount: i64,
    pub balance_after: i64,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

/// Result of an experience grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExperienceGrant {
    pub amount: u32,
    pub total: u64,
    pub level_before: u32,
    pub level_after: u32,
}

impl ExperienceGrant {
    pub fn leveled_up(&self) -> bool {
        self.level_after > self.level_before
    }
}

/// Experience thresholds: entry `i` is the total experience needed for level `i + 2`.
/// Level 1 needs nothing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LevelTable {
    pub thresholds: Vec<u64>,
}

impl LevelTable {
    /// Build a table, sorting and de-duplicating thresholds.
    pub fn new(mut thresholds: Vec<u64>) -> Self {
        thresholds.sort_unstable();
        thresholds.dedup();
        thresholds.retain(|t| *t > 0);
        Self { thresholds }
    }

    pub fn level_for(&self, experience: u64) -> u32 {
        let reached = self.thresholds.iter().take_while(|t| **t <= experience).count();
        1 + reached as u32
    }

    pub fn max_level(&self) -> u32 {
        1 + self.thresholds.len() as u32
    }
}

impl Default for LevelTable {
    fn default() -> Self {
        Self::new(vec![100, 250, 500, 1_000, 2_000, 4_000, 8_000])
    }
}

/// Queued notification for a user (fire-and-forget mailbox)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub username: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requirement_goal_boundary_counts_as_met() {
        let req = MissionRequirement::new("r1", "m1", "friends", 10);
        assert!(req.is_met_by(10));
        assert!(req.is_met_by(11));
        assert!(!req.is_met_by(9));
    }

    #[test]
    fn level_table_levels() {
        let table = LevelTable::new(vec![500, 100, 250, 100, 0]);
        assert_eq!(table.thresholds, vec![100, 250, 500]);
        assert_eq!(table.level_for(0), 1);
        assert_eq!(table.level_for(99), 1);
        assert_eq!(table.level_for(100), 2);
        assert_eq!(table.level_for(499), 3);
        assert_eq!(table.level_for(10_000), 4);
        assert_eq!(table.max_level(), 4);
    }

    #[test]
    fn user_mission_completion_counts_cycles() {
        let mut um = UserMission::new("alice", "m1");
        assert!(!um.completed);
        um.mark_completed();
        um.mark_completed();
        assert!(um.completed);
        assert_eq!(um.times_completed, 2);
        assert!(um.last_completed_at.is_some());
    }

    #[test]
    fn rewardable_kind_matches_variant() {
        assert_eq!(
            RewardRecord::title("r", "m", "t").kind(),
            RewardableKind::Title
        );
        assert_eq!(
            RewardRecord::currency("r", "m", 5, "x").kind(),
            RewardableKind::Currency
        );
        assert_eq!(
            RewardRecord::experience("r", "m", 5).kind(),
            RewardableKind::Experience
        );
    }
}
