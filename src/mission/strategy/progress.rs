//! Progress strategies: one counting rule per requirement key.
//!
//! The calculator never looks at what a key means; it resolves a strategy and
//! takes the number it returns.

use crate::mission::errors::MissionError;
use crate::mission::storage::MissionStore;
use crate::mission::types::{MissionRequirement, UserRecord};

pub const KEY_OWNED_ITEMS: &str = "owned_items";
pub const KEY_FRIENDS: &str = "friends";
pub const KEY_POSTS_PUBLISHED: &str = "posts_published";
pub const KEY_COMMENTS_WRITTEN: &str = "comments_written";
pub const KEY_LIKES_GIVEN: &str = "likes_given";
pub const KEY_MISSIONS_COMPLETED: &str = "missions_completed";
pub const KEY_LEVEL_REACHED: &str = "level_reached";

/// Interaction counters that get a built-in strategy.
pub const INTERACTION_KEYS: [&str; 3] = [KEY_POSTS_PUBLISHED, KEY_COMMENTS_WRITTEN, KEY_LIKES_GIVEN];

/// Computes a user's numeric progress against a requirement.
pub trait ProgressStrategy: Send + Sync {
    fn calculate_progress(
        &self,
        user: &UserRecord,
        requirement: &MissionRequirement,
    ) -> Result<u32, MissionError>;
}

/// Read access to the platform activity that progress is measured against.
pub trait ActivityStats: Send + Sync {
    /// Number of distinct items the user currently owns.
    fn owned_item_count(&self, username: &str) -> Result<u32, MissionError>;
    /// Size of the user's friend set.
    fn friend_count(&self, username: &str) -> Result<u32, MissionError>;
    /// Value of a named interaction counter.
    fn interaction_count(&self, username: &str, interaction: &str) -> Result<u32, MissionError>;
}

pub struct OwnedItemsStrategy<A> {
    activity: A,
}

impl<A: ActivityStats> OwnedItemsStrategy<A> {
    pub fn new(activity: A) -> Self {
        Self { activity }
    }
}

impl<A: ActivityStats> ProgressStrategy for OwnedItemsStrategy<A> {
    fn calculate_progress(&self, user: &UserRecord, _: &MissionRequirement) -> Result<u32, MissionError> {
        self.activity.owned_item_count(&user.username)
    }
}

pub struct FriendCountStrategy<A> {
    activity: A,
}

impl<A: ActivityStats> FriendCountStrategy<A> {
    pub fn new(activity: A) -> Self {
        Self { activity }
    }
}

impl<A: ActivityStats> ProgressStrategy for FriendCountStrategy<A> {
    fn calculate_progress(&self, user: &UserRecord, _: &MissionRequirement) -> Result<u32, MissionError> {
        self.activity.friend_count(&user.username)
    }
}

/// Counts one named interaction (posts, comments, likes ...).
pub struct InteractionCountStrategy<A> {
    activity: A,
    interaction: String,
}

impl<A: ActivityStats> InteractionCountStrategy<A> {
    pub fn new(activity: A, interaction: &str) -> Self {
        Self {
            activity,
            interaction: interaction.to_string(),
        }
    }
}

impl<A: ActivityStats> ProgressStrategy for InteractionCountStrategy<A> {
    fn calculate_progress(&self, user: &UserRecord, _: &MissionRequirement) -> Result<u32, MissionError> {
        self.activity
            .interaction_count(&user.username, &self.interaction)
    }
}

/// Number of missions the user has won so far.
pub struct CompletedMissionsStrategy {
    store: MissionStore,
}

impl CompletedMissionsStrategy {
    pub fn new(store: MissionStore) -> Self {
        Self { store }
    }
}

impl ProgressStrategy for CompletedMissionsStrategy {
    fn calculate_progress(&self, user: &UserRecord, _: &MissionRequirement) -> Result<u32, MissionError> {
        self.store.count_completed_missions(&user.username)
    }
}

/// The user's level as last persisted.
pub struct LevelReachedStrategy {
    store: MissionStore,
}

impl LevelReachedStrategy {
    pub fn new(store: MissionStore) -> Self {
        Self { store }
    }
}

impl ProgressStrategy for LevelReachedStrategy {
    fn calculate_progress(&self, user: &UserRecord, _: &MissionRequirement) -> Result<u32, MissionError> {
        // the passed-in record may predate an experience grant in the same flow
        match self.store.get_user(&user.username) {
            Ok(fresh) => Ok(fresh.level),
            Err(MissionError::NotFound(_)) => Ok(user.level),
            Err(e) => Err(e),
        }
    }
}
