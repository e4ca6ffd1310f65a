//! Strategy registries.
//!
//! Both registries are built once at startup and resolve a discriminant to a
//! strategy instance. A missing registration is a configuration bug and comes
//! back as [`MissionError::UnresolvedStrategy`]; nothing here defaults or
//! skips silently.

use std::collections::HashMap;
use std::sync::Arc;

use crate::mission::errors::{MissionError, StrategyFamily};
use crate::mission::experience::ExperienceLedger;
use crate::mission::notify::Notifier;
use crate::mission::storage::MissionStore;
use crate::mission::strategy::award::{
    AwardStrategy, CurrencyAwardStrategy, ExperienceAwardStrategy, TitleAwardStrategy,
};
use crate::mission::strategy::progress::{
    self, ActivityStats, CompletedMissionsStrategy, FriendCountStrategy, InteractionCountStrategy,
    LevelReachedStrategy, OwnedItemsStrategy, ProgressStrategy,
};
use crate::mission::types::RewardableKind;
use crate::mission::wallet::Wallet;

/// Requirement key → progress strategy.
#[derive(Default)]
pub struct ProgressStrategyRegistry {
    strategies: HashMap<String, Box<dyn ProgressStrategy>>,
}

impl ProgressStrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in requirement key.
    pub fn standard<A>(activity: A, store: MissionStore) -> Self
    where
        A: ActivityStats + Clone + 'static,
    {
        let mut registry = Self::new();
        registry.register(
            progress::KEY_OWNED_ITEMS,
            OwnedItemsStrategy::new(activity.clone()),
        );
        registry.register(progress::KEY_FRIENDS, FriendCountStrategy::new(activity.clone()));
        for key in progress::INTERACTION_KEYS {
            registry.register(key, InteractionCountStrategy::new(activity.clone(), key));
        }
        registry.register(
            progress::KEY_MISSIONS_COMPLETED,
            CompletedMissionsStrategy::new(store.clone()),
        );
        registry.register(progress::KEY_LEVEL_REACHED, LevelReachedStrategy::new(store));
        registry
    }

    /// Add or replace the strategy for `key`.
    pub fn register<S: ProgressStrategy + 'static>(&mut self, key: &str, strategy: S) -> &mut Self {
        self.register_boxed(key, Box::new(strategy))
    }

    pub fn register_boxed(&mut self, key: &str, strategy: Box<dyn ProgressStrategy>) -> &mut Self {
        self.strategies.insert(key.to_string(), strategy);
        self
    }

    pub fn resolve(&self, key: &str) -> Result<&dyn ProgressStrategy, MissionError> {
        self.strategies
            .get(key)
            .map(|s| s.as_ref())
            .ok_or_else(|| MissionError::unresolved(StrategyFamily::Progress, key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.strategies.contains_key(key)
    }

    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.strategies.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Fail on the first key without a registered strategy.
    pub fn ensure_covers<'a, I>(&self, keys: I) -> Result<(), MissionError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for key in keys {
            self.resolve(key)?;
        }
        Ok(())
    }
}

/// Rewardable kind → award strategy.
#[derive(Default)]
pub struct AwardStrategyRegistry {
    strategies: HashMap<RewardableKind, Box<dyn AwardStrategy>>,
}

impl AwardStrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One strategy per [`RewardableKind`]; the match below must stay exhaustive.
    pub fn standard(
        store: MissionStore,
        wallet: Arc<dyn Wallet>,
        experience: Arc<dyn ExperienceLedger>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let mut registry = Self::new();
        for kind in RewardableKind::ALL {
            let strategy: Box<dyn AwardStrategy> = match kind {
                RewardableKind::Title => Box::new(TitleAwardStrategy::new(
                    store.clone(),
                    Arc::clone(&notifier),
                )),
                RewardableKind::Currency => Box::new(CurrencyAwardStrategy::new(
                    Arc::clone(&wallet),
                    Arc::clone(&notifier),
                )),
                RewardableKind::Experience => Box::new(ExperienceAwardStrategy::new(
                    Arc::clone(&experience),
                    Arc::clone(&notifier),
                )),
            };
            registry.strategies.insert(kind, strategy);
        }
        registry
    }

    /// Add or replace the strategy for `kind`.
    pub fn register<S: AwardStrategy + 'static>(&mut self, kind: RewardableKind, strategy: S) -> &mut Self {
        self.register_boxed(kind, Box::new(strategy))
    }

    pub fn register_boxed(&mut self, kind: RewardableKind, strategy: Box<dyn AwardStrategy>) -> &mut Self {
        self.strategies.insert(kind, strategy);
        self
    }

    pub fn resolve(&self, kind: RewardableKind) -> Result<&dyn AwardStrategy, MissionError> {
        self.strategies
            .get(&kind)
            .map(|s| s.as_ref())
            .ok_or_else(|| MissionError::unresolved(StrategyFamily::Award, kind.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mission::storage::MissionStoreBuilder;
    use crate::mission::types::{MissionRequirement, UserRecord};
    use tempfile::TempDir;

    struct Fixed(u32);

    impl ProgressStrategy for Fixed {
        fn calculate_progress(&self, _: &UserRecord, _: &MissionRequirement) -> Result<u32, MissionError> {
            Ok(self.0)
        }
    }

    #[test]
    fn unknown_progress_key_fails_fast() {
        let mut registry = ProgressStrategyRegistry::new();
        registry.register("fixed", Fixed(3));

        let user = UserRecord::new("u", "U");
        let req = MissionRequirement::new("r", "m", "fixed", 1);
        assert_eq!(
            registry.resolve("fixed").unwrap().calculate_progress(&user, &req).unwrap(),
            3
        );

        let err = registry.resolve("nope").err().unwrap();
        assert!(err.is_configuration());
        assert!(matches!(
            err,
            MissionError::UnresolvedStrategy { family: StrategyFamily::Progress, ref key } if key == "nope"
        ));
        assert!(registry.ensure_covers(["fixed", "nope"]).is_err());
        assert!(registry.ensure_covers(["fixed"]).is_ok());
    }

    #[test]
    fn standard_progress_registry_has_builtin_keys() {
        let dir = TempDir::new().unwrap();
        let store = MissionStoreBuilder::new(dir.path()).open().unwrap();
        let registry = ProgressStrategyRegistry::standard(store.clone(), store);
        assert_eq!(
            registry.keys(),
            vec![
                "comments_written",
                "friends",
                "level_reached",
                "likes_given",
                "missions_completed",
                "owned_items",
                "posts_published",
            ]
        );
    }

    #[test]
    fn empty_award_registry_reports_kind() {
        let registry = AwardStrategyRegistry::new();
        let err = registry.resolve(RewardableKind::Title).err().unwrap();
        assert_eq!(err.to_string(), "no award strategy registered for 'title'");
    }
}
