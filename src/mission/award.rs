//! Reward dispatch.
//!
//! [`AwardService::award_rewards`] runs a batch of rewards for one user. Each
//! reward's strategy runs in isolation: an error from one is logged through the
//! [`ErrorLogger`] and the batch moves on. Rewards already granted stay granted.

use std::sync::Arc;

use log::{debug, info};

use crate::metrics;
use crate::mission::errors::MissionError;
use crate::mission::experience::ExperienceLedger;
use crate::mission::logging::{error_trace, ErrorLogger};
use crate::mission::resolver::AwardStrategyRegistry;
use crate::mission::strategy::AwardStrategy;
use crate::mission::types::{ExperienceGrant, LedgerEntry, RewardRecord, UserRecord};
use crate::mission::wallet::Wallet;

/// Outcome of one batch: which rewards went through and which were logged as failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AwardSummary {
    pub granted: Vec<String>,
    /// (reward id, error message)
    pub failed: Vec<(String, String)>,
}

impl AwardSummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct AwardService {
    strategies: AwardStrategyRegistry,
    wallet: Arc<dyn Wallet>,
    experience: Arc<dyn ExperienceLedger>,
    logger: Arc<dyn ErrorLogger>,
}

impl AwardService {
    pub fn new(
        strategies: AwardStrategyRegistry,
        wallet: Arc<dyn Wallet>,
        experience: Arc<dyn ExperienceLedger>,
        logger: Arc<dyn ErrorLogger>,
    ) -> Self {
        Self {
            strategies,
            wallet,
            experience,
            logger,
        }
    }

    /// Fail if any reward in the batch has no registered strategy.
    pub fn check_resolvable(&self, rewards: &[RewardRecord]) -> Result<(), MissionError> {
        for reward in rewards {
            self.strategies.resolve(reward.kind())?;
        }
        Ok(())
    }

    /// Grant every reward in `rewards` to `user`.
    ///
    /// Strategies are resolved for the whole batch before anything is granted,
    /// so a missing registration fails the call with nothing applied. After
    /// that point, per-reward errors are logged and never returned.
    pub fn award_rewards(
        &self,
        user: &UserRecord,
        rewards: &[RewardRecord],
    ) -> Result<AwardSummary, MissionError> {
        let resolved: Vec<(&RewardRecord, &dyn AwardStrategy)> = rewards
            .iter()
            .map(|reward| {
                self.strategies
                    .resolve(reward.kind())
                    .map(|strategy| (reward, strategy))
            })
            .collect::<Result<_, MissionError>>()?;

        let mut summary = AwardSummary::default();
        for (reward, strategy) in resolved {
            match strategy.award(user, reward) {
                Ok(()) => {
                    metrics::record_reward_granted(reward.kind());
                    debug!("granted {} reward {} to {}", reward.kind(), reward.id, user.username);
                    summary.granted.push(reward.id.clone());
                }
                Err(e) => {
                    metrics::record_reward_failed(reward.kind());
                    self.logger.error(
                        &format!("Failed to award {} reward {}", reward.kind(), reward.id),
                        &format!("{} (user {})", e, user.username),
                        &error_trace(&e),
                    );
                    summary.failed.push((reward.id.clone(), e.to_string()));
                }
            }
        }

        if !summary.granted.is_empty() {
            info!(
                "awarded {}/{} rewards to {}",
                summary.granted.len(),
                rewards.len(),
                user.username
            );
        }
        Ok(summary)
    }

    /// Add experience through the experience collaborator (level-ups happen there).
    pub fn award_experience(&self, user: &UserRecord, amount: u32) -> Result<ExperienceGrant, MissionError> {
        self.experience.add_experience(&user.username, amount)
    }

    /// Credit coins through the wallet; the ledger entry is tagged with `description`.
    pub fn award_coins(
        &self,
        user: &UserRecord,
        amount: i64,
        description: &str,
    ) -> Result<LedgerEntry, MissionError> {
        self.wallet.add_funds(&user.username, amount, description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mission::types::{RewardableKind, Rewardable};
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingLogger(Mutex<Vec<(String, String, String)>>);

    impl ErrorLogger for RecordingLogger {
        fn error(&self, title: &str, message: &str, trace: &str) {
            self.0
                .lock()
                .unwrap()
                .push((title.into(), message.into(), trace.into()));
        }
    }

    #[derive(Default)]
    struct FakeWallet(AtomicU64);

    impl Wallet for FakeWallet {
        fn add_funds(&self, username: &str, amount: i64, description: &str) -> Result<LedgerEntry, MissionError> {
            let after = self.0.fetch_add(amount as u64, Ordering::SeqCst) + amount as u64;
            Ok(LedgerEntry {
                id: "x".into(),
                username: username.into(),
                amount,
                balance_after: after as i64,
                description: description.into(),
                timestamp: chrono::Utc::now(),
            })
        }

        fn balance(&self, _: &str) -> Result<i64, MissionError> {
            Ok(self.0.load(Ordering::SeqCst) as i64)
        }
    }

    struct FakeExperience;

    impl ExperienceLedger for FakeExperience {
        fn add_experience(&self, _: &str, amount: u32) -> Result<ExperienceGrant, MissionError> {
            Ok(ExperienceGrant {
                amount,
                total: u64::from(amount),
                level_before: 1,
                level_after: 1,
            })
        }
    }

    struct Counting(Arc<AtomicUsize>);

    impl AwardStrategy for Counting {
        fn award(&self, _: &UserRecord, _: &RewardRecord) -> Result<(), MissionError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Exploding;

    impl AwardStrategy for Exploding {
        fn award(&self, _: &UserRecord, _: &RewardRecord) -> Result<(), MissionError> {
            Err(MissionError::Internal("title registry offline".into()))
        }
    }

    fn service(registry: AwardStrategyRegistry, logger: Arc<RecordingLogger>) -> AwardService {
        AwardService::new(
            registry,
            Arc::new(FakeWallet::default()),
            Arc::new(FakeExperience),
            logger,
        )
    }

    #[test]
    fn one_failing_strategy_does_not_block_the_batch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = AwardStrategyRegistry::new();
        registry
            .register(RewardableKind::Currency, Counting(calls.clone()))
            .register(RewardableKind::Experience, Counting(calls.clone()))
            .register(RewardableKind::Title, Exploding);
        let logger = Arc::new(RecordingLogger::default());
        let service = service(registry, logger.clone());

        let rewards = vec![
            RewardRecord::currency("a", "m", 10, "coins"),
            RewardRecord::title("b", "m", "hero"),
            RewardRecord::experience("c", "m", 5),
            RewardRecord::currency("d", "m", 1, "more coins"),
        ];
        let user = UserRecord::new("alice", "Alice");
        let summary = service.award_rewards(&user, &rewards).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(summary.granted, vec!["a", "c", "d"]);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, "b");

        let logged = logger.0.lock().unwrap();
        assert_eq!(logged.len(), 1);
        assert!(logged[0].0.contains("title reward b"));
        assert!(logged[0].1.contains("title registry offline"));
        assert!(logged[0].2.contains("Internal"));
    }

    #[test]
    fn missing_strategy_aborts_before_any_grant() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = AwardStrategyRegistry::new();
        registry.register(RewardableKind::Currency, Counting(calls.clone()));
        let logger = Arc::new(RecordingLogger::default());
        let service = service(registry, logger.clone());

        let rewards = vec![
            RewardRecord::currency("a", "m", 10, "coins"),
            RewardRecord::new("b", "m", Rewardable::Experience { amount: 1 }),
        ];
        let err = service
            .award_rewards(&UserRecord::new("alice", "Alice"), &rewards)
            .unwrap_err();

        assert!(err.is_configuration());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(logger.0.lock().unwrap().is_empty());
    }

    #[test]
    fn empty_batch_is_clean() {
        let logger = Arc::new(RecordingLogger::default());
        let service = service(AwardStrategyRegistry::new(), logger);
        let summary = service
            .award_rewards(&UserRecord::new("alice", "Alice"), &[])
            .unwrap();
        assert!(summary.is_clean());
        assert!(summary.granted.is_empty());
    }

    #[test]
    fn direct_coin_and_experience_helpers_delegate() {
        let logger = Arc::new(RecordingLogger::default());
        let service = service(AwardStrategyRegistry::new(), logger);
        let user = UserRecord::new("alice", "Alice");

        let entry = service.award_coins(&user, 30, "Daily bonus").unwrap();
        assert_eq!(entry.description, "Daily bonus");
        assert_eq!(entry.balance_after, 30);

        let grant = service.award_experience(&user, 12).unwrap();
        assert_eq!(grant.amount, 12);
    }
}
