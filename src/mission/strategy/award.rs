//! Award strategies: one grant rule per rewardable kind.

use std::sync::Arc;

use log::info;

use crate::mission::errors::MissionError;
use crate::mission::experience::ExperienceLedger;
use crate::mission::notify::Notifier;
use crate::mission::storage::MissionStore;
use crate::mission::types::{RewardRecord, Rewardable, RewardableKind, UserRecord};
use crate::mission::wallet::Wallet;

/// Grants one reward to one user.
pub trait AwardStrategy: Send + Sync {
    fn award(&self, user: &UserRecord, reward: &RewardRecord) -> Result<(), MissionError>;
}

fn wrong_variant(expected: RewardableKind, reward: &RewardRecord) -> MissionError {
    MissionError::Internal(format!(
        "{} strategy handed reward {} of kind {}",
        expected,
        reward.id,
        reward.kind()
    ))
}

/// Unlocks a title from the registry. Refuses duplicates with `AlreadyHasTitle`.
pub struct TitleAwardStrategy {
    store: MissionStore,
    notifier: Arc<dyn Notifier>,
}

impl TitleAwardStrategy {
    pub fn new(store: MissionStore, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }
}

impl AwardStrategy for TitleAwardStrategy {
    fn award(&self, user: &UserRecord, reward: &RewardRecord) -> Result<(), MissionError> {
        let Rewardable::Title { title_id } = &reward.rewardable else {
            return Err(wrong_variant(RewardableKind::Title, reward));
        };
        let title = self.store.get_title(title_id)?;
        self.store.update_user(&user.username, |fresh| {
            if fresh.has_title(&title.id) {
                return Err(MissionError::AlreadyHasTitle {
                    username: fresh.username.clone(),
                    title_id: title.id.clone(),
                });
            }
            fresh.titles.push(title.id.clone());
            if fresh.equipped_title.is_none() {
                fresh.equipped_title = Some(title.id.clone());
            }
            Ok(())
        })?;
        info!("{} unlocked title {}", user.username, title.id);

        self.notifier.notify(
            &user.username,
            &format!("New title unlocked: {}", title.name),
        );
        Ok(())
    }
}

pub const DEFAULT_CURRENCY_DESCRIPTION: &str = "Mission reward";

/// Credits the wallet; the ledger entry carries the reward's description, or
/// the fallback when the reward has none.
pub struct CurrencyAwardStrategy {
    wallet: Arc<dyn Wallet>,
    notifier: Arc<dyn Notifier>,
    fallback_description: String,
}

impl CurrencyAwardStrategy {
    pub fn new(wallet: Arc<dyn Wallet>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            wallet,
            notifier,
            fallback_description: DEFAULT_CURRENCY_DESCRIPTION.to_string(),
        }
    }

    pub fn with_fallback_description(mut self, description: &str) -> Self {
        self.fallback_description = description.to_string();
        self
    }
}

impl AwardStrategy for CurrencyAwardStrategy {
    fn award(&self, user: &UserRecord, reward: &RewardRecord) -> Result<(), MissionError> {
        let Rewardable::Currency {
            amount,
            description,
        } = &reward.rewardable
        else {
            return Err(wrong_variant(RewardableKind::Currency, reward));
        };
        let description = if description.trim().is_empty() {
            self.fallback_description.as_str()
        } else {
            description.as_str()
        };
        let entry = self
            .wallet
            .add_funds(&user.username, *amount, description)?;
        self.notifier.notify(
            &user.username,
            &format!("+{} coins ({}) - balance {}", amount, description, entry.balance_after),
        );
        Ok(())
    }
}

pub struct ExperienceAwardStrategy {
    experience: Arc<dyn ExperienceLedger>,
    notifier: Arc<dyn Notifier>,
}

impl ExperienceAwardStrategy {
    pub fn new(experience: Arc<dyn ExperienceLedger>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            experience,
            notifier,
        }
    }
}

impl AwardStrategy for ExperienceAwardStrategy {
    fn award(&self, user: &UserRecord, reward: &RewardRecord) -> Result<(), MissionError> {
        let Rewardable::Experience { amount } = &reward.rewardable else {
            return Err(wrong_variant(RewardableKind::Experience, reward));
        };
        let grant = self.experience.add_experience(&user.username, *amount)?;
        self.notifier
            .notify(&user.username, &format!("+{} XP", grant.amount));
        Ok(())
    }
}
