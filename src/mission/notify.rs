//! Notifier collaborator. Fire-and-forget: callers never see delivery errors.

use chrono::Utc;
use log::warn;

use crate::mission::storage::MissionStore;
use crate::mission::types::Notification;

pub trait Notifier: Send + Sync {
    fn notify(&self, username: &str, message: &str);
}

/// Queues notifications in the store's mailbox tree for a delivery layer to drain.
pub struct MailboxNotifier {
    store: MissionStore,
}

impl MailboxNotifier {
    pub fn new(store: MissionStore) -> Self {
        Self { store }
    }
}

impl Notifier for MailboxNotifier {
    fn notify(&self, username: &str, message: &str) {
        let notification = Notification {
            username: username.to_string(),
            message: message.to_string(),
            created_at: Utc::now(),
        };
        if let Err(e) = self.store.enqueue_notification(&notification) {
            warn!("dropping notification for {}: {}", username, e);
        }
    }
}
