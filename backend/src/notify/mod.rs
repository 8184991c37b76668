//! User-visible notifications.
//!
//! Every outcome the user should see (rejected files, saves, fetch failures)
//! goes through a [`Notifier`]. Entries are mirrored to the tracing log and
//! broadcast to subscribers such as the SSE endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::models::AccountId;

/// Notification severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    /// Account the notification belongs to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<AccountId>,
    pub at: DateTime<Utc>,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            account: None,
            at: Utc::now(),
        }
    }
}

/// Broadcasts notifications, optionally tagged with an account.
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: broadcast::Sender<Notification>,
    account: Option<AccountId>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            account: None,
        }
    }

    /// A notifier on the same channel that tags entries with `account`.
    pub fn for_account(&self, account: &AccountId) -> Self {
        Self {
            sender: self.sender.clone(),
            account: Some(account.clone()),
        }
    }

    pub fn account(&self) -> Option<&AccountId> {
        self.account.as_ref()
    }

    /// Log and broadcast one notification.
    pub fn notify(&self, mut entry: Notification) {
        if entry.account.is_none() {
            entry.account = self.account.clone();
        }
        let account = entry.account.as_ref().map(AccountId::as_str).unwrap_or("-");
        match entry.level {
            NotificationLevel::Info | NotificationLevel::Success => {
                info!(account, level = ?entry.level, "{}", entry.message)
            }
            NotificationLevel::Warning => warn!(account, "{}", entry.message),
            NotificationLevel::Error => error!(account, "{}", entry.message),
        }
        // No subscribers is fine
        let _ = self.sender.send(entry);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.notify(Notification::new(NotificationLevel::Info, message));
    }

    pub fn success(&self, message: impl Into<String>) {
        self.notify(Notification::new(NotificationLevel::Success, message));
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.notify(Notification::new(NotificationLevel::Warning, message));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.notify(Notification::new(NotificationLevel::Error, message));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(crate::config::NOTIFICATION_CAPACITY)
    }
}

/// Collect everything currently buffered in `rx` without waiting.
pub fn drain(rx: &mut broadcast::Receiver<Notification>) -> Vec<Notification> {
    let mut entries = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(entry) => entries.push(entry),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    entries
}
