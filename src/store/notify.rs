//! User-visible notifications produced by store mutations.
//!
//! Presenting them (toasts) is the front end's concern; the store broadcasts
//! them, keeps the latest few for polling clients and mirrors each one into
//! the log.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;
pub const RECENT_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub level: NoticeLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
    recent: Arc<Mutex<VecDeque<Notification>>>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            recent: Arc::new(Mutex::new(VecDeque::with_capacity(RECENT_CAPACITY))),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    /// The latest notifications, oldest first.
    pub fn recent(&self) -> Vec<Notification> {
        self.recent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn success(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(notice = %message, "notification");
        self.send(NoticeLevel::Success, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(notice = %message, "notification");
        self.send(NoticeLevel::Error, message);
    }

    fn send(&self, level: NoticeLevel, message: String) {
        let notification = Notification {
            level,
            message,
            created_at: Utc::now(),
        };
        {
            let mut recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
            if recent.len() == RECENT_CAPACITY {
                recent.pop_front();
            }
            recent.push_back(notification.clone());
        }
        // no subscribers is fine: nobody is looking
        let _ = self.tx.send(notification);
    }
}

/// "user role" -> "User role"
pub(crate) fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("user role"), "User role");
        assert_eq!(capitalize(""), "");
    }

    #[tokio::test]
    async fn test_subscribers_receive_notifications() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();

        notifier.error("Failed to update service");
        let notice = rx.recv().await.unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(notice.message, "Failed to update service");
    }

    #[test]
    fn test_send_without_subscribers_does_not_panic() {
        Notifier::new().success("Project added successfully");
    }

    #[test]
    fn test_recent_keeps_the_latest_notifications() {
        let notifier = Notifier::new();
        for n in 0..RECENT_CAPACITY + 2 {
            notifier.success(format!("notice {}", n));
        }

        let recent = notifier.recent();
        assert_eq!(recent.len(), RECENT_CAPACITY);
        assert_eq!(recent[0].message, "notice 2");
        assert_eq!(
            recent.last().unwrap().message,
            format!("notice {}", RECENT_CAPACITY + 1)
        );
    }
}
