//! User-facing toast notifications.
//!
//! Every notification is kept in the center's history and fanned out to
//! live subscribers over a broadcast channel (the binary logs them; a UI
//! would render them).

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Display time when the caller does not pick one.
pub const DEFAULT_DURATION: Duration = Duration::from_secs(5);

const HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Success => "success",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub severity: Severity,
    pub message: String,
    pub duration: Duration,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            severity,
            message: message.into(),
            duration: DEFAULT_DURATION,
            created_at: Utc::now(),
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

/// Sink for user-facing messages.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);

    fn success(&self, message: &str) {
        self.notify(Notification::new(Severity::Success, message));
    }

    fn info(&self, message: &str) {
        self.notify(Notification::new(Severity::Info, message));
    }

    fn warning(&self, message: &str) {
        self.notify(Notification::new(Severity::Warning, message));
    }

    fn error(&self, message: &str) {
        self.notify(Notification::new(Severity::Error, message));
    }
}

pub struct NotificationCenter {
    history: Mutex<Vec<Notification>>,
    tx: broadcast::Sender<Notification>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self {
            history: Mutex::new(Vec::new()),
            tx,
        }
    }

    /// Receiver for notifications raised from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    /// Most recent notifications, oldest first.
    pub fn history(&self) -> Vec<Notification> {
        self.history
            .lock()
            .map(|h| h.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut history) = self.history.lock() {
            history.clear();
        }
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for NotificationCenter {
    fn notify(&self, notification: Notification) {
        crate::log_debug!(
            "[{}] {}",
            notification.severity.as_str(),
            notification.message
        );
        if let Ok(mut history) = self.history.lock() {
            if history.len() >= HISTORY_LIMIT {
                history.remove(0);
            }
            history.push(notification.clone());
        }
        // No live subscriber is fine; the history still has it.
        let _ = self.tx.send(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_notify_records_and_broadcasts() {
        let center = NotificationCenter::new();
        let mut rx = center.subscribe();

        center.success("Message envoyé avec succès!");
        center.notify(
            Notification::new(Severity::Info, "long").with_duration(Duration::from_secs(10)),
        );

        let first = rx.recv().await.unwrap();
        assert_eq!(first.severity, Severity::Success);
        assert_eq!(first.duration, DEFAULT_DURATION);
        assert_eq!(rx.recv().await.unwrap().duration, Duration::from_secs(10));

        let history = center.history();
        assert_eq!(history.len(), 2);
        assert_ne!(history[0].id, history[1].id);
    }

    #[test]
    fn test_history_is_bounded() {
        let center = NotificationCenter::new();
        for i in 0..(HISTORY_LIMIT + 5) {
            center.info(&format!("n{i}"));
        }
        let history = center.history();
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history[0].message, "n5");
    }
}
