use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::model::{Id, Notification, NotificationLevel};

/// How long each severity stays on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationDurations {
    pub success: Duration,
    pub warning: Duration,
    pub error: Duration,
}

pub const DEFAULT_SUCCESS_MS: u64 = 3_000;
pub const DEFAULT_WARNING_MS: u64 = 4_000;
pub const DEFAULT_ERROR_MS: u64 = 6_000;

impl Default for NotificationDurations {
    fn default() -> Self {
        Self::from_millis(DEFAULT_SUCCESS_MS, DEFAULT_WARNING_MS, DEFAULT_ERROR_MS)
    }
}

impl NotificationDurations {
    pub fn from_millis(success_ms: u64, warning_ms: u64, error_ms: u64) -> Self {
        Self {
            success: Duration::from_millis(success_ms),
            warning: Duration::from_millis(warning_ms),
            error: Duration::from_millis(error_ms),
        }
    }

    pub fn for_level(&self, level: NotificationLevel) -> Duration {
        match level {
            NotificationLevel::Success => self.success,
            NotificationLevel::Warning => self.warning,
            NotificationLevel::Error => self.error,
        }
    }
}

/// Holds the transient banners. Expired entries are dropped lazily whenever
/// the active set is read.
#[derive(Debug, Default)]
pub struct Notifier {
    durations: NotificationDurations,
    entries: Mutex<Vec<Notification>>,
}

impl Notifier {
    pub fn new(durations: NotificationDurations) -> Self {
        Self {
            durations,
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, level: NotificationLevel, message: impl Into<String>) -> Id {
        let notification = Notification::new(level, message, self.durations.for_level(level));
        let id = notification.id.clone();
        self.entries.lock().push(notification);
        id
    }

    pub fn success(&self, message: impl Into<String>) -> Id {
        self.push(NotificationLevel::Success, message)
    }

    pub fn warning(&self, message: impl Into<String>) -> Id {
        self.push(NotificationLevel::Warning, message)
    }

    pub fn error(&self, message: impl Into<String>) -> Id {
        self.push(NotificationLevel::Error, message)
    }

    /// Notifications still on screen, oldest first
    pub fn active(&self) -> Vec<Notification> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.retain(|n| !n.is_expired(now));
        entries.clone()
    }

    pub fn latest(&self) -> Option<Notification> {
        self.active().pop()
    }

    pub fn dismiss(&self, id: &Id) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|n| &n.id != id);
        entries.len() != before
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_auto_dismiss_by_severity() {
        let notifier = Notifier::default();
        notifier.success("Tax rate assigned");
        notifier.error("Failed to assign tax rate");
        assert_eq!(notifier.active().len(), 2);

        tokio::time::advance(Duration::from_millis(3100)).await;
        let active = notifier.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].level, NotificationLevel::Error);

        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(notifier.active().is_empty());
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_dismiss_and_clear() {
        let notifier = Notifier::default();
        let id = notifier.warning("Saved, but refresh failed");
        notifier.success("Employee assigned");

        assert!(notifier.dismiss(&id));
        assert!(!notifier.dismiss(&id));
        assert_eq!(notifier.latest().unwrap().message, "Employee assigned");

        notifier.clear();
        assert!(notifier.latest().is_none());
    }
}
