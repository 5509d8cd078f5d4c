//! Bounded newest-first notification log.

use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use fxpulse_core::{Notification, NotificationKind};
use fxpulse_telemetry::Metrics;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tracing::debug;

pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 20;

#[derive(Debug, Default)]
struct LogInner {
    /// Newest at the front.
    entries: VecDeque<Notification>,
    last_id: u64,
}

#[derive(Debug)]
pub struct NotificationLog {
    capacity: usize,
    inner: Mutex<LogInner>,
}

impl NotificationLog {
    pub fn new(capacity: usize) -> StoreResult<Self> {
        if capacity == 0 {
            return Err(StoreError::ZeroCapacity {
                what: "notification",
            });
        }
        Ok(Self {
            capacity,
            inner: Mutex::new(LogInner::default()),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn add(&self, message: impl Into<String>, kind: NotificationKind) -> Notification {
        self.add_at(message, kind, Utc::now())
    }

    /// Insert at the head, evicting the oldest past capacity.
    ///
    /// Ids derive from the insertion time in milliseconds and stay strictly
    /// increasing when several notifications land in the same millisecond.
    pub fn add_at(
        &self,
        message: impl Into<String>,
        kind: NotificationKind,
        timestamp: DateTime<Utc>,
    ) -> Notification {
        let mut inner = self.inner.lock();
        let now_ms = u64::try_from(timestamp.timestamp_millis()).unwrap_or(0);
        let id = now_ms.max(inner.last_id + 1);
        inner.last_id = id;

        let notification = Notification {
            id,
            message: message.into(),
            kind,
            timestamp,
        };
        inner.entries.push_front(notification.clone());
        inner.entries.truncate(self.capacity);
        drop(inner);

        debug!(id, kind = %kind, message = %notification.message, "Notification added");
        Metrics::notification(kind.as_str());
        notification
    }

    /// Every notification, newest first.
    pub fn all(&self) -> Vec<Notification> {
        self.inner.lock().entries.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<Notification> {
        self.inner.lock().entries.front().cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }
}

impl Default for NotificationLog {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_NOTIFICATION_CAPACITY,
            inner: Mutex::new(LogInner::default()),
        }
    }
}
