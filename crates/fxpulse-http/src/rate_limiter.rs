//! Per-domain request limiting.
//!
//! Each host gets its own slot holding:
//! - a semaphore capping concurrent requests (default 2)
//! - a sliding window of send timestamps capping requests per window

use crate::error::{FetchError, FetchResult};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

const MIN_WINDOW_WAIT: Duration = Duration::from_millis(10);

/// Held for the duration of one request. Dropping it frees the inflight slot.
#[derive(Debug)]
pub struct DomainPermit {
    host: String,
    _permit: OwnedSemaphorePermit,
}

impl DomainPermit {
    pub fn host(&self) -> &str {
        &self.host
    }
}

struct DomainSlot {
    inflight: Arc<Semaphore>,
    timestamps: Mutex<VecDeque<Instant>>,
}

/// Sliding-window limiter keyed by host.
pub struct DomainLimiter {
    max_inflight: usize,
    max_requests: u32,
    window: Duration,
    slots: DashMap<String, Arc<DomainSlot>>,
}

impl DomainLimiter {
    /// # Arguments
    /// * `max_inflight` - Concurrent requests per host
    /// * `max_requests` - Requests per host within `window`
    /// * `window` - Window length
    pub fn new(max_inflight: usize, max_requests: u32, window: Duration) -> Self {
        Self {
            max_inflight: max_inflight.max(1),
            max_requests: max_requests.max(1),
            window,
            slots: DashMap::new(),
        }
    }

    fn slot(&self, host: &str) -> Arc<DomainSlot> {
        self.slots
            .entry(host.to_string())
            .or_insert_with(|| {
                Arc::new(DomainSlot {
                    inflight: Arc::new(Semaphore::new(self.max_inflight)),
                    timestamps: Mutex::new(VecDeque::with_capacity(self.max_requests as usize)),
                })
            })
            .clone()
    }

    /// Whether a request to `host` fits in the current window.
    pub fn can_send(&self, host: &str) -> bool {
        let slot = self.slot(host);
        let mut timestamps = slot.timestamps.lock();
        self.cleanup_old_timestamps(&mut timestamps, Instant::now());
        timestamps.len() < self.max_requests as usize
    }

    /// Record a request to `host`.
    pub fn record_send(&self, host: &str) {
        let slot = self.slot(host);
        let mut timestamps = slot.timestamps.lock();
        let now = Instant::now();
        self.cleanup_old_timestamps(&mut timestamps, now);
        timestamps.push_back(now);
        self.warn_if_near_limit(host, timestamps.len());
    }

    /// Requests to `host` in the current window.
    pub fn current_count(&self, host: &str) -> u32 {
        let slot = self.slot(host);
        let mut timestamps = slot.timestamps.lock();
        self.cleanup_old_timestamps(&mut timestamps, Instant::now());
        timestamps.len() as u32
    }

    pub fn remaining_capacity(&self, host: &str) -> u32 {
        self.max_requests.saturating_sub(self.current_count(host))
    }

    /// Requests to `host` currently holding a permit.
    pub fn inflight_count(&self, host: &str) -> usize {
        let slot = self.slot(host);
        self.max_inflight - slot.inflight.available_permits()
    }

    /// Claim a window slot for `host`, or return how long until one frees up.
    ///
    /// The check and the record happen under one lock, so concurrent callers
    /// never push the window past `max_requests`.
    pub fn try_reserve(&self, host: &str) -> Result<(), Duration> {
        let slot = self.slot(host);
        let mut timestamps = slot.timestamps.lock();
        let now = Instant::now();
        self.cleanup_old_timestamps(&mut timestamps, now);
        if timestamps.len() < self.max_requests as usize {
            timestamps.push_back(now);
            self.warn_if_near_limit(host, timestamps.len());
            return Ok(());
        }
        let wait = timestamps
            .front()
            .and_then(|&oldest| oldest.checked_add(self.window))
            .map(|frees_at| frees_at.saturating_duration_since(now))
            .unwrap_or(self.window);
        Err(wait.max(MIN_WINDOW_WAIT))
    }

    /// Wait for an inflight slot and window capacity, then record the send.
    pub async fn acquire(&self, host: &str) -> FetchResult<DomainPermit> {
        let slot = self.slot(host);
        let permit = slot
            .inflight
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| FetchError::Client(format!("limiter for {host} closed")))?;
        while let Err(wait) = self.try_reserve(host) {
            debug!(host, wait_ms = wait.as_millis() as u64, "Request window full");
            tokio::time::sleep(wait).await;
        }
        debug!(host, inflight = self.inflight_count(host), "Domain permit acquired");
        Ok(DomainPermit {
            host: host.to_string(),
            _permit: permit,
        })
    }

    fn cleanup_old_timestamps(&self, timestamps: &mut VecDeque<Instant>, now: Instant) {
        let Some(cutoff) = now.checked_sub(self.window) else {
            return;
        };
        while timestamps.front().is_some_and(|&t| t < cutoff) {
            timestamps.pop_front();
        }
    }

    fn warn_if_near_limit(&self, host: &str, count: usize) {
        if count >= self.max_requests as usize {
            warn!(
                host,
                count,
                max = self.max_requests,
                "Approaching per-domain request limit"
            );
        }
    }

    /// Forget all per-host state.
    pub fn reset(&self) {
        self.slots.clear();
    }
}

impl Default for DomainLimiter {
    fn default() -> Self {
        Self::new(2, 30, Duration::from_secs(60))
    }
}
