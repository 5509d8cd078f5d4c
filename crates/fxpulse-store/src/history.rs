//! Per-pair bounded rate history.
//!
//! Each pair keeps a FIFO of at most `capacity` samples. Appends past the
//! capacity evict the oldest sample first. Samples are stored in append
//! order, which is fetch-completion order for the pair.

use crate::error::{StoreError, StoreResult};
use dashmap::DashMap;
use fxpulse_core::RateSample;
use fxpulse_telemetry::Metrics;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::trace;

pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

type Series = Arc<Mutex<VecDeque<RateSample>>>;

/// Bounded time series keyed by pair (`EUR/USD`).
#[derive(Debug)]
pub struct RateHistoryStore {
    capacity: usize,
    series: DashMap<String, Series>,
}

impl RateHistoryStore {
    pub fn new(capacity: usize) -> StoreResult<Self> {
        if capacity == 0 {
            return Err(StoreError::ZeroCapacity { what: "history" });
        }
        Ok(Self {
            capacity,
            series: DashMap::new(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn get_or_create(&self, pair_key: &str) -> Series {
        self.series
            .entry(pair_key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(VecDeque::with_capacity(self.capacity))))
            .clone()
    }

    /// Append a sample, evicting the oldest past capacity. Returns the new length.
    pub fn append(&self, pair_key: &str, sample: RateSample) -> usize {
        let series = self.get_or_create(pair_key);
        let len = {
            let mut guard = series.lock();
            guard.push_back(sample);
            while guard.len() > self.capacity {
                guard.pop_front();
            }
            guard.len()
        };

        trace!(pair = pair_key, rate = sample.rate, len, "History sample appended");
        Metrics::history_len(pair_key, len);
        len
    }

    /// Samples for a pair, oldest first. Empty when the pair has none.
    pub fn get(&self, pair_key: &str) -> Vec<RateSample> {
        self.series
            .get(pair_key)
            .map(|series| series.lock().iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn latest(&self, pair_key: &str) -> Option<RateSample> {
        self.series
            .get(pair_key)
            .and_then(|series| series.lock().back().copied())
    }

    pub fn len(&self, pair_key: &str) -> usize {
        self.series
            .get(pair_key)
            .map(|series| series.lock().len())
            .unwrap_or(0)
    }

    /// Pair keys with at least one sample, sorted.
    pub fn pairs(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .series
            .iter()
            .filter(|entry| !entry.value().lock().is_empty())
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        keys
    }
}

impl Default for RateHistoryStore {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_HISTORY_CAPACITY,
            series: DashMap::new(),
        }
    }
}
