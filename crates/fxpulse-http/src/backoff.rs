//! Status-aware retry backoff.

use crate::error::FetchError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff ranges in milliseconds. A delay is drawn uniformly from the range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// After HTTP 403/429. Default 5-10s.
    #[serde(default = "default_rate_limited_min_ms")]
    pub rate_limited_min_ms: u64,
    #[serde(default = "default_rate_limited_max_ms")]
    pub rate_limited_max_ms: u64,
    /// After any other failure. Default 2-4s.
    #[serde(default = "default_retry_min_ms")]
    pub retry_min_ms: u64,
    #[serde(default = "default_retry_max_ms")]
    pub retry_max_ms: u64,
}

fn default_rate_limited_min_ms() -> u64 {
    5_000
}

fn default_rate_limited_max_ms() -> u64 {
    10_000
}

fn default_retry_min_ms() -> u64 {
    2_000
}

fn default_retry_max_ms() -> u64 {
    4_000
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            rate_limited_min_ms: default_rate_limited_min_ms(),
            rate_limited_max_ms: default_rate_limited_max_ms(),
            retry_min_ms: default_retry_min_ms(),
            retry_max_ms: default_retry_max_ms(),
        }
    }
}

impl BackoffPolicy {
    /// Zero-delay policy.
    pub fn none() -> Self {
        Self {
            rate_limited_min_ms: 0,
            rate_limited_max_ms: 0,
            retry_min_ms: 0,
            retry_max_ms: 0,
        }
    }

    /// Delay before retrying after `err`.
    pub fn delay_for(&self, err: &FetchError) -> Duration {
        if err.is_rate_limited() {
            jitter(self.rate_limited_min_ms, self.rate_limited_max_ms)
        } else {
            jitter(self.retry_min_ms, self.retry_max_ms)
        }
    }
}

/// Uniform random delay in `[min_ms, max_ms]`. An inverted range collapses to `min_ms`.
pub fn jitter(min_ms: u64, max_ms: u64) -> Duration {
    if max_ms <= min_ms {
        return Duration::from_millis(min_ms);
    }
    Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
}
