//! HTTP source configuration.

use crate::backoff::BackoffPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Allowed per-request timeout range in seconds.
pub const TIMEOUT_RANGE_SECS: std::ops::RangeInclusive<u64> = 5..=15;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Hard per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Attempts made by `fetch_with_retry` when the caller does not override it.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Concurrent requests allowed per host.
    #[serde(default = "default_max_inflight_per_domain")]
    pub max_inflight_per_domain: usize,
    /// Requests allowed per host within `window_secs`.
    #[serde(default = "default_max_requests_per_window")]
    pub max_requests_per_window: u32,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    #[serde(default)]
    pub backoff: BackoffPolicy,
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_max_inflight_per_domain() -> usize {
    2
}

fn default_max_requests_per_window() -> u32 {
    30
}

fn default_window_secs() -> u64 {
    60
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            max_inflight_per_domain: default_max_inflight_per_domain(),
            max_requests_per_window: default_max_requests_per_window(),
            window_secs: default_window_secs(),
            backoff: BackoffPolicy::default(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check bounds. Returns a description of the first violation.
    pub fn validate(&self) -> Result<(), String> {
        if !TIMEOUT_RANGE_SECS.contains(&self.timeout_secs) {
            return Err(format!(
                "http.timeout_secs must be within 5..=15, got {}",
                self.timeout_secs
            ));
        }
        if self.retry_attempts == 0 {
            return Err("http.retry_attempts must be at least 1".to_string());
        }
        if self.max_inflight_per_domain == 0 {
            return Err("http.max_inflight_per_domain must be at least 1".to_string());
        }
        if self.max_requests_per_window == 0 || self.window_secs == 0 {
            return Err("http rate window must allow at least one request".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = HttpConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_timeout_bounds() {
        let mut config = HttpConfig::default();
        config.timeout_secs = 4;
        assert!(config.validate().is_err());
        config.timeout_secs = 16;
        assert!(config.validate().is_err());
        config.timeout_secs = 15;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: HttpConfig = serde_json::from_str(r#"{"timeout_secs": 7}"#).unwrap();
        assert_eq!(config.timeout_secs, 7);
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.backoff.retry_min_ms, 2_000);
    }
}
