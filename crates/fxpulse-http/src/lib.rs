//! HTTP fetching for fxpulse sources.
//!
//! Provides a single retryable fetch primitive with:
//! - Random user-agent rotation and cache-busting on every attempt
//! - Hard per-request timeout (5-15s), reported as `FetchError::Timeout`
//! - Status-aware backoff (403/429 back off longer than other failures)
//! - Per-domain concurrency and request-rate limiting

pub mod backoff;
pub mod config;
pub mod error;
pub mod headers;
pub mod rate_limiter;
pub mod source;

pub use backoff::BackoffPolicy;
pub use config::HttpConfig;
pub use error::{FetchError, FetchResult};
pub use headers::{cache_busted, rotated_headers, USER_AGENTS};
pub use rate_limiter::{DomainLimiter, DomainPermit};
pub use source::HttpSource;

pub use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
pub use reqwest::Url;
