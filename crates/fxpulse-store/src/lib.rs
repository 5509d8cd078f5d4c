//! In-memory state stores for the fxpulse pipeline.
//!
//! Everything here lives for the process lifetime only:
//! - `RateHistoryStore`: bounded per-pair rate series for charting
//! - `ThresholdMonitor`: per-subscription percentage-change alerts
//! - `StalenessScheduler`: TTL policy deciding which caches to refresh
//! - `NotificationLog`: bounded newest-first event log
//! - `CacheStore`: immutable cache entries with one writer per key

pub mod cache;
pub mod error;
pub mod history;
pub mod monitor;
pub mod notifications;
pub mod scheduler;

pub use cache::{CacheStore, CacheWriter};
pub use error::{StoreError, StoreResult};
pub use history::{RateHistoryStore, DEFAULT_HISTORY_CAPACITY};
pub use monitor::{AlertDirection, PriceAlert, ThresholdMonitor};
pub use notifications::{NotificationLog, DEFAULT_NOTIFICATION_CAPACITY};
pub use scheduler::{CacheCategory, DueReason, StalenessScheduler, DEFAULT_NEWS_TTL};
