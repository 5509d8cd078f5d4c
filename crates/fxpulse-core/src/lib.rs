//! Core domain types for the fxpulse market-data pipeline.
//!
//! This crate provides the types shared by every stage of the pipeline:
//! - `CurrencyCode`, `Pair`: instrument identifiers
//! - `MarketType`: FX / Crypto / Indices with their symbol rules
//! - `RateSample`, `NewsItem`, `Notification`: pipeline payloads
//! - `CacheEntry`, `Provenance`: cached values tagged with where they came from
//! - `Subscription`: per-pair alert threshold state

pub mod currency;
pub mod error;
pub mod market;
pub mod subscription;
pub mod types;

pub use currency::{CurrencyCode, Pair};
pub use error::{CoreError, FailureKind, Result};
pub use market::{MarketType, PIVOT_CURRENCY};
pub use subscription::{MonitorState, Subscription};
pub use types::{
    CacheEntry, CachePayload, NewsIdentity, NewsItem, Notification, NotificationKind, Provenance,
    RateSample, RateTable, Sentiment, SentimentLabel,
};
