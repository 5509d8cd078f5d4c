//! Reader-facing snapshot of the pipeline state.
//!
//! Built from `Arc` snapshots of the caches, so taking one never blocks a
//! refresh in progress.

use chrono::{DateTime, Utc};
use fxpulse_core::{MarketType, NewsItem, Notification, Provenance, RateSample};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct PipelineSnapshot {
    pub generated_at: DateTime<Utc>,
    pub market: MarketType,
    pub pairs: Vec<PairSnapshot>,
    pub news: NewsSnapshot,
    /// Newest first.
    pub notifications: Vec<Notification>,
}

impl PipelineSnapshot {
    pub fn pair(&self, key: &str) -> Option<&PairSnapshot> {
        self.pairs.iter().find(|p| p.pair == key)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PairSnapshot {
    pub pair: String,
    pub rate: Option<f64>,
    pub provenance: Option<Provenance>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub threshold_pct: Option<f64>,
    /// Change between the last two live samples, in percent.
    pub pct_change: Option<f64>,
    /// Oldest first.
    pub history: Vec<RateSample>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NewsSnapshot {
    pub provenance: Option<Provenance>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub items: Vec<NewsItem>,
}
