//! Common data types flowing through the pipeline.
//!
//! Contains rate samples, news items, notifications and the cache entry
//! wrapper with its provenance tag.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

/// Normalized rate table for one base currency: lower-case quote code -> rate.
pub type RateTable = HashMap<String, f64>;

/// Single point of a pair's rate history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateSample {
    pub timestamp: DateTime<Utc>,
    pub rate: f64,
}

impl RateSample {
    pub fn new(timestamp: DateTime<Utc>, rate: f64) -> Self {
        Self { timestamp, rate }
    }

    /// Sample stamped with the current time.
    pub fn now(rate: f64) -> Self {
        Self::new(Utc::now(), rate)
    }
}

/// Where a cached value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Fetched from a live source on the last refresh.
    #[default]
    Live,
    /// Last good live value, kept because the latest refresh failed.
    Cached,
    /// Synthetic placeholder. Never present it as live data.
    Mock,
}

impl Provenance {
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Cached => "cached",
            Self::Mock => "mock",
        }
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payloads that can be checked for emptiness by the staleness policy.
pub trait CachePayload {
    fn is_empty_payload(&self) -> bool;
}

impl<T> CachePayload for Vec<T> {
    fn is_empty_payload(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V, S> CachePayload for HashMap<K, V, S> {
    fn is_empty_payload(&self) -> bool {
        self.is_empty()
    }
}

impl CachePayload for f64 {
    fn is_empty_payload(&self) -> bool {
        false
    }
}

/// Immutable cached value. Replaced as a whole, never mutated in place.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub value: T,
    pub fetched_at: DateTime<Utc>,
    pub ttl: Duration,
    pub provenance: Provenance,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, fetched_at: DateTime<Utc>, ttl: Duration, provenance: Provenance) -> Self {
        Self {
            value,
            fetched_at,
            ttl,
            provenance,
        }
    }

    /// Live entry fetched now.
    pub fn live(value: T, ttl: Duration) -> Self {
        Self::new(value, Utc::now(), ttl, Provenance::Live)
    }

    /// Entry age relative to `now`. Negative ages (clock skew) read as zero.
    pub fn age(&self, now: DateTime<Utc>) -> ChronoDuration {
        (now - self.fetched_at).max(ChronoDuration::zero())
    }

    /// `now - fetched_at > ttl`.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        let ttl = ChronoDuration::from_std(self.ttl).unwrap_or(ChronoDuration::MAX);
        now - self.fetched_at > ttl
    }

    /// Same value and timestamp with a different provenance tag.
    pub fn with_provenance(&self, provenance: Provenance) -> Self
    where
        T: Clone,
    {
        Self {
            value: self.value.clone(),
            fetched_at: self.fetched_at,
            ttl: self.ttl,
            provenance,
        }
    }
}

/// Sentiment label derived from a scorer's numeric output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    #[default]
    Neutral,
    Negative,
}

/// Label thresholds: score > 0.2 positive, score < -0.2 negative.
const SENTIMENT_THRESHOLD: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub label: SentimentLabel,
    pub score: f64,
}

impl Sentiment {
    pub fn from_score(score: f64) -> Self {
        let label = if score > SENTIMENT_THRESHOLD {
            SentimentLabel::Positive
        } else if score < -SENTIMENT_THRESHOLD {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        };
        Self { label, score }
    }

    pub fn neutral() -> Self {
        Self {
            label: SentimentLabel::Neutral,
            score: 0.0,
        }
    }
}

/// Identity used for news de-duplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NewsIdentity {
    Url(String),
    TitleSource(String, String),
}

/// News article in the shape shared by scraped, local and mock news.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub summary: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub url: Option<String>,
    /// Pair keys (`EUR/USD`) or single codes (`USD`) the article relates to.
    pub currency_pairs: BTreeSet<String>,
    pub sentiment: Option<Sentiment>,
    #[serde(default)]
    pub provenance: Provenance,
}

impl NewsItem {
    /// De-dup key: URL when present, otherwise (title, source).
    pub fn identity(&self) -> NewsIdentity {
        match self.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => NewsIdentity::Url(url.to_string()),
            _ => NewsIdentity::TitleSource(self.title.trim().to_string(), self.source.clone()),
        }
    }

    /// Sentiment, defaulting to neutral when no scorer ran.
    pub fn sentiment_or_neutral(&self) -> Sentiment {
        self.sentiment.unwrap_or_else(Sentiment::neutral)
    }

    /// Every currency code mentioned by `currency_pairs`.
    pub fn currencies(&self) -> BTreeSet<String> {
        self.currency_pairs
            .iter()
            .flat_map(|p| p.split('/'))
            .filter(|c| !c.is_empty())
            .map(str::to_ascii_uppercase)
            .collect()
    }

    /// Text handed to the sentiment scorer.
    pub fn scoring_text(&self) -> String {
        if self.summary.is_empty() {
            self.title.clone()
        } else {
            format!("{} {}", self.title, self.summary)
        }
    }
}

/// Notification category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Price,
    System,
    Error,
    Info,
    Success,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::System => "system",
            Self::Error => "error",
            Self::Info => "info",
            Self::Success => "success",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Monotonic, derived from the insertion time in milliseconds.
    pub id: u64,
    pub message: String,
    pub kind: NotificationKind,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(url: Option<&str>, title: &str, source: &str) -> NewsItem {
        NewsItem {
            title: title.to_string(),
            summary: String::new(),
            timestamp: Utc::now(),
            source: source.to_string(),
            url: url.map(str::to_string),
            currency_pairs: BTreeSet::from(["EUR/USD".to_string()]),
            sentiment: None,
            provenance: Provenance::Live,
        }
    }

    #[test]
    fn test_sentiment_thresholds() {
        assert_eq!(Sentiment::from_score(0.21).label, SentimentLabel::Positive);
        assert_eq!(Sentiment::from_score(0.2).label, SentimentLabel::Neutral);
        assert_eq!(Sentiment::from_score(-0.2).label, SentimentLabel::Neutral);
        assert_eq!(Sentiment::from_score(-0.5).label, SentimentLabel::Negative);
    }

    #[test]
    fn test_news_identity_prefers_url() {
        let a = item(Some("https://x/1"), "Title A", "S1");
        let b = item(Some("https://x/1"), "Title B", "S2");
        assert_eq!(a.identity(), b.identity());

        let c = item(None, "Title A", "S1");
        let d = item(Some("  "), "Title A", "S1");
        assert_eq!(c.identity(), d.identity());
        assert_ne!(c.identity(), item(None, "Title A", "S2").identity());
    }

    #[test]
    fn test_news_currencies_split_pairs() {
        let mut news = item(None, "t", "s");
        news.currency_pairs.insert("JPY".to_string());
        let codes: Vec<_> = news.currencies().into_iter().collect();
        assert_eq!(codes, vec!["EUR", "JPY", "USD"]);
        assert_eq!(news.sentiment_or_neutral(), Sentiment::neutral());
    }

    #[test]
    fn test_cache_entry_staleness() {
        let fetched = Utc::now();
        let entry = CacheEntry::new(1.0_f64, fetched, Duration::from_secs(900), Provenance::Live);
        assert!(!entry.is_stale(fetched + ChronoDuration::minutes(15)));
        assert!(entry.is_stale(fetched + ChronoDuration::minutes(15) + ChronoDuration::seconds(1)));
    }

    #[test]
    fn test_cache_entry_with_provenance_keeps_timestamp() {
        let entry = CacheEntry::live(vec![1, 2, 3], Duration::from_secs(60));
        let cached = entry.with_provenance(Provenance::Cached);
        assert_eq!(cached.fetched_at, entry.fetched_at);
        assert_eq!(cached.provenance, Provenance::Cached);
        assert!(!cached.value.is_empty_payload());
    }
}
