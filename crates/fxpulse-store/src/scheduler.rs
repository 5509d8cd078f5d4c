//! Refresh policy per cache category.
//!
//! Pure decision logic: callers pass the current entry and the clock, the
//! scheduler answers whether a refresh is due. The only state it holds is the
//! set of manual refresh requests.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use fxpulse_core::{CacheEntry, CachePayload};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_NEWS_TTL: Duration = Duration::from_secs(15 * 60);

/// Cache category the scheduler decides for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheCategory {
    /// All rate tables.
    Rates,
    /// The merged news feed.
    News,
    /// Per-pair data keyed by pair (`EUR/USD`).
    Pair(String),
}

impl fmt::Display for CacheCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rates => f.write_str("rates"),
            Self::News => f.write_str("news"),
            Self::Pair(key) => write!(f, "pair:{key}"),
        }
    }
}

/// Why a refresh is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueReason {
    ManualRequest,
    NeverFetched,
    /// Cached or mock data is shown until a live fetch succeeds.
    NotLive,
    Empty,
    Expired,
}

impl DueReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ManualRequest => "manual_request",
            Self::NeverFetched => "never_fetched",
            Self::NotLive => "not_live",
            Self::Empty => "empty",
            Self::Expired => "expired",
        }
    }
}

#[derive(Debug)]
pub struct StalenessScheduler {
    news_ttl: Duration,
    manual: Mutex<HashSet<CacheCategory>>,
}

impl StalenessScheduler {
    pub fn new(news_ttl: Duration) -> Self {
        Self {
            news_ttl,
            manual: Mutex::new(HashSet::new()),
        }
    }

    pub fn news_ttl(&self) -> Duration {
        self.news_ttl
    }

    /// Ask for a refresh on the next tick regardless of age.
    pub fn request_refresh(&self, category: CacheCategory) {
        self.manual.lock().insert(category);
    }

    /// Clear a pending manual request after the category was refreshed.
    pub fn mark_refreshed(&self, category: &CacheCategory) {
        self.manual.lock().remove(category);
    }

    pub fn is_requested(&self, category: &CacheCategory) -> bool {
        self.manual.lock().contains(category)
    }

    pub fn is_due<T: CachePayload>(
        &self,
        category: &CacheCategory,
        entry: Option<&CacheEntry<T>>,
        now: DateTime<Utc>,
    ) -> bool {
        self.due_reason(category, entry, now).is_some()
    }

    /// Reason a refresh is due, `None` when the entry is still good.
    ///
    /// - Rates: never fetched live, or a manual request.
    /// - News: never fetched, empty, or older than the news TTL.
    /// - Pair: never fetched, or older than the entry's own TTL.
    pub fn due_reason<T: CachePayload>(
        &self,
        category: &CacheCategory,
        entry: Option<&CacheEntry<T>>,
        now: DateTime<Utc>,
    ) -> Option<DueReason> {
        if self.is_requested(category) {
            return Some(DueReason::ManualRequest);
        }
        let Some(entry) = entry else {
            return Some(DueReason::NeverFetched);
        };

        match category {
            CacheCategory::Rates => (!entry.provenance.is_live()).then_some(DueReason::NotLive),
            CacheCategory::News => {
                if entry.value.is_empty_payload() {
                    Some(DueReason::Empty)
                } else if entry.age(now) > self.news_ttl_chrono() {
                    Some(DueReason::Expired)
                } else {
                    None
                }
            }
            CacheCategory::Pair(_) => entry.is_stale(now).then_some(DueReason::Expired),
        }
    }

    fn news_ttl_chrono(&self) -> ChronoDuration {
        ChronoDuration::from_std(self.news_ttl).unwrap_or(ChronoDuration::MAX)
    }
}

impl Default for StalenessScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_NEWS_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxpulse_core::{NewsItem, Provenance, RateTable};

    fn rates_entry(provenance: Provenance, fetched_at: DateTime<Utc>) -> CacheEntry<RateTable> {
        let table = RateTable::from([("usd".to_string(), 1.09)]);
        CacheEntry::new(table, fetched_at, Duration::from_secs(60), provenance)
    }

    fn news_entry(items: Vec<NewsItem>, fetched_at: DateTime<Utc>) -> CacheEntry<Vec<NewsItem>> {
        CacheEntry::new(items, fetched_at, DEFAULT_NEWS_TTL, Provenance::Live)
    }

    fn headline() -> NewsItem {
        NewsItem {
            title: "ECB holds rates".to_string(),
            summary: String::new(),
            timestamp: Utc::now(),
            source: "Reuters".to_string(),
            url: None,
            currency_pairs: ["EUR/USD".to_string()].into(),
            sentiment: None,
            provenance: Provenance::Live,
        }
    }

    #[test]
    fn test_rates_due_until_live_fetch() {
        let scheduler = StalenessScheduler::default();
        let now = Utc::now();

        assert_eq!(
            scheduler.due_reason::<RateTable>(&CacheCategory::Rates, None, now),
            Some(DueReason::NeverFetched)
        );
        let mock = rates_entry(Provenance::Mock, now);
        assert_eq!(
            scheduler.due_reason(&CacheCategory::Rates, Some(&mock), now),
            Some(DueReason::NotLive)
        );

        // A live table stays fresh no matter how old it is
        let live = rates_entry(Provenance::Live, now - ChronoDuration::days(2));
        assert!(!scheduler.is_due(&CacheCategory::Rates, Some(&live), now));
    }

    #[test]
    fn test_manual_request_forces_refresh() {
        let scheduler = StalenessScheduler::default();
        let now = Utc::now();
        let live = rates_entry(Provenance::Live, now);

        scheduler.request_refresh(CacheCategory::Rates);
        assert_eq!(
            scheduler.due_reason(&CacheCategory::Rates, Some(&live), now),
            Some(DueReason::ManualRequest)
        );

        scheduler.mark_refreshed(&CacheCategory::Rates);
        assert!(!scheduler.is_due(&CacheCategory::Rates, Some(&live), now));
    }

    #[test]
    fn test_news_due_when_empty_or_expired() {
        let scheduler = StalenessScheduler::default();
        let now = Utc::now();

        let empty = news_entry(Vec::new(), now);
        assert_eq!(
            scheduler.due_reason(&CacheCategory::News, Some(&empty), now),
            Some(DueReason::Empty)
        );

        let fresh = news_entry(vec![headline()], now - ChronoDuration::minutes(14));
        assert!(!scheduler.is_due(&CacheCategory::News, Some(&fresh), now));

        let old = news_entry(vec![headline()], now - ChronoDuration::minutes(16));
        assert_eq!(
            scheduler.due_reason(&CacheCategory::News, Some(&old), now),
            Some(DueReason::Expired)
        );
    }

    #[test]
    fn test_pair_uses_entry_ttl() {
        let scheduler = StalenessScheduler::default();
        let now = Utc::now();
        let category = CacheCategory::Pair("EUR/USD".to_string());

        let fresh = CacheEntry::new(
            1.08_f64,
            now - ChronoDuration::seconds(30),
            Duration::from_secs(60),
            Provenance::Live,
        );
        assert!(!scheduler.is_due(&category, Some(&fresh), now));

        let stale = CacheEntry::new(
            1.08_f64,
            now - ChronoDuration::seconds(61),
            Duration::from_secs(60),
            Provenance::Live,
        );
        assert!(scheduler.is_due(&category, Some(&stale), now));

        // Manual requests are per category
        scheduler.request_refresh(CacheCategory::Pair("GBP/USD".to_string()));
        assert!(!scheduler.is_due(&category, Some(&fresh), now));
    }
}
