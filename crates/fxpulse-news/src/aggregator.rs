//! Concurrent news scraping across sources and pairs.

use crate::config::NewsConfig;
use crate::error::{NewsError, NewsResult};
use crate::mock::scored_mock_news;
use crate::sentiment::{attach_sentiment, NeutralScorer, SentimentScorer};
use crate::sources::{default_sources, fields, NewsSource, SourceScope};
use crate::time::resolve_published;
use chrono::{DateTime, Utc};
use fxpulse_core::{CurrencyCode, MarketType, NewsIdentity, NewsItem, Pair, Provenance};
use fxpulse_http::{HeaderMap, HttpSource, Url};
use fxpulse_scrape::{Document, Record, ScrapeExtractor};
use fxpulse_telemetry::Metrics;
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// How scraped items are tied to requested pairs.
#[derive(Debug, Clone)]
enum Routing {
    /// Every item belongs to this pair.
    Pair(Pair),
    /// Items are routed by their currency field across the requested pairs.
    Market(Arc<Vec<Pair>>),
}

/// One page fetch, owned so it can run on its own task.
struct PageJob {
    http: HttpSource,
    extractor: Arc<ScrapeExtractor>,
    source: NewsSource,
    url: String,
    routing: Routing,
    attempts: u32,
    now: DateTime<Utc>,
}

impl PageJob {
    async fn run(self) -> NewsResult<Vec<NewsItem>> {
        let body = self
            .http
            .fetch_with_retry(&self.url, &HeaderMap::new(), self.attempts)
            .await?;
        // Parsed and dropped before returning; nothing is held across an await.
        let extracted = self
            .extractor
            .extract_plan(&Document::detect(&body), &self.source.plan)?;
        debug!(
            source = %self.source.name,
            url = %self.url,
            spec = %extracted.matched_spec,
            records = extracted.len(),
            "News page extracted"
        );
        Ok(extracted
            .records
            .iter()
            .filter_map(|record| self.to_item(record))
            .collect())
    }

    fn to_item(&self, record: &Record) -> Option<NewsItem> {
        let title = record.get(fields::TITLE)?.trim().to_string();
        if title.is_empty() {
            return None;
        }
        let currency_pairs = self.route(record.get(fields::CURRENCY).map(String::as_str))?;
        let url = record
            .get(fields::LINK)
            .and_then(|link| resolve_link(&self.url, link));

        Some(NewsItem {
            title,
            summary: record.get(fields::SUMMARY).cloned().unwrap_or_default(),
            timestamp: resolve_published(record.get(fields::TIME).map(String::as_str), self.now),
            source: record
                .get(fields::SOURCE)
                .filter(|s| !s.is_empty())
                .cloned()
                .unwrap_or_else(|| self.source.name.clone()),
            url,
            currency_pairs,
            sentiment: None,
            provenance: Provenance::Live,
        })
    }

    /// Pair keys for an item. `None` drops the item.
    fn route(&self, currency: Option<&str>) -> Option<BTreeSet<String>> {
        match &self.routing {
            Routing::Pair(pair) => Some(BTreeSet::from([pair.key()])),
            Routing::Market(pairs) => {
                let keys: BTreeSet<String> = match currency.and_then(first_code) {
                    Some(code) => pairs
                        .iter()
                        .filter(|p| p.involves(&code))
                        .map(Pair::key)
                        .collect(),
                    None => pairs.iter().map(Pair::key).collect(),
                };
                (!keys.is_empty()).then_some(keys)
            }
        }
    }
}

/// First token of `text` that is a valid currency code ("🇺🇸 USD" -> USD).
fn first_code(text: &str) -> Option<CurrencyCode> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .find_map(|t| CurrencyCode::new(t).ok())
}

fn resolve_link(page: &str, link: &str) -> Option<String> {
    let link = link.trim();
    if link.is_empty() || link.starts_with('#') || link.starts_with("javascript:") {
        return None;
    }
    Url::parse(page)
        .and_then(|base| base.join(link))
        .map(|u| u.to_string())
        .ok()
}

/// De-duplicate by identity (merging pair tags), order newest-first, then keep
/// at most `max_per_pair` items per requested pair.
pub(crate) fn merge_news(raw: Vec<NewsItem>, pairs: &[Pair], max_per_pair: usize) -> Vec<NewsItem> {
    let mut by_identity: HashMap<NewsIdentity, NewsItem> = HashMap::new();
    for item in raw {
        match by_identity.entry(item.identity()) {
            Entry::Occupied(mut existing) => {
                existing.get_mut().currency_pairs.extend(item.currency_pairs);
            }
            Entry::Vacant(slot) => {
                slot.insert(item);
            }
        }
    }

    let mut unique: Vec<NewsItem> = by_identity.into_values().collect();
    unique.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.title.cmp(&b.title)));

    let requested: HashSet<String> = pairs.iter().map(Pair::key).collect();
    let mut counts: HashMap<String, usize> = HashMap::new();
    unique
        .into_iter()
        .filter_map(|mut item| {
            item.currency_pairs.retain(|key| {
                requested.contains(key) && counts.get(key).copied().unwrap_or(0) < max_per_pair
            });
            if item.currency_pairs.is_empty() {
                return None;
            }
            for key in &item.currency_pairs {
                *counts.entry(key.clone()).or_default() += 1;
            }
            Some(item)
        })
        .collect()
}

/// Scrapes every configured source for the requested pairs.
pub struct NewsAggregator {
    http: HttpSource,
    extractor: Arc<ScrapeExtractor>,
    sources: Vec<NewsSource>,
    scorer: Arc<dyn SentimentScorer>,
    market: MarketType,
    attempts: u32,
}

impl NewsAggregator {
    /// Aggregator over the configured sources, or the market's defaults.
    pub fn new(http: HttpSource, market: MarketType, config: &NewsConfig) -> Self {
        Self {
            http,
            extractor: Arc::new(ScrapeExtractor::new()),
            sources: config
                .sources
                .clone()
                .unwrap_or_else(|| default_sources(market)),
            scorer: Arc::new(NeutralScorer),
            market,
            attempts: config.attempts.clamp(1, 3),
        }
    }

    #[must_use]
    pub fn with_scorer(mut self, scorer: Arc<dyn SentimentScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    #[must_use]
    pub fn with_extractor(mut self, extractor: Arc<ScrapeExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    #[must_use]
    pub fn with_sources(mut self, sources: Vec<NewsSource>) -> Self {
        self.sources = sources;
        self
    }

    pub fn sources(&self) -> &[NewsSource] {
        &self.sources
    }

    pub fn scorer(&self) -> Arc<dyn SentimentScorer> {
        self.scorer.clone()
    }

    fn job(&self, source: &NewsSource, url: String, routing: Routing, now: DateTime<Utc>) -> PageJob {
        PageJob {
            http: self.http.clone(),
            extractor: self.extractor.clone(),
            source: source.clone(),
            url,
            routing,
            attempts: self.attempts,
            now,
        }
    }

    /// Live news for `pairs`, newest-first, at most `max_per_pair` per pair.
    ///
    /// One task per (source, pair) page; market-wide pages are fetched once.
    /// A failing page is logged and skipped. May return an empty list.
    pub async fn fetch_news(&self, pairs: &[Pair], max_per_pair: usize) -> Vec<NewsItem> {
        if pairs.is_empty() {
            return Vec::new();
        }
        let now = Utc::now();
        let shared_pairs = Arc::new(pairs.to_vec());
        let mut tasks = JoinSet::new();

        for source in &self.sources {
            match source.scope {
                SourceScope::Pair => {
                    for pair in pairs {
                        let url = source.url_for(&self.market.symbol(pair));
                        let label = format!("{} {}", source.name, pair);
                        let job = self.job(source, url, Routing::Pair(pair.clone()), now);
                        tasks.spawn(async move { (label, job.run().await) });
                    }
                }
                SourceScope::Market => {
                    let job = self.job(
                        source,
                        source.url.clone(),
                        Routing::Market(shared_pairs.clone()),
                        now,
                    );
                    let label = source.name.clone();
                    tasks.spawn(async move { (label, job.run().await) });
                }
            }
        }

        let mut raw = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let (label, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    let err = NewsError::Task(e.to_string());
                    warn!(error = %err, "News task aborted");
                    continue;
                }
            };
            match result {
                Ok(items) => {
                    debug!(source = %label, items = items.len(), "News page done");
                    raw.extend(items);
                }
                Err(e) => info!(source = %label, kind = %e.kind(), error = %e, "News page skipped"),
            }
        }

        let mut merged = merge_news(raw, pairs, max_per_pair);
        for item in &mut merged {
            attach_sentiment(item, self.scorer.as_ref());
        }
        Metrics::news_items("scraped", merged.len());
        merged
    }

    /// Live news, or the mock set filtered to the requested currencies when
    /// nothing live was found. The provenance tells which one was returned.
    pub async fn fetch_news_or_mock(
        &self,
        pairs: &[Pair],
        max_per_pair: usize,
    ) -> (Vec<NewsItem>, Provenance) {
        let items = self.fetch_news(pairs, max_per_pair).await;
        if !items.is_empty() {
            return (items, Provenance::Live);
        }

        info!(pairs = pairs.len(), "No live news found, serving mock news");
        let mock = scored_mock_news(pairs, Utc::now(), self.scorer.as_ref());
        Metrics::fallback_used("news", "mock");
        Metrics::news_items("mock", mock.len());
        (mock, Provenance::Mock)
    }
}
