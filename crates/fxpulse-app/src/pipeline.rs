//! Refresh tick orchestration.
//!
//! One `Pipeline` owns the session's `PipelineState`. Each tick asks the
//! staleness scheduler what is due, refreshes rate tables (one task per base
//! currency) and the news feed concurrently, and publishes new cache entries.
//!
//! Rate fallback chain per base: live source chain -> last good table
//! (`Cached`) -> mock table (`Mock`) -> `error` notification. Only live
//! tables feed the history and the threshold monitor.

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::snapshot::{NewsSnapshot, PairSnapshot, PipelineSnapshot};
use chrono::{DateTime, Utc};
use fxpulse_core::{
    CacheEntry, CurrencyCode, MarketType, NewsItem, NotificationKind, Pair, Provenance,
    RateSample, RateTable,
};
use fxpulse_http::HttpSource;
use fxpulse_news::{scored_mock_news, LocalNewsLoader, NewsAggregator, SentimentScorer};
use fxpulse_rates::{MockRateGenerator, RateError, RateFetcher};
use fxpulse_store::{
    CacheCategory, CacheStore, CacheWriter, NotificationLog, RateHistoryStore,
    StalenessScheduler, ThresholdMonitor,
};
use fxpulse_telemetry::Metrics;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Cache key of the merged news feed.
pub const NEWS_KEY: &str = "all";

// ============================================================================
// State
// ============================================================================

/// Everything the pipeline remembers for the session.
pub struct PipelineState {
    pub history: RateHistoryStore,
    pub monitor: ThresholdMonitor,
    pub scheduler: StalenessScheduler,
    pub notifications: NotificationLog,
    /// Rate tables keyed by base code (`EUR`).
    pub rates: CacheStore<RateTable>,
    /// Latest rate per pair key (`EUR/USD`).
    pub pair_rates: CacheStore<f64>,
    pub news: CacheStore<Vec<NewsItem>>,
    /// Bases whose last refresh ended in `Exhausted`.
    exhausted: Mutex<HashSet<String>>,
}

impl PipelineState {
    /// Empty state with every configured instrument subscribed.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let state = Self {
            history: RateHistoryStore::new(config.history.capacity)?,
            monitor: ThresholdMonitor::new(),
            scheduler: StalenessScheduler::new(config.news.ttl()),
            notifications: NotificationLog::new(config.notifications.capacity)?,
            rates: CacheStore::new(),
            pair_rates: CacheStore::new(),
            news: CacheStore::new(),
            exhausted: Mutex::new(HashSet::new()),
        };
        for instrument in config.resolved_instruments() {
            state
                .monitor
                .subscribe(instrument.pair, instrument.threshold_pct)?;
        }
        Ok(state)
    }

    pub fn snapshot(&self, market: MarketType, pairs: &[Pair]) -> PipelineSnapshot {
        let pairs = pairs
            .iter()
            .map(|pair| {
                let key = pair.key();
                let entry = self.pair_rates.get(&key);
                let sub = self.monitor.get(&key);
                PairSnapshot {
                    rate: entry.as_ref().map(|e| e.value),
                    provenance: entry.as_ref().map(|e| e.provenance),
                    fetched_at: entry.as_ref().map(|e| e.fetched_at),
                    threshold_pct: sub.as_ref().map(|s| s.threshold_pct),
                    pct_change: sub.as_ref().and_then(|s| s.pct_change()),
                    history: self.history.get(&key),
                    pair: key,
                }
            })
            .collect();

        let news = self
            .news
            .get(NEWS_KEY)
            .map(|entry| NewsSnapshot {
                provenance: Some(entry.provenance),
                fetched_at: Some(entry.fetched_at),
                items: entry.value.clone(),
            })
            .unwrap_or_default();

        PipelineSnapshot {
            generated_at: Utc::now(),
            market,
            pairs,
            news,
            notifications: self.notifications.all(),
        }
    }

    /// Returns true when `base` was not already marked exhausted.
    fn mark_exhausted(&self, base: &str) -> bool {
        self.exhausted.lock().insert(base.to_string())
    }

    /// Returns true when `base` was marked exhausted.
    fn clear_exhausted(&self, base: &str) -> bool {
        self.exhausted.lock().remove(base)
    }
}

// ============================================================================
// Tick report
// ============================================================================

/// Result of refreshing one base currency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaseRefresh {
    pub base: String,
    /// `None` when live, cached and mock data were all unavailable.
    pub provenance: Option<Provenance>,
    /// Winning live source.
    pub source: Option<String>,
    pub alerts: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TickReport {
    /// In completion order.
    pub rates: Vec<BaseRefresh>,
    /// `None` when the news feed was not due.
    pub news: Option<Provenance>,
}

impl TickReport {
    pub fn alerts(&self) -> usize {
        self.rates.iter().map(|r| r.alerts).sum()
    }
}

// ============================================================================
// Rate refresh
// ============================================================================

struct RateWorker {
    state: Arc<PipelineState>,
    fetcher: RateFetcher,
    mock: MockRateGenerator,
    ttl: Duration,
}

impl RateWorker {
    /// Refresh one base under its cache writer lock.
    async fn refresh_base(&self, base: CurrencyCode, pairs: Vec<Pair>) -> BaseRefresh {
        let key = base.as_str().to_string();
        let writer = self.state.rates.writer(&key).await;
        let previous = writer.current();

        match self.fetcher.get_rates_with_source(&base).await {
            Ok(fetched) => {
                let now = Utc::now();
                let was_exhausted = self.state.clear_exhausted(&key);
                let recovered =
                    was_exhausted || previous.as_ref().is_some_and(|p| !p.provenance.is_live());
                let entry = writer.commit(CacheEntry::new(
                    fetched.table,
                    now,
                    self.ttl,
                    Provenance::Live,
                ));
                if recovered {
                    self.state.notifications.add(
                        format!("Live rates restored for {base}"),
                        NotificationKind::Success,
                    );
                }
                let alerts = self.publish_pairs(&entry, &pairs);
                BaseRefresh {
                    base: key,
                    provenance: Some(Provenance::Live),
                    source: Some(fetched.source),
                    alerts,
                }
            }
            Err(e) => self.fall_back(writer, previous, &base, &pairs, &e),
        }
    }

    fn fall_back(
        &self,
        writer: CacheWriter<'_, RateTable>,
        previous: Option<Arc<CacheEntry<RateTable>>>,
        base: &CurrencyCode,
        pairs: &[Pair],
        cause: &RateError,
    ) -> BaseRefresh {
        let key = base.as_str().to_string();
        let last_good = previous
            .as_ref()
            .filter(|p| matches!(p.provenance, Provenance::Live | Provenance::Cached));

        if let Some(last_good) = last_good {
            info!(
                base = %base,
                fetched_at = %last_good.fetched_at,
                error = %cause,
                "Rate refresh failed, keeping cached table"
            );
            Metrics::fallback_used("rates", "cached");
            if last_good.provenance.is_live() {
                self.state.notifications.add(
                    format!(
                        "Rates for {base} unavailable, showing values from {}",
                        last_good.fetched_at.format("%H:%M:%S UTC")
                    ),
                    NotificationKind::Info,
                );
            }
            let entry = writer.commit(last_good.with_provenance(Provenance::Cached));
            self.publish_pairs(&entry, pairs);
            return BaseRefresh {
                base: key,
                provenance: Some(Provenance::Cached),
                source: None,
                alerts: 0,
            };
        }

        match self.mock.table(base) {
            Ok(table) => {
                info!(base = %base, error = %cause, "Rate refresh failed, serving mock table");
                Metrics::fallback_used("rates", "mock");
                let first_mock = previous.is_none();
                let entry = writer.commit(CacheEntry::new(
                    table,
                    Utc::now(),
                    self.ttl,
                    Provenance::Mock,
                ));
                if first_mock {
                    self.state.notifications.add(
                        format!("Rates for {base} unavailable, showing sample values"),
                        NotificationKind::Info,
                    );
                }
                self.publish_pairs(&entry, pairs);
                BaseRefresh {
                    base: key,
                    provenance: Some(Provenance::Mock),
                    source: None,
                    alerts: 0,
                }
            }
            Err(mock_err) => {
                warn!(
                    base = %base,
                    error = %cause,
                    mock_error = %mock_err,
                    kind = mock_err.kind().as_str(),
                    "Rates exhausted"
                );
                Metrics::fallback_used("rates", "exhausted");
                if self.state.mark_exhausted(&key) {
                    self.state.notifications.add(
                        format!("No rates available for {base}: {cause}"),
                        NotificationKind::Error,
                    );
                }
                BaseRefresh {
                    base: key,
                    provenance: None,
                    source: None,
                    alerts: 0,
                }
            }
        }
    }

    /// Copy each pair's rate out of a published table. Live tables also feed
    /// the history and the threshold monitor. Returns the number of alerts.
    fn publish_pairs(&self, entry: &CacheEntry<RateTable>, pairs: &[Pair]) -> usize {
        let mut alerts = 0;
        for pair in pairs {
            let key = pair.key();
            let Some(&rate) = entry.value.get(&pair.quote.as_lower()) else {
                debug!(pair = %key, provenance = %entry.provenance, "Quote missing from rate table");
                continue;
            };

            self.state.pair_rates.replace(
                &key,
                CacheEntry::new(rate, entry.fetched_at, self.ttl, entry.provenance),
            );
            if !entry.provenance.is_live() {
                continue;
            }

            self.state
                .history
                .append(&key, RateSample::new(entry.fetched_at, rate));
            if let Some(alert) = self.state.monitor.record(&key, rate) {
                self.state
                    .notifications
                    .add(alert.message(), NotificationKind::Price);
                alerts += 1;
            }
        }
        alerts
    }
}

// ============================================================================
// News refresh
// ============================================================================

enum NewsBackend {
    Scrape(NewsAggregator),
    Local { loader: LocalNewsLoader, dir: PathBuf },
}

// ============================================================================
// Pipeline
// ============================================================================

pub struct Pipeline {
    config: AppConfig,
    pairs: Vec<Pair>,
    state: Arc<PipelineState>,
    rates: Arc<RateWorker>,
    news: NewsBackend,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        let state = Arc::new(PipelineState::from_config(&config)?);
        let http = HttpSource::new(config.http.clone())?;

        let rates = Arc::new(RateWorker {
            state: Arc::clone(&state),
            fetcher: RateFetcher::new(http.clone(), config.rates.clone(), config.market),
            mock: MockRateGenerator::new(config.rates.mock_seed),
            ttl: config.pair_ttl(),
        });

        let news = match &config.news.local_dir {
            Some(dir) => NewsBackend::Local {
                loader: LocalNewsLoader::new().strict(config.news.strict_local),
                dir: dir.clone(),
            },
            None => NewsBackend::Scrape(NewsAggregator::new(http, config.market, &config.news)),
        };

        let pairs = config.pairs();
        info!(
            market = %config.market,
            pairs = ?pairs.iter().map(Pair::key).collect::<Vec<_>>(),
            local_news = config.news.local_dir.is_some(),
            "Pipeline configured"
        );
        state.notifications.add(
            format!("Tracking {} {} instruments", pairs.len(), config.market),
            NotificationKind::System,
        );

        Ok(Self {
            config,
            pairs,
            state,
            rates,
            news,
        })
    }

    /// Score news with `scorer` instead of leaving sentiment neutral.
    #[must_use]
    pub fn with_scorer(mut self, scorer: Arc<dyn SentimentScorer>) -> Self {
        self.news = match self.news {
            NewsBackend::Scrape(aggregator) => NewsBackend::Scrape(aggregator.with_scorer(scorer)),
            NewsBackend::Local { loader, dir } => NewsBackend::Local {
                loader: loader.with_scorer(scorer),
                dir,
            },
        };
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn state(&self) -> &Arc<PipelineState> {
        &self.state
    }

    pub fn pairs(&self) -> &[Pair] {
        &self.pairs
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        self.state.snapshot(self.config.market, &self.pairs)
    }

    /// Force `category` on the next tick.
    pub fn request_refresh(&self, category: CacheCategory) {
        self.state.scheduler.request_refresh(category);
    }

    /// Force rates and news on the next tick.
    pub fn refresh_all(&self) {
        self.request_refresh(CacheCategory::Rates);
        self.request_refresh(CacheCategory::News);
    }

    /// One refresh pass over whatever is due.
    pub async fn tick(&self) -> TickReport {
        let now = Utc::now();
        let due = self.due_bases(now);
        let (rates, news) = tokio::join!(self.refresh_rates(due), self.refresh_news(now));

        let report = TickReport { rates, news };
        debug!(
            bases = report.rates.len(),
            alerts = report.alerts(),
            news = ?report.news,
            "Tick complete"
        );
        report
    }

    /// Refresh on an interval until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) -> AppResult<()> {
        let mut interval = tokio::time::interval(self.config.refresh_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = self.config.refresh_interval_secs, "Entering refresh loop");

        let mut ticks = 0u64;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(ticks, "Shutdown requested, leaving refresh loop");
                    break;
                }
                _ = interval.tick() => {
                    ticks += 1;
                    let report = self.tick().await;
                    if report.alerts() > 0 {
                        info!(ticks, alerts = report.alerts(), "Price alerts raised");
                    }
                }
            }
        }
        Ok(())
    }

    /// Bases with at least one due pair, or whose table itself is due.
    fn due_bases(&self, now: DateTime<Utc>) -> BTreeMap<CurrencyCode, Vec<Pair>> {
        let mut by_base: BTreeMap<CurrencyCode, Vec<Pair>> = BTreeMap::new();
        for pair in &self.pairs {
            by_base.entry(pair.base.clone()).or_default().push(pair.clone());
        }

        let scheduler = &self.state.scheduler;
        by_base.retain(|base, pairs| {
            let table = self.state.rates.get(base.as_str());
            if let Some(reason) = scheduler.due_reason(&CacheCategory::Rates, table.as_deref(), now) {
                debug!(base = %base, reason = reason.as_str(), "Rates due");
                return true;
            }
            pairs.iter().any(|pair| {
                let key = pair.key();
                let entry = self.state.pair_rates.get(&key);
                scheduler.is_due(&CacheCategory::Pair(key), entry.as_deref(), now)
            })
        });
        by_base
    }

    async fn refresh_rates(&self, due: BTreeMap<CurrencyCode, Vec<Pair>>) -> Vec<BaseRefresh> {
        let scheduler = &self.state.scheduler;
        let refreshed_pairs: Vec<String> = due.values().flatten().map(Pair::key).collect();

        let mut tasks = JoinSet::new();
        for (base, pairs) in due {
            let worker = Arc::clone(&self.rates);
            tasks.spawn(async move { worker.refresh_base(base, pairs).await });
        }

        let mut results = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(refresh) => results.push(refresh),
                Err(e) => error!(error = %e, "Rate refresh task failed"),
            }
        }

        scheduler.mark_refreshed(&CacheCategory::Rates);
        for key in refreshed_pairs {
            scheduler.mark_refreshed(&CacheCategory::Pair(key));
        }
        results
    }

    async fn refresh_news(&self, now: DateTime<Utc>) -> Option<Provenance> {
        let current = self.state.news.get(NEWS_KEY);
        let reason =
            self.state
                .scheduler
                .due_reason(&CacheCategory::News, current.as_deref(), now)?;
        debug!(reason = reason.as_str(), "News due");

        let writer = self.state.news.writer(NEWS_KEY).await;
        let previous = writer.current();
        let (items, provenance) = match &self.news {
            NewsBackend::Scrape(aggregator) => {
                aggregator
                    .fetch_news_or_mock(&self.pairs, self.config.news.max_per_pair)
                    .await
            }
            NewsBackend::Local { loader, dir } => self.load_local(loader, dir).await,
        };

        let was_mock = previous
            .as_ref()
            .is_some_and(|p| p.provenance == Provenance::Mock);
        if provenance == Provenance::Mock && !was_mock {
            self.state.notifications.add(
                "Live news unavailable, showing sample headlines",
                NotificationKind::Info,
            );
        }

        info!(items = items.len(), provenance = %provenance, "News refreshed");
        writer.commit(CacheEntry::new(
            items,
            Utc::now(),
            self.config.news.ttl(),
            provenance,
        ));
        self.state.scheduler.mark_refreshed(&CacheCategory::News);
        Some(provenance)
    }

    /// Local articles on a blocking thread, mock news when none qualify.
    async fn load_local(
        &self,
        loader: &LocalNewsLoader,
        dir: &Path,
    ) -> (Vec<NewsItem>, Provenance) {
        let task_loader = loader.clone();
        let root = dir.to_path_buf();
        let pairs = self.pairs.clone();
        let max_age_days = self.config.news.max_age_days;

        let loaded = tokio::task::spawn_blocking(move || {
            task_loader.load_from_directory(&root, &pairs, max_age_days)
        })
        .await;

        match loaded {
            Ok(Ok(items)) if !items.is_empty() => return (items, Provenance::Live),
            Ok(Ok(_)) => info!(dir = %dir.display(), "No local articles matched"),
            Ok(Err(e)) => warn!(dir = %dir.display(), error = %e, "Local news unavailable"),
            Err(e) => error!(error = %e, "Local news task failed"),
        }

        let mock = scored_mock_news(&self.pairs, Utc::now(), loader.scorer().as_ref());
        Metrics::fallback_used("news", "mock");
        Metrics::news_items("mock", mock.len());
        (mock, Provenance::Mock)
    }
}
