//! Ordered rate source chain.

use crate::config::{RateSourceConfig, RateSourceKind, RatesConfig, BASE_PLACEHOLDER, SYMBOL_PLACEHOLDER};
use crate::error::{RateError, RateResult};
use crate::parse::{parse_range_value, parse_rate_table};
use fxpulse_core::{CurrencyCode, FailureKind, MarketType, Pair, RateTable};
use fxpulse_http::{HeaderMap, HeaderValue, HttpSource, AUTHORIZATION};
use fxpulse_scrape::{Document, FieldSpec, ScrapeExtractor, SelectorSpec};
use fxpulse_telemetry::Metrics;
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Field holding the scraped quote value.
const PRICE_FIELD: &str = "price";

/// Selector chain for quote pages. The streaming range attribute comes first;
/// the plain price element covers older page layouts.
fn quote_page_chain() -> Vec<SelectorSpec> {
    vec![
        SelectorSpec::css("day-range", r#"fin-streamer[data-field="regularMarketDayRange"]"#)
            .field(FieldSpec::new(PRICE_FIELD).attr("data-value").text().required()),
        SelectorSpec::css("market-price", r#"fin-streamer[data-field="regularMarketPrice"]"#)
            .field(FieldSpec::new(PRICE_FIELD).attr("data-value").text().required()),
        SelectorSpec::css("qsp-price", r#"[data-testid="qsp-price"], [data-test="qsp-price"]"#)
            .field(FieldSpec::new(PRICE_FIELD).text().required()),
    ]
}

/// A table plus the name of the source that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedRates {
    pub table: RateTable,
    pub source: String,
}

pub struct RateFetcher {
    http: HttpSource,
    config: RatesConfig,
    market: MarketType,
    extractor: Arc<ScrapeExtractor>,
    quote_chain: Vec<SelectorSpec>,
}

impl RateFetcher {
    pub fn new(http: HttpSource, config: RatesConfig, market: MarketType) -> Self {
        Self::with_extractor(http, config, market, Arc::new(ScrapeExtractor::new()))
    }

    /// Share a scrape extractor (and its compiled selector cache) with other components.
    pub fn with_extractor(
        http: HttpSource,
        config: RatesConfig,
        market: MarketType,
        extractor: Arc<ScrapeExtractor>,
    ) -> Self {
        Self {
            http,
            config,
            market,
            extractor,
            quote_chain: quote_page_chain(),
        }
    }

    pub fn config(&self) -> &RatesConfig {
        &self.config
    }

    /// Rate table for `base`, from the first source that yields a non-empty one.
    pub async fn get_rates(&self, base: &CurrencyCode) -> RateResult<RateTable> {
        self.get_rates_with_source(base).await.map(|f| f.table)
    }

    /// Like [`get_rates`](Self::get_rates), also naming the winning source.
    pub async fn get_rates_with_source(&self, base: &CurrencyCode) -> RateResult<FetchedRates> {
        let mut failures = Vec::new();
        let mut last = FailureKind::NoMatch;

        for source in &self.config.sources {
            match self.fetch_source(source, base).await {
                Ok(table) => {
                    info!(
                        base = %base,
                        source = %source.name,
                        quotes = table.len(),
                        "Rates fetched"
                    );
                    Metrics::rate_source_win(&source.name);
                    return Ok(FetchedRates {
                        table,
                        source: source.name.clone(),
                    });
                }
                Err(e) => {
                    info!(base = %base, source = %source.name, error = %e, "Rate source failed, trying next");
                    last = e.kind();
                    failures.push(format!("{}: {e}", source.name));
                }
            }
        }

        warn!(base = %base, tried = failures.len(), "All rate sources failed");
        Err(RateError::AllSourcesFailed {
            base: base.to_string(),
            failures,
            last,
        })
    }

    async fn fetch_source(&self, source: &RateSourceConfig, base: &CurrencyCode) -> RateResult<RateTable> {
        let headers = self.headers_for(source);
        match source.kind {
            RateSourceKind::Json => {
                let url = source.url.replace(BASE_PLACEHOLDER, &base.as_lower());
                let body = self
                    .http
                    .fetch_with_retry(&url, &headers, self.config.attempts_per_source)
                    .await?;
                parse_rate_table(&body, base.as_str())
            }
            RateSourceKind::Html => self.scrape_quotes(source, base, &headers).await,
        }
    }

    fn headers_for(&self, source: &RateSourceConfig) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if !source.bearer_auth {
            return headers;
        }
        let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) else {
            return headers;
        };
        match HeaderValue::from_str(&format!("Bearer {key}")) {
            Ok(value) => {
                headers.insert(AUTHORIZATION, value);
            }
            Err(_) => warn!(source = %source.name, "API key is not a valid header value, sending without it"),
        }
        headers
    }

    fn scrape_targets(&self, base: &CurrencyCode) -> Vec<Pair> {
        let quotes: Vec<String> = if self.config.scrape_quotes.is_empty() {
            self.market.currencies().into_iter().map(str::to_string).collect()
        } else {
            self.config.scrape_quotes.clone()
        };
        quotes
            .iter()
            .filter_map(|q| CurrencyCode::new(q).ok())
            .filter(|q| q != base)
            .map(|q| Pair::new(base.clone(), q))
            .collect()
    }

    /// Scrape one quote page per target quote. Quotes that fail are skipped.
    async fn scrape_quotes(
        &self,
        source: &RateSourceConfig,
        base: &CurrencyCode,
        headers: &HeaderMap,
    ) -> RateResult<RateTable> {
        let targets = self.scrape_targets(base);
        let results = join_all(targets.iter().map(|pair| self.scrape_one(source, pair, headers))).await;

        let mut table = RateTable::new();
        for (pair, result) in targets.iter().zip(results) {
            match result {
                Ok(rate) => {
                    table.insert(pair.quote.as_lower(), rate);
                }
                Err(e) => debug!(pair = %pair, error = %e, "Quote scrape skipped"),
            }
        }

        if table.is_empty() {
            return Err(RateError::Malformed(format!(
                "{} yielded no quotes for {base}",
                source.name
            )));
        }
        Ok(table)
    }

    async fn scrape_one(&self, source: &RateSourceConfig, pair: &Pair, headers: &HeaderMap) -> RateResult<f64> {
        let url = source
            .url
            .replace(SYMBOL_PLACEHOLDER, &self.market.symbol(pair))
            .replace(BASE_PLACEHOLDER, &pair.base.as_lower());
        let body = self
            .http
            .fetch_with_retry(&url, headers, self.config.attempts_per_source)
            .await?;
        self.extract_quote(&body)
    }

    /// Pull the first parseable price out of a quote page.
    pub fn extract_quote(&self, body: &str) -> RateResult<f64> {
        let fields = self.extractor.extract(&Document::html(body), &self.quote_chain)?;
        let price = fields
            .values(PRICE_FIELD)
            .find_map(parse_range_value)
            .ok_or_else(|| RateError::Malformed(format!("unparseable price from {}", fields.matched_spec)));
        price
    }
}
