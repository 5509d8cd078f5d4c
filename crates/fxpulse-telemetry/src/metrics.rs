//! Prometheus metrics for fxpulse.
//!
//! Covers:
//! - Outbound fetch attempts and latency per domain
//! - Which rate source answered and how often the fallback chain was used
//! - News volume per origin
//! - Price alerts and notifications
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure means duplicate
//! metric names, which is a startup bug and only surfaces during static
//! initialization.

use crate::error::TelemetryResult;
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, Encoder,
    GaugeVec, HistogramVec, TextEncoder,
};

/// Outbound fetch attempts.
/// Labels: domain, outcome (ok/timeout/rate_limited/http_status/transport/malformed)
pub static FETCH_ATTEMPTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fxpulse_fetch_attempts_total",
        "Total outbound HTTP fetch attempts",
        &["domain", "outcome"]
    )
    .unwrap()
});

/// Fetch latency in milliseconds.
pub static FETCH_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "fxpulse_fetch_latency_ms",
        "Outbound HTTP fetch latency in milliseconds",
        &["domain"],
        vec![25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 15000.0]
    )
    .unwrap()
});

/// Rate source that produced a table.
/// Labels: source (configured source name or "mock")
pub static RATE_SOURCE_WINS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fxpulse_rate_source_wins_total",
        "Rate tables served per source",
        &["source"]
    )
    .unwrap()
});

/// Fallback usage.
/// Labels: category (rates/news), level (cached/mock/exhausted)
pub static FALLBACK_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fxpulse_fallback_total",
        "Times a refresh fell back to cached or synthetic data",
        &["category", "level"]
    )
    .unwrap()
});

/// News items emitted per origin.
/// Labels: origin (scraped/local/mock)
pub static NEWS_ITEMS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fxpulse_news_items_total",
        "News items emitted by the aggregator",
        &["origin"]
    )
    .unwrap()
});

/// Threshold alerts.
/// Labels: pair, direction (increased/decreased)
pub static PRICE_ALERTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fxpulse_price_alerts_total",
        "Threshold crossings reported by the monitor",
        &["pair", "direction"]
    )
    .unwrap()
});

/// Notifications appended to the log.
pub static NOTIFICATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fxpulse_notifications_total",
        "Notifications appended",
        &["kind"]
    )
    .unwrap()
});

/// Rate history length per pair.
pub static HISTORY_LEN: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "fxpulse_history_len",
        "Number of samples held per pair",
        &["pair"]
    )
    .unwrap()
});

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    /// Record one fetch attempt.
    pub fn fetch_attempt(domain: &str, outcome: &str) {
        FETCH_ATTEMPTS_TOTAL
            .with_label_values(&[domain, outcome])
            .inc();
    }

    /// Record fetch latency.
    pub fn fetch_latency(domain: &str, latency_ms: f64) {
        FETCH_LATENCY_MS
            .with_label_values(&[domain])
            .observe(latency_ms);
    }

    pub fn rate_source_win(source: &str) {
        RATE_SOURCE_WINS_TOTAL.with_label_values(&[source]).inc();
    }

    /// Record a fallback step (`cached`, `mock` or `exhausted`).
    pub fn fallback_used(category: &str, level: &str) {
        FALLBACK_TOTAL.with_label_values(&[category, level]).inc();
    }

    pub fn news_items(origin: &str, count: usize) {
        NEWS_ITEMS_TOTAL
            .with_label_values(&[origin])
            .inc_by(count as f64);
    }

    pub fn price_alert(pair: &str, direction: &str) {
        PRICE_ALERTS_TOTAL
            .with_label_values(&[pair, direction])
            .inc();
    }

    pub fn notification(kind: &str) {
        NOTIFICATIONS_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn history_len(pair: &str, len: usize) {
        HISTORY_LEN.with_label_values(&[pair]).set(len as f64);
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn gather_text() -> TelemetryResult<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_attempt_counter() {
        let before = FETCH_ATTEMPTS_TOTAL
            .with_label_values(&["metrics.test", "ok"])
            .get();
        Metrics::fetch_attempt("metrics.test", "ok");
        Metrics::fetch_attempt("metrics.test", "ok");
        let after = FETCH_ATTEMPTS_TOTAL
            .with_label_values(&["metrics.test", "ok"])
            .get();
        assert_eq!(after - before, 2.0);
    }

    #[test]
    fn test_gather_text_contains_metric() {
        Metrics::fallback_used("rates", "mock");
        Metrics::history_len("EUR/USD", 3);
        let text = Metrics::gather_text().unwrap();
        assert!(text.contains("fxpulse_fallback_total"));
        assert!(text.contains("fxpulse_history_len"));
    }
}
