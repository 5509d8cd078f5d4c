//! End-to-end refresh ticks against mock rate servers and local news files.

use chrono::Utc;
use fxpulse_app::{AppConfig, InstrumentConfig, Pipeline};
use fxpulse_core::{MarketType, NotificationKind, Provenance, SentimentLabel};
use fxpulse_http::{BackoffPolicy, HttpConfig};
use fxpulse_rates::{RateSourceConfig, RatesConfig};
use fxpulse_store::CacheCategory;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PRIMARY_EUR: &str = "/primary/v1/currencies/eur.json";
const MIRROR_EUR: &str = "/mirror/v1/currencies/eur.json";

fn config_for(server: &MockServer, news_dir: &Path, pairs: &[(&str, f64)]) -> AppConfig {
    let mut config = AppConfig::default();
    config.market = MarketType::Fx;
    config.instruments = pairs
        .iter()
        .map(|(pair, threshold_pct)| InstrumentConfig {
            pair: pair.parse().unwrap(),
            threshold_pct: *threshold_pct,
        })
        .collect();
    config.http = HttpConfig {
        timeout_secs: 5,
        retry_attempts: 1,
        backoff: BackoffPolicy::none(),
        ..HttpConfig::default()
    };
    config.rates = RatesConfig {
        sources: vec![
            RateSourceConfig::json(
                "primary",
                &format!("{}/primary/v1/currencies/{{base}}.json", server.uri()),
            ),
            RateSourceConfig::json(
                "mirror",
                &format!("{}/mirror/v1/currencies/{{base}}.json", server.uri()),
            ),
        ],
        api_key: None,
        scrape_quotes: Vec::new(),
        attempts_per_source: 1,
        mock_seed: Some(7),
    };
    config.news.local_dir = Some(news_dir.to_path_buf());
    config
}

fn rates_body(usd: f64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_string(format!(r#"{{"eur":{{"usd":{usd},"gbp":0.85}}}}"#))
}

#[tokio::test]
async fn test_live_rates_feed_history_and_alerts() {
    let server = MockServer::start().await;
    let news_dir = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path(PRIMARY_EUR))
        .respond_with(rates_body(1.08))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(PRIMARY_EUR))
        .respond_with(rates_body(1.087))
        .mount(&server)
        .await;

    let pipeline =
        Pipeline::new(config_for(&server, news_dir.path(), &[("EUR/USD", 0.5)])).unwrap();

    let first = pipeline.tick().await;
    assert_eq!(first.rates.len(), 1);
    assert_eq!(first.rates[0].provenance, Some(Provenance::Live));
    assert_eq!(first.rates[0].source.as_deref(), Some("primary"));
    assert_eq!(first.alerts(), 0);

    let snapshot = pipeline.snapshot();
    let eur_usd = snapshot.pair("EUR/USD").unwrap();
    assert_eq!(eur_usd.rate, Some(1.08));
    assert_eq!(eur_usd.provenance, Some(Provenance::Live));
    assert_eq!(eur_usd.history.len(), 1);

    // Live tables stay fresh until asked
    pipeline.request_refresh(CacheCategory::Rates);
    let second = pipeline.tick().await;
    assert_eq!(second.alerts(), 1);

    let snapshot = pipeline.snapshot();
    let eur_usd = snapshot.pair("EUR/USD").unwrap();
    assert_eq!(eur_usd.history.len(), 2);
    assert!((eur_usd.pct_change.unwrap() - 0.648).abs() < 0.001);

    let latest = &snapshot.notifications[0];
    assert_eq!(latest.kind, NotificationKind::Price);
    assert_eq!(latest.message, "EUR/USD increased by 0.65% (1.0800 -> 1.0870)");
}

#[tokio::test]
async fn test_mirror_serves_when_primary_down() {
    let server = MockServer::start().await;
    let news_dir = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path(PRIMARY_EUR))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(MIRROR_EUR))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"eur":{"usd":1.09}}"#))
        .mount(&server)
        .await;

    let pipeline =
        Pipeline::new(config_for(&server, news_dir.path(), &[("EUR/USD", 0.5)])).unwrap();
    let report = pipeline.tick().await;

    assert_eq!(report.rates[0].source.as_deref(), Some("mirror"));
    let table = pipeline.state().rates.get("EUR").unwrap();
    assert_eq!(table.value.len(), 1);
    assert_eq!(table.value["usd"], 1.09);
}

#[tokio::test]
async fn test_failure_after_success_keeps_cached_table() {
    let server = MockServer::start().await;
    let news_dir = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path(PRIMARY_EUR))
        .respond_with(rates_body(1.08))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let pipeline =
        Pipeline::new(config_for(&server, news_dir.path(), &[("EUR/USD", 0.5)])).unwrap();
    pipeline.tick().await;

    pipeline.request_refresh(CacheCategory::Rates);
    let report = pipeline.tick().await;
    assert_eq!(report.rates[0].provenance, Some(Provenance::Cached));

    let snapshot = pipeline.snapshot();
    let eur_usd = snapshot.pair("EUR/USD").unwrap();
    assert_eq!(eur_usd.rate, Some(1.08));
    assert_eq!(eur_usd.provenance, Some(Provenance::Cached));
    // Cached values are not new samples
    assert_eq!(eur_usd.history.len(), 1);
    assert!(snapshot
        .notifications
        .iter()
        .any(|n| n.kind == NotificationKind::Info && n.message.starts_with("Rates for EUR unavailable")));
    assert!(snapshot
        .notifications
        .iter()
        .all(|n| n.kind != NotificationKind::Error));
}

#[tokio::test]
async fn test_no_sources_fall_back_to_mock() {
    let server = MockServer::start().await;
    let news_dir = TempDir::new().unwrap();

    let pipeline =
        Pipeline::new(config_for(&server, news_dir.path(), &[("EUR/USD", 0.5)])).unwrap();
    let report = pipeline.tick().await;
    assert_eq!(report.rates[0].provenance, Some(Provenance::Mock));

    let snapshot = pipeline.snapshot();
    let eur_usd = snapshot.pair("EUR/USD").unwrap();
    assert_eq!(eur_usd.provenance, Some(Provenance::Mock));
    let rate = eur_usd.rate.unwrap();
    let reference = 1.0 / 0.92;
    assert!((rate / reference - 1.0).abs() <= 0.002 + 1e-9, "{rate}");
    assert!(eur_usd.history.is_empty());

    // Mock tables are retried on the next tick
    let again = pipeline.tick().await;
    assert_eq!(again.rates.len(), 1);
}

#[tokio::test]
async fn test_unknown_base_reports_exhausted_once() {
    let server = MockServer::start().await;
    let news_dir = TempDir::new().unwrap();

    let pipeline =
        Pipeline::new(config_for(&server, news_dir.path(), &[("XAU/USD", 1.0)])).unwrap();
    let first = pipeline.tick().await;
    assert_eq!(first.rates[0].provenance, None);
    pipeline.tick().await;

    let errors: Vec<_> = pipeline
        .snapshot()
        .notifications
        .into_iter()
        .filter(|n| n.kind == NotificationKind::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.starts_with("No rates available for XAU"));
    assert!(pipeline.snapshot().pair("XAU/USD").unwrap().rate.is_none());
}

#[tokio::test]
async fn test_local_news_and_mock_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PRIMARY_EUR))
        .respond_with(rates_body(1.08))
        .mount(&server)
        .await;

    let bullish = |_: &str| Some(0.6);

    // Empty directory: mock headlines, flagged as such and scored like live ones
    let empty_dir = TempDir::new().unwrap();
    let pipeline = Pipeline::new(config_for(&server, empty_dir.path(), &[("EUR/USD", 0.5)]))
        .unwrap()
        .with_scorer(Arc::new(bullish));
    let report = pipeline.tick().await;
    assert_eq!(report.news, Some(Provenance::Mock));
    let news = pipeline.snapshot().news;
    assert!(!news.items.is_empty());
    assert!(news.items.iter().all(|i| i.provenance == Provenance::Mock));
    assert!(news
        .items
        .iter()
        .all(|i| i.sentiment.as_ref().map(|s| s.label) == Some(SentimentLabel::Positive)));

    // One fresh article on disk
    let news_dir = TempDir::new().unwrap();
    let source_dir = news_dir.path().join("fxwire");
    std::fs::create_dir(&source_dir).unwrap();
    let name = format!("article_{}_eur_usd.txt", Utc::now().format("%Y%m%d_%H%M%S"));
    std::fs::write(source_dir.join(name), "Euro climbs on ECB outlook\n\nMarkets expect a pause.").unwrap();

    let pipeline = Pipeline::new(config_for(&server, news_dir.path(), &[("EUR/USD", 0.5)]))
        .unwrap()
        .with_scorer(Arc::new(bullish));
    let report = pipeline.tick().await;
    assert_eq!(report.news, Some(Provenance::Live));

    let news = pipeline.snapshot().news;
    assert_eq!(news.provenance, Some(Provenance::Live));
    assert_eq!(news.items.len(), 1);
    assert_eq!(news.items[0].title, "Euro climbs on ECB outlook");
    assert_eq!(news.items[0].source, "fxwire");
    assert_eq!(news.items[0].sentiment.as_ref().map(|s| s.score), Some(0.6));

    // Fresh, non-empty news is not refetched
    assert_eq!(pipeline.tick().await.news, None);
}

#[tokio::test]
async fn test_snapshot_serializes() {
    let server = MockServer::start().await;
    let news_dir = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path(PRIMARY_EUR))
        .respond_with(rates_body(1.08))
        .mount(&server)
        .await;

    let pipeline = Pipeline::new(config_for(
        &server,
        news_dir.path(),
        &[("EUR/USD", 0.5), ("EUR/GBP", 0.5)],
    ))
    .unwrap();
    let report = pipeline.tick().await;
    // Both pairs share one base fetch
    assert_eq!(report.rates.len(), 1);

    let json = serde_json::to_value(pipeline.snapshot()).unwrap();
    assert_eq!(json["market"], "fx");
    assert_eq!(json["pairs"][1]["pair"], "EUR/GBP");
    assert_eq!(json["pairs"][1]["rate"], 0.85);
    assert_eq!(json["pairs"][0]["provenance"], "live");
    assert_eq!(json["notifications"].as_array().unwrap().last().unwrap()["kind"], "system");
}
