//! Application configuration.
//!
//! Sources, lowest to highest priority:
//! 1. Built-in defaults (every field has one)
//! 2. TOML file (`--config`, `FXPULSE_CONFIG`, or `config/default.toml`)
//! 3. `FXPULSE__SECTION__KEY` environment variables
//! 4. `FXPULSE_RATES_API_KEY` for the rate-service token

use crate::error::{AppError, AppResult};
use config::{Config, Environment, File, FileFormat};
use fxpulse_core::{MarketType, Pair};
use fxpulse_http::HttpConfig;
use fxpulse_news::{NewsConfig, MAX_LOCAL_AGE_DAYS};
use fxpulse_rates::RatesConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const CONFIG_PATH_ENV: &str = "FXPULSE_CONFIG";
pub const API_KEY_ENV: &str = "FXPULSE_RATES_API_KEY";
const ENV_PREFIX: &str = "FXPULSE";
const ENV_SEPARATOR: &str = "__";

/// One watched instrument and its alert threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    pub pair: Pair,
    /// Alert when the move between two fetches exceeds this many percent.
    #[serde(default = "default_threshold_pct")]
    pub threshold_pct: f64,
}

fn default_threshold_pct() -> f64 {
    0.5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Samples kept per pair.
    #[serde(default = "default_history_capacity")]
    pub capacity: usize,
    /// Age after which a pair's rate is refetched.
    #[serde(default = "default_pair_ttl_secs")]
    pub pair_ttl_secs: u64,
}

fn default_history_capacity() -> usize {
    fxpulse_store::DEFAULT_HISTORY_CAPACITY
}

fn default_pair_ttl_secs() -> u64 {
    60
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_history_capacity(),
            pair_ttl_secs: default_pair_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_notification_capacity")]
    pub capacity: usize,
}

fn default_notification_capacity() -> usize {
    fxpulse_store::DEFAULT_NOTIFICATION_CAPACITY
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            capacity: default_notification_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub market: MarketType,
    /// Empty means the market's default pairs at the default threshold.
    #[serde(default)]
    pub instruments: Vec<InstrumentConfig>,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub rates: RatesConfig,
    #[serde(default)]
    pub news: NewsConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

fn default_refresh_interval_secs() -> u64 {
    60
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            market: MarketType::default(),
            instruments: Vec::new(),
            http: HttpConfig::default(),
            rates: RatesConfig::default(),
            news: NewsConfig::default(),
            history: HistoryConfig::default(),
            notifications: NotificationsConfig::default(),
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }
}

impl AppConfig {
    /// Load using the standard path resolution: explicit path > `FXPULSE_CONFIG` > default file.
    ///
    /// An explicit path must exist; the default file is optional.
    pub fn load(explicit: Option<&str>) -> AppResult<Self> {
        let from_env = std::env::var(CONFIG_PATH_ENV).ok();
        let (path, required) = match (explicit, from_env.as_deref()) {
            (Some(path), _) => (path.to_string(), true),
            (None, Some(path)) => (path.to_string(), true),
            (None, None) => (DEFAULT_CONFIG_PATH.to_string(), false),
        };

        if !required && !Path::new(&path).exists() {
            tracing::warn!(path = %path, "Config file not found, using defaults");
        }

        let settings = Config::builder()
            .add_source(File::with_name(&path).format(FileFormat::Toml).required(required))
            .add_source(env_source())
            .build()?;
        Self::finish(settings)
    }

    /// Parse a TOML document, still layering environment overrides on top.
    pub fn from_toml_str(toml: &str) -> AppResult<Self> {
        let settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .add_source(env_source())
            .build()?;
        Self::finish(settings)
    }

    fn finish(settings: Config) -> AppResult<Self> {
        let mut config: Self = settings.try_deserialize()?;
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                config.rates.api_key = Some(key.trim().to_string());
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        self.http.validate().map_err(AppError::Config)?;

        for instrument in &self.instruments {
            let t = instrument.threshold_pct;
            if !(t.is_finite() && t > 0.0) {
                return Err(AppError::Config(format!(
                    "threshold_pct for {} must be > 0, got {t}",
                    instrument.pair
                )));
            }
        }
        if self.history.capacity == 0 {
            return Err(AppError::Config("history.capacity must be at least 1".into()));
        }
        if self.notifications.capacity == 0 {
            return Err(AppError::Config(
                "notifications.capacity must be at least 1".into(),
            ));
        }
        if self.news.max_per_pair == 0 {
            return Err(AppError::Config("news.max_per_pair must be at least 1".into()));
        }
        if self.news.max_age_days > MAX_LOCAL_AGE_DAYS {
            return Err(AppError::Config(format!(
                "news.max_age_days must be at most {MAX_LOCAL_AGE_DAYS}, got {}",
                self.news.max_age_days
            )));
        }
        if self.refresh_interval_secs == 0 {
            return Err(AppError::Config("refresh_interval_secs must be at least 1".into()));
        }
        if self.rates.sources.is_empty() {
            tracing::warn!("No rate sources configured, every refresh will fall back");
        }
        Ok(())
    }

    /// Configured instruments, or the market defaults when none are set.
    pub fn resolved_instruments(&self) -> Vec<InstrumentConfig> {
        if !self.instruments.is_empty() {
            return self.instruments.clone();
        }
        self.market
            .default_pairs()
            .into_iter()
            .map(|pair| InstrumentConfig {
                pair,
                threshold_pct: default_threshold_pct(),
            })
            .collect()
    }

    pub fn pairs(&self) -> Vec<Pair> {
        self.resolved_instruments()
            .into_iter()
            .map(|i| i.pair)
            .collect()
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn pair_ttl(&self) -> Duration {
        Duration::from_secs(self.history.pair_ttl_secs)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        market = "crypto"
        refresh_interval_secs = 30

        [[instruments]]
        pair = "BTC/USD"
        threshold_pct = 1.5

        [[instruments]]
        pair = "ETH-USD"

        [http]
        timeout_secs = 8

        [news]
        max_per_pair = 3
    "#;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.market, MarketType::Fx);
        assert_eq!(config.pairs(), MarketType::Fx.default_pairs());
        assert_eq!(config.history.capacity, 100);
        assert_eq!(config.notifications.capacity, 20);
    }

    #[test]
    fn test_parse_toml_with_partial_sections() {
        let config = AppConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.market, MarketType::Crypto);
        assert_eq!(config.refresh_interval(), Duration::from_secs(30));
        assert_eq!(config.http.timeout_secs, 8);
        assert_eq!(config.http.retry_attempts, 3);
        assert_eq!(config.news.max_per_pair, 3);
        assert_eq!(config.news.ttl_secs, 900);

        let instruments = config.resolved_instruments();
        assert_eq!(instruments.len(), 2);
        assert_eq!(instruments[0].threshold_pct, 1.5);
        assert_eq!(instruments[1].pair.key(), "ETH/USD");
        assert_eq!(instruments[1].threshold_pct, 0.5);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.instruments = vec![InstrumentConfig {
            pair: "EUR/USD".parse().unwrap(),
            threshold_pct: 0.0,
        }];
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.http.timeout_secs = 30;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.history.capacity = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.news.max_age_days = u32::MAX;
        assert!(config.validate().is_err());
        config.news.max_age_days = MAX_LOCAL_AGE_DAYS;
        config.validate().unwrap();
    }

    #[test]
    fn test_invalid_toml_threshold_rejected() {
        let toml = r#"
            [[instruments]]
            pair = "EUR/USD"
            threshold_pct = -1.0
        "#;
        assert!(matches!(
            AppConfig::from_toml_str(toml),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_shipped_default_file_parses() {
        let config = AppConfig::from_toml_str(include_str!("../../../config/default.toml")).unwrap();
        assert_eq!(config.market, MarketType::Fx);
        assert!(!config.rates.sources.is_empty());
        assert!(config.resolved_instruments().iter().all(|i| i.threshold_pct > 0.0));
    }
}
