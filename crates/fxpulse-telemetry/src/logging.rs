//! Structured logging initialization.
//!
//! Filter and format come from the environment:
//! - `RUST_LOG` replaces [`DEFAULT_FILTER`]
//! - `FXPULSE_LOG_FORMAT` (`json`, `pretty`, `compact`) picks the output
//! - otherwise `RUST_ENV=production` means JSON, anything else pretty

use crate::error::{TelemetryError, TelemetryResult};
use std::str::FromStr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset. Pipeline crates at debug, HTTP and
/// HTML parsing internals held at warn so a refresh tick stays readable.
pub const DEFAULT_FILTER: &str =
    "info,fxpulse=debug,reqwest=warn,hyper=warn,hyper_util=warn,html5ever=warn,selectors=warn";

pub const LOG_FORMAT_ENV: &str = "FXPULSE_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event, spans included.
    Json,
    /// Multi-line human output.
    Pretty,
    /// Single-line human output, for `--once` runs piped to a terminal.
    Compact,
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(TelemetryError::LoggingInit(format!(
                "unknown log format '{other}' (expected json, pretty or compact)"
            ))),
        }
    }
}

impl LogFormat {
    /// Explicit format wins; production defaults to JSON.
    pub fn resolve(explicit: Option<&str>, rust_env: Option<&str>) -> TelemetryResult<Self> {
        match explicit {
            Some(raw) if !raw.trim().is_empty() => raw.parse(),
            _ if rust_env == Some("production") => Ok(Self::Json),
            _ => Ok(Self::Pretty),
        }
    }

    fn from_env() -> TelemetryResult<Self> {
        let explicit = std::env::var(LOG_FORMAT_ENV).ok();
        let rust_env = std::env::var("RUST_ENV").ok();
        Self::resolve(explicit.as_deref(), rust_env.as_deref())
    }
}

/// Initialize logging from the environment.
pub fn init_logging() -> TelemetryResult<()> {
    init_logging_with(DEFAULT_FILTER, LogFormat::from_env()?)
}

/// Initialize logging with an explicit fallback filter and output format.
pub fn init_logging_with(default_filter: &str, format: LogFormat) -> TelemetryResult<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)
            .map_err(|e| TelemetryError::LoggingInit(format!("bad filter '{default_filter}': {e}")))?,
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_target(true).with_thread_names(true))
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_target(false))
            .try_init(),
    };

    result.map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }

    #[test]
    fn test_format_resolution() {
        assert_eq!(LogFormat::resolve(None, None).unwrap(), LogFormat::Pretty);
        assert_eq!(
            LogFormat::resolve(None, Some("production")).unwrap(),
            LogFormat::Json
        );
        assert_eq!(
            LogFormat::resolve(Some("Compact"), Some("production")).unwrap(),
            LogFormat::Compact
        );
        assert_eq!(LogFormat::resolve(Some(" "), None).unwrap(), LogFormat::Pretty);
        assert!(matches!(
            LogFormat::resolve(Some("xml"), None),
            Err(TelemetryError::LoggingInit(_))
        ));
    }

    #[test]
    fn test_second_init_reports_error() {
        let first = init_logging_with("warn", LogFormat::Compact);
        let second = init_logging_with("warn", LogFormat::Compact);
        assert!(first.is_err() || second.is_err());
        assert!(matches!(
            second.err().or(first.err()),
            Some(TelemetryError::LoggingInit(_))
        ));
    }
}
