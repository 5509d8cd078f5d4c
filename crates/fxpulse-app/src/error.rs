//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP setup error: {0}")]
    Http(#[from] fxpulse_http::FetchError),

    #[error("Store error: {0}")]
    Store(#[from] fxpulse_store::StoreError),

    #[error("News error: {0}")]
    News(#[from] fxpulse_news::NewsError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] fxpulse_telemetry::TelemetryError),

    #[error("Task failed: {0}")]
    Task(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
