//! Error types for fxpulse-core.

use serde::Serialize;
use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid currency code: {0}")]
    InvalidCurrency(String),

    #[error("Invalid pair: {0}")]
    InvalidPair(String),

    #[error("Invalid threshold: {0} (must be > 0)")]
    InvalidThreshold(f64),

    #[error("Unknown market type: {0}")]
    UnknownMarket(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Pipeline-wide failure classification.
///
/// Every crate maps its own error enum onto one of these so the pipeline can
/// decide between retry, falling through a chain, or surfacing to the user.
/// Only `Exhausted` is ever shown as an `error` notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Network-level failure (connect, reset, timeout). Retryable.
    Transport,
    /// HTTP 403/429. Retryable with the long backoff.
    RateLimited,
    /// Body could not be parsed into the expected shape. Move to next chain entry.
    Malformed,
    /// Selector chain exhausted. Recoverable via mock data.
    NoMatch,
    /// All sources and the mock fallback failed.
    Exhausted,
}

impl FailureKind {
    /// Whether a retry against the same URL can help.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport | Self::RateLimited)
    }

    /// Whether this failure should reach the user as an `error` notification.
    pub fn is_user_visible(&self) -> bool {
        matches!(self, Self::Exhausted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::RateLimited => "rate_limited",
            Self::Malformed => "malformed",
            Self::NoMatch => "no_match",
            Self::Exhausted => "exhausted",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
