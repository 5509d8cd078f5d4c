//! Fetch error types.

use fxpulse_core::FailureKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("HTTP {code} from {url}")]
    HttpStatus { code: u16, url: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP client error: {0}")]
    Client(String),
}

impl FetchError {
    /// HTTP 403 or 429.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::HttpStatus { code: 403 | 429, .. })
    }

    /// Pipeline failure class for this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::HttpStatus { .. } if self.is_rate_limited() => FailureKind::RateLimited,
            Self::Timeout { .. } | Self::HttpStatus { .. } | Self::Transport(_) | Self::Client(_) => {
                FailureKind::Transport
            }
            Self::Malformed(_) | Self::InvalidUrl(_) => FailureKind::Malformed,
        }
    }

    /// Short label for metrics.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::HttpStatus { .. } if self.is_rate_limited() => "rate_limited",
            Self::HttpStatus { .. } => "http_status",
            Self::Transport(_) | Self::Client(_) => "transport",
            Self::Malformed(_) | Self::InvalidUrl(_) => "malformed",
        }
    }
}

pub type FetchResult<T> = Result<T, FetchError>;
