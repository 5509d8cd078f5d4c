//! Rate error types.

use fxpulse_core::FailureKind;
use fxpulse_http::FetchError;
use fxpulse_scrape::ExtractError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RateError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("Malformed rate payload: {0}")]
    Malformed(String),

    /// Every configured source failed for `base`.
    #[error("All rate sources failed for {base}: {}", .failures.join("; "))]
    AllSourcesFailed {
        base: String,
        failures: Vec<String>,
        last: FailureKind,
    },

    /// The mock generator has no seed for this code.
    #[error("No mock seed for {0}")]
    UnknownBase(String),
}

impl RateError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Fetch(e) => e.kind(),
            Self::Extract(e) => e.kind(),
            Self::Malformed(_) => FailureKind::Malformed,
            Self::AllSourcesFailed { last, .. } => *last,
            Self::UnknownBase(_) => FailureKind::Exhausted,
        }
    }
}

pub type RateResult<T> = Result<T, RateError>;
