//! Extraction error types.

use fxpulse_core::FailureKind;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// Every spec in the chain was tried and none matched.
    #[error("No selector matched (tried: {})", tried.join(", "))]
    NoMatch { tried: Vec<String> },

    #[error("Invalid selector in spec {spec}: {reason}")]
    InvalidSelector { spec: String, reason: String },

    #[error("Malformed document: {0}")]
    Malformed(String),
}

impl ExtractError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NoMatch { .. } => FailureKind::NoMatch,
            Self::InvalidSelector { .. } | Self::Malformed(_) => FailureKind::Malformed,
        }
    }

    pub fn is_no_match(&self) -> bool {
        matches!(self, Self::NoMatch { .. })
    }
}

pub type ExtractResult<T> = Result<T, ExtractError>;
