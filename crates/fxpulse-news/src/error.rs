//! News error types.

use fxpulse_core::FailureKind;
use fxpulse_http::FetchError;
use fxpulse_scrape::ExtractError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NewsError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Task failed: {0}")]
    Task(String),
}

impl NewsError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Fetch(e) => e.kind(),
            Self::Extract(e) => e.kind(),
            Self::Io { .. } | Self::Walk(_) | Self::Task(_) => FailureKind::Transport,
        }
    }
}

pub type NewsResult<T> = Result<T, NewsError>;
