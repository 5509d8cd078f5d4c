//! Store error types.

use fxpulse_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{what} capacity must be at least 1")]
    ZeroCapacity { what: &'static str },

    #[error("Invalid subscription: {0}")]
    Subscription(#[from] CoreError),

    #[error("No subscription for {0}")]
    NotSubscribed(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
