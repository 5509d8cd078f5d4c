//! fxpulse application layer.
//!
//! Wires the ingestion crates into one long-lived `Pipeline`:
//! - `AppConfig`: layered TOML + environment configuration
//! - `PipelineState`: history, subscriptions, caches and notifications
//! - `Pipeline`: refresh ticks, fallback chains and the run loop
//! - `PipelineSnapshot`: what readers see

pub mod config;
pub mod error;
pub mod pipeline;
pub mod snapshot;

pub use config::{AppConfig, HistoryConfig, InstrumentConfig, NotificationsConfig};
pub use error::{AppError, AppResult};
pub use pipeline::{BaseRefresh, Pipeline, PipelineState, TickReport, NEWS_KEY};
pub use snapshot::{NewsSnapshot, PairSnapshot, PipelineSnapshot};
