//! Exchange-rate acquisition for fxpulse.
//!
//! `RateFetcher` walks an ordered source chain (primary REST API, CDN mirror,
//! quote-page scrape). The first source that yields a non-empty table wins;
//! tables are never merged across sources. When every source fails the caller
//! decides between the last cached table and [`MockRateGenerator`].

pub mod config;
pub mod error;
pub mod fetcher;
pub mod mock;
pub mod parse;

pub use config::{RateSourceConfig, RateSourceKind, RatesConfig};
pub use error::{RateError, RateResult};
pub use fetcher::{FetchedRates, RateFetcher};
pub use mock::MockRateGenerator;
pub use parse::{parse_range_value, parse_rate_table};
