//! News ingestion for fxpulse.
//!
//! Two interchangeable paths produce the same `NewsItem` shape:
//! - [`NewsAggregator`]: scrapes per-market news sources through selector plans
//! - [`LocalNewsLoader`]: reads article files from disk, no network
//!
//! When the aggregate is empty the caller substitutes [`mock_news`], which is
//! always tagged `Provenance::Mock`.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod local;
pub mod mock;
pub mod sentiment;
pub mod sources;
pub mod time;

pub use aggregator::NewsAggregator;
pub use config::{NewsConfig, MAX_LOCAL_AGE_DAYS};
pub use error::{NewsError, NewsResult};
pub use local::{parse_article_name, ArticleName, LocalNewsLoader};
pub use mock::{mock_news, scored_mock_news};
pub use sentiment::{attach_sentiment, NeutralScorer, SentimentScorer};
pub use sources::{default_sources, NewsSource, SourceScope};
pub use time::{parse_published, resolve_published};
