//! News configuration.

use crate::sources::NewsSource;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsConfig {
    /// Items kept per requested pair.
    #[serde(default = "default_max_per_pair")]
    pub max_per_pair: usize,
    /// News cache lifetime.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Fetch attempts per source page.
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    /// Replaces the market's built-in source table when set.
    #[serde(default)]
    pub sources: Option<Vec<NewsSource>>,
    /// Read articles from this directory instead of scraping.
    #[serde(default)]
    pub local_dir: Option<PathBuf>,
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u32,
    /// Drop local articles that cannot be matched to a requested pair.
    #[serde(default)]
    pub strict_local: bool,
}

fn default_max_per_pair() -> usize {
    5
}

fn default_ttl_secs() -> u64 {
    15 * 60
}

fn default_attempts() -> u32 {
    3
}

/// Upper bound accepted for `max_age_days`.
pub const MAX_LOCAL_AGE_DAYS: u32 = 3650;

fn default_max_age_days() -> u32 {
    7
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            max_per_pair: default_max_per_pair(),
            ttl_secs: default_ttl_secs(),
            attempts: default_attempts(),
            sources: None,
            local_dir: None,
            max_age_days: default_max_age_days(),
            strict_local: false,
        }
    }
}

impl NewsConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}
