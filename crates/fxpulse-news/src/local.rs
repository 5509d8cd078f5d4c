//! Network-free news ingestion from article files.
//!
//! Layout: `<root>/<source>/article_<YYYYMMDD>_<HHMMSS>_<base>_<quote>.txt`.
//! The first non-empty line is the title and the rest is the body. Names that
//! do not fit the convention exactly go through a looser token split; files
//! whose name carries no usable timestamp use their modification time.

use crate::error::{NewsError, NewsResult};
use crate::sentiment::{attach_sentiment, NeutralScorer, SentimentScorer};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use fxpulse_core::{NewsItem, Pair, Provenance};
use fxpulse_telemetry::Metrics;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

static ARTICLE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^article_(\d{8})_(\d{6})_([A-Za-z0-9]+)_([A-Za-z0-9]+)\.txt$").unwrap()
});

const ARTICLE_PREFIX: &str = "article";
const ARTICLE_EXT: &str = ".txt";

/// What a file name says about its article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleName {
    pub timestamp: Option<DateTime<Utc>>,
    pub pair: Option<Pair>,
}

/// Parse an article file name. `None` when the name is not an article file.
pub fn parse_article_name(name: &str) -> Option<ArticleName> {
    let lower = name.to_ascii_lowercase();
    if !lower.starts_with(ARTICLE_PREFIX) || !lower.ends_with(ARTICLE_EXT) {
        return None;
    }

    if let Some(caps) = ARTICLE_NAME.captures(name) {
        let timestamp = NaiveDateTime::parse_from_str(&format!("{}{}", &caps[1], &caps[2]), "%Y%m%d%H%M%S")
            .ok()
            .map(|naive| Utc.from_utc_datetime(&naive));
        let pair = Pair::parse_codes(&caps[3], &caps[4]).ok();
        if timestamp.is_some() && pair.is_some() {
            return Some(ArticleName { timestamp, pair });
        }
    }
    Some(parse_loosely(&name[..name.len() - ARTICLE_EXT.len()]))
}

/// Token-split fallback for names that miss the strict pattern.
fn parse_loosely(stem: &str) -> ArticleName {
    let tokens: Vec<&str> = stem
        .split(['_', '-', '.', ' '])
        .filter(|t| !t.is_empty())
        .skip_while(|t| t.eq_ignore_ascii_case(ARTICLE_PREFIX))
        .collect();
    let all_digits = |t: &&str| t.chars().all(|c| c.is_ascii_digit());

    let date = tokens
        .iter()
        .filter(|t| t.len() == 8 && all_digits(t))
        .find_map(|t| NaiveDate::parse_from_str(t, "%Y%m%d").ok());
    let time = tokens
        .iter()
        .filter(|t| t.len() == 6 && all_digits(t))
        .find_map(|t| NaiveTime::parse_from_str(t, "%H%M%S").ok())
        .unwrap_or(NaiveTime::MIN);
    let timestamp = date.map(|d| Utc.from_utc_datetime(&d.and_time(time)));

    let codes: Vec<&str> = tokens
        .iter()
        .filter(|t| !all_digits(t) && (2..=10).contains(&t.len()))
        .copied()
        .collect();
    let pair = match codes.as_slice() {
        [.., base, quote] => Pair::parse_codes(base, quote).ok(),
        [joined] if joined.len() == 6 && joined.chars().all(|c| c.is_ascii_alphabetic()) => {
            let (base, quote) = joined.split_at(3);
            Pair::parse_codes(base, quote).ok()
        }
        _ => None,
    };

    ArticleName { timestamp, pair }
}

/// Loads article files into `NewsItem`s.
#[derive(Clone)]
pub struct LocalNewsLoader {
    strict: bool,
    scorer: Arc<dyn SentimentScorer>,
}

impl Default for LocalNewsLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalNewsLoader {
    pub fn new() -> Self {
        Self {
            strict: false,
            scorer: Arc::new(NeutralScorer),
        }
    }

    /// Drop files that cannot be matched to a requested pair.
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    #[must_use]
    pub fn with_scorer(mut self, scorer: Arc<dyn SentimentScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn scorer(&self) -> Arc<dyn SentimentScorer> {
        self.scorer.clone()
    }

    pub fn load_from_directory(
        &self,
        root: &Path,
        pairs: &[Pair],
        max_age_days: u32,
    ) -> NewsResult<Vec<NewsItem>> {
        self.load_from_directory_at(root, pairs, max_age_days, Utc::now())
    }

    /// Load articles no older than `max_age_days` relative to `now`, newest-first.
    ///
    /// An unreadable root is an error; unreadable individual files are skipped.
    pub fn load_from_directory_at(
        &self,
        root: &Path,
        pairs: &[Pair],
        max_age_days: u32,
        now: DateTime<Utc>,
    ) -> NewsResult<Vec<NewsItem>> {
        let metadata = std::fs::metadata(root).map_err(|source| NewsError::Io {
            path: root.to_path_buf(),
            source,
        })?;
        if !metadata.is_dir() {
            return Err(NewsError::Io {
                path: root.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
            });
        }

        // Out-of-range ages mean no cutoff
        let cutoff = Duration::try_days(i64::from(max_age_days))
            .and_then(|age| now.checked_sub_signed(age));
        let mut items = Vec::new();

        for entry in WalkDir::new(root).min_depth(2).max_depth(2) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %NewsError::Walk(e), "Skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            let Some(parsed) = parse_article_name(name) else {
                debug!(file = %entry.path().display(), "Not an article file");
                continue;
            };

            let timestamp = match parsed.timestamp {
                Some(ts) => ts,
                None => entry
                    .metadata()
                    .ok()
                    .and_then(|m| m.modified().ok())
                    .map(DateTime::<Utc>::from)
                    .unwrap_or(now),
            };
            if cutoff.is_some_and(|cutoff| timestamp < cutoff) {
                debug!(file = %name, %timestamp, "Article older than cutoff");
                continue;
            }

            let currency_pairs = match self.route(parsed.pair.as_ref(), pairs) {
                Some(keys) => keys,
                None => {
                    debug!(file = %name, "Article does not match requested pairs");
                    continue;
                }
            };

            let content = match std::fs::read_to_string(entry.path()) {
                Ok(content) => content,
                Err(source) => {
                    let err = NewsError::Io {
                        path: entry.path().to_path_buf(),
                        source,
                    };
                    warn!(error = %err, "Skipping unreadable article");
                    continue;
                }
            };
            let Some((title, body)) = split_article(&content) else {
                debug!(file = %name, "Empty article");
                continue;
            };

            let source = entry
                .path()
                .parent()
                .and_then(Path::file_name)
                .and_then(|s| s.to_str())
                .unwrap_or("local")
                .to_string();

            let mut item = NewsItem {
                title,
                summary: body,
                timestamp,
                source,
                url: None,
                currency_pairs,
                sentiment: None,
                provenance: Provenance::Live,
            };
            attach_sentiment(&mut item, self.scorer.as_ref());
            items.push(item);
        }

        items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.title.cmp(&b.title)));
        info!(root = %root.display(), articles = items.len(), "Local news loaded");
        Metrics::news_items("local", items.len());
        Ok(items)
    }

    /// Pair keys for a file, or `None` to drop it.
    fn route(&self, file_pair: Option<&Pair>, requested: &[Pair]) -> Option<BTreeSet<String>> {
        let matched = file_pair.and_then(|fp| {
            requested
                .iter()
                .find(|p| *p == fp || p.inverse() == *fp)
        });
        match (matched, file_pair) {
            (Some(pair), _) => Some(BTreeSet::from([pair.key()])),
            _ if requested.is_empty() => Some(file_pair.map(|p| BTreeSet::from([p.key()])).unwrap_or_default()),
            _ if self.strict => None,
            (None, Some(fp)) => Some(BTreeSet::from([fp.key()])),
            (None, None) => Some(BTreeSet::new()),
        }
    }
}

/// First non-empty line is the title, the remainder (trimmed) the body.
fn split_article(content: &str) -> Option<(String, String)> {
    let mut lines = content.lines().skip_while(|l| l.trim().is_empty());
    let title = lines.next()?.trim().to_string();
    let body = lines.collect::<Vec<_>>().join("\n").trim().to_string();
    Some((title, body))
}
