//! Rate source configuration.

use serde::{Deserialize, Serialize};

/// Placeholder replaced by the lower-case base code.
pub const BASE_PLACEHOLDER: &str = "{base}";
/// Placeholder replaced by the market symbol of `base/quote`.
pub const SYMBOL_PLACEHOLDER: &str = "{symbol}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateSourceKind {
    /// `{"<base>": {"<quote>": <rate>}}` REST payload.
    Json,
    /// Quote page scraped once per configured quote.
    Html,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateSourceConfig {
    pub name: String,
    pub kind: RateSourceKind,
    /// URL with `{base}` (json) or `{symbol}` (html) placeholders.
    pub url: String,
    /// Send `Authorization: Bearer <api_key>` when a key is configured.
    #[serde(default)]
    pub bearer_auth: bool,
}

impl RateSourceConfig {
    pub fn json(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: RateSourceKind::Json,
            url: url.to_string(),
            bearer_auth: false,
        }
    }

    pub fn html(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: RateSourceKind::Html,
            url: url.to_string(),
            bearer_auth: false,
        }
    }

    #[must_use]
    pub fn with_bearer_auth(mut self) -> Self {
        self.bearer_auth = true;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatesConfig {
    /// Tried in order.
    #[serde(default = "default_sources")]
    pub sources: Vec<RateSourceConfig>,
    /// Bearer token for sources with `bearer_auth`.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Quotes scraped by html sources. Empty means the market's currency table.
    #[serde(default)]
    pub scrape_quotes: Vec<String>,
    #[serde(default = "default_attempts_per_source")]
    pub attempts_per_source: u32,
    /// Fixed seed for the mock generator. Random when unset.
    #[serde(default)]
    pub mock_seed: Option<u64>,
}

fn default_sources() -> Vec<RateSourceConfig> {
    vec![
        RateSourceConfig::json(
            "currency-api",
            "https://latest.currency-api.pages.dev/v1/currencies/{base}.json",
        )
        .with_bearer_auth(),
        RateSourceConfig::json(
            "jsdelivr-mirror",
            "https://cdn.jsdelivr.net/npm/@fawazahmed0/currency-api@latest/v1/currencies/{base}.json",
        ),
        RateSourceConfig::html("quote-page", "https://finance.yahoo.com/quote/{symbol}"),
    ]
}

fn default_attempts_per_source() -> u32 {
    2
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            api_key: None,
            scrape_quotes: Vec::new(),
            attempts_per_source: default_attempts_per_source(),
            mock_seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_chain_order() {
        let config = RatesConfig::default();
        let names: Vec<_> = config.sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["currency-api", "jsdelivr-mirror", "quote-page"]);
        assert!(config.sources[0].url.contains(BASE_PLACEHOLDER));
        assert!(config.sources[2].url.contains(SYMBOL_PLACEHOLDER));
        assert_eq!(config.sources[2].kind, RateSourceKind::Html);
    }
}
