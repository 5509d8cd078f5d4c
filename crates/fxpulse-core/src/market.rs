//! Market type variants and their instrument rules.
//!
//! A single pipeline serves FX, crypto and index dashboards. Everything that
//! differs between them (quote symbol format, currency table, default
//! instruments) hangs off `MarketType` and is dispatched by `match`.

use crate::currency::{CurrencyCode, Pair};
use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Pivot currency for quote-page symbols.
pub const PIVOT_CURRENCY: &str = "USD";

const FX_CURRENCIES: &[&str] = &[
    "USD", "EUR", "GBP", "JPY", "CHF", "AUD", "CAD", "NZD", "CNY", "HKD", "SGD", "INR", "SEK",
    "NOK", "MXN", "ZAR",
];

const CRYPTO_ASSETS: &[&str] = &["BTC", "ETH", "SOL", "XRP", "ADA", "DOGE", "BNB", "USDT", "USD"];

/// Index code -> quote-page ticker.
const INDEX_TICKERS: &[(&str, &str)] = &[
    ("SPX", "^GSPC"),
    ("NDX", "^NDX"),
    ("DJI", "^DJI"),
    ("FTSE", "^FTSE"),
    ("DAX", "^GDAXI"),
    ("N225", "^N225"),
    ("HSI", "^HSI"),
    ("CAC", "^FCHI"),
];

/// Market type served by a pipeline instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    #[default]
    Fx,
    Crypto,
    Indices,
}

impl MarketType {
    /// Quote-page symbol for a pair.
    ///
    /// - FX: `BASEQUOTE=X`, or `QUOTE=X` when the base is the pivot (USD).
    /// - Crypto: `BASE-QUOTE`.
    /// - Indices: the index ticker for the base (`SPX` -> `^GSPC`), `^BASE` if unknown.
    pub fn symbol(&self, pair: &Pair) -> String {
        match self {
            Self::Fx => {
                if pair.base.as_str() == PIVOT_CURRENCY {
                    format!("{}=X", pair.quote)
                } else {
                    format!("{}{}=X", pair.base, pair.quote)
                }
            }
            Self::Crypto => format!("{}-{}", pair.base, pair.quote),
            Self::Indices => INDEX_TICKERS
                .iter()
                .find(|(code, _)| *code == pair.base.as_str())
                .map(|(_, ticker)| (*ticker).to_string())
                .unwrap_or_else(|| format!("^{}", pair.base)),
        }
    }

    /// Codes offered by this market's currency table.
    pub fn currencies(&self) -> Vec<&'static str> {
        match self {
            Self::Fx => FX_CURRENCIES.to_vec(),
            Self::Crypto => CRYPTO_ASSETS.to_vec(),
            Self::Indices => INDEX_TICKERS.iter().map(|(code, _)| *code).collect(),
        }
    }

    /// Whether `code` belongs to this market's currency table.
    pub fn supports(&self, code: &CurrencyCode) -> bool {
        self.currencies().contains(&code.as_str())
    }

    /// Instruments shown when the user has not configured any.
    pub fn default_pairs(&self) -> Vec<Pair> {
        let raw: &[(&str, &str)] = match self {
            Self::Fx => &[("EUR", "USD"), ("GBP", "USD"), ("USD", "JPY"), ("AUD", "USD")],
            Self::Crypto => &[("BTC", "USD"), ("ETH", "USD"), ("SOL", "USD")],
            Self::Indices => &[("SPX", "USD"), ("NDX", "USD"), ("FTSE", "GBP")],
        };
        raw.iter()
            .filter_map(|(base, quote)| Pair::parse_codes(base, quote).ok())
            .collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fx => "fx",
            Self::Crypto => "crypto",
            Self::Indices => "indices",
        }
    }
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fx" | "forex" => Ok(Self::Fx),
            "crypto" => Ok(Self::Crypto),
            "indices" | "index" => Ok(Self::Indices),
            other => Err(CoreError::UnknownMarket(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(s: &str) -> Pair {
        s.parse().unwrap()
    }

    #[test]
    fn test_fx_symbol() {
        assert_eq!(MarketType::Fx.symbol(&pair("EUR/USD")), "EURUSD=X");
        assert_eq!(MarketType::Fx.symbol(&pair("GBP/JPY")), "GBPJPY=X");
    }

    #[test]
    fn test_fx_symbol_pivot_base_uses_quote_only() {
        assert_eq!(MarketType::Fx.symbol(&pair("USD/JPY")), "JPY=X");
    }

    #[test]
    fn test_crypto_and_index_symbols() {
        assert_eq!(MarketType::Crypto.symbol(&pair("BTC/USD")), "BTC-USD");
        assert_eq!(MarketType::Indices.symbol(&pair("SPX/USD")), "^GSPC");
        assert_eq!(MarketType::Indices.symbol(&pair("IBEX/EUR")), "^IBEX");
    }

    #[test]
    fn test_default_pairs_use_supported_codes() {
        for market in [MarketType::Fx, MarketType::Crypto, MarketType::Indices] {
            let pairs = market.default_pairs();
            assert!(!pairs.is_empty());
            for p in pairs {
                assert!(market.supports(&p.base), "{market}: {p}");
            }
        }
    }

    #[test]
    fn test_market_type_parse() {
        assert_eq!("FX".parse::<MarketType>().unwrap(), MarketType::Fx);
        assert_eq!("index".parse::<MarketType>().unwrap(), MarketType::Indices);
        assert!("bonds".parse::<MarketType>().is_err());
    }
}
