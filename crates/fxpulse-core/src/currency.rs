//! Currency and instrument identifiers.
//!
//! A `Pair` is an ordered (base, quote) tuple. Its canonical string form
//! `BASE/QUOTE` is the key used by every per-pair store in the pipeline.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upper-cased currency or asset code (e.g., "EUR", "BTC", "SPX").
///
/// Rate APIs key their tables by lower-case codes; use [`CurrencyCode::as_lower`]
/// when building URLs or looking up quotes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Parse and normalize a code. Accepts 2-10 ASCII alphanumerics.
    pub fn new(code: impl AsRef<str>) -> Result<Self> {
        let trimmed = code.as_ref().trim();
        let valid = (2..=10).contains(&trimmed.len())
            && trimmed.chars().all(|c| c.is_ascii_alphanumeric());
        if !valid {
            return Err(CoreError::InvalidCurrency(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-case form used by the rate API paths and table keys.
    pub fn as_lower(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CurrencyCode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

/// Ordered (base, quote) instrument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pair {
    pub base: CurrencyCode,
    pub quote: CurrencyCode,
}

impl Pair {
    pub fn new(base: CurrencyCode, quote: CurrencyCode) -> Self {
        Self { base, quote }
    }

    /// Build from raw code strings.
    pub fn parse_codes(base: &str, quote: &str) -> Result<Self> {
        Ok(Self::new(CurrencyCode::new(base)?, CurrencyCode::new(quote)?))
    }

    /// Canonical key (`EUR/USD`).
    pub fn key(&self) -> String {
        format!("{}/{}", self.base, self.quote)
    }

    /// Whether `code` is either leg of the pair.
    pub fn involves(&self, code: &CurrencyCode) -> bool {
        &self.base == code || &self.quote == code
    }

    /// Same instrument in the opposite direction.
    pub fn inverse(&self) -> Self {
        Self::new(self.quote.clone(), self.base.clone())
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl FromStr for Pair {
    type Err = CoreError;

    /// Accepts `EUR/USD`, `EUR-USD`, `EUR_USD` and the six-letter `EURUSD`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some((base, quote)) = s.split_once(['/', '-', '_']) {
            return Self::parse_codes(base, quote)
                .map_err(|_| CoreError::InvalidPair(s.to_string()));
        }
        if s.len() == 6 && s.is_ascii() {
            let (base, quote) = s.split_at(3);
            return Self::parse_codes(base, quote)
                .map_err(|_| CoreError::InvalidPair(s.to_string()));
        }
        Err(CoreError::InvalidPair(s.to_string()))
    }
}

impl TryFrom<String> for Pair {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Pair> for String {
    fn from(pair: Pair) -> Self {
        pair.key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_code_normalizes_case() {
        let code = CurrencyCode::new("eur").unwrap();
        assert_eq!(code.as_str(), "EUR");
        assert_eq!(code.as_lower(), "eur");
    }

    #[test]
    fn test_currency_code_rejects_garbage() {
        assert!(CurrencyCode::new("").is_err());
        assert!(CurrencyCode::new("E").is_err());
        assert!(CurrencyCode::new("EU R").is_err());
        assert!(CurrencyCode::new("€UR").is_err());
    }

    #[test]
    fn test_pair_parse_forms() {
        let expected = Pair::parse_codes("EUR", "USD").unwrap();
        for raw in ["EUR/USD", "eur-usd", "EUR_USD", "EURUSD"] {
            assert_eq!(raw.parse::<Pair>().unwrap(), expected, "{raw}");
        }
        assert!("EURUSDX".parse::<Pair>().is_err());
    }

    #[test]
    fn test_pair_key_and_involves() {
        let pair: Pair = "GBP/USD".parse().unwrap();
        assert_eq!(pair.key(), "GBP/USD");
        assert!(pair.involves(&CurrencyCode::new("usd").unwrap()));
        assert!(!pair.involves(&CurrencyCode::new("EUR").unwrap()));
        assert_eq!(pair.inverse().key(), "USD/GBP");
    }

    #[test]
    fn test_pair_serde_as_string() {
        let pair: Pair = "BTC/USD".parse().unwrap();
        let json = serde_json::to_string(&pair).unwrap();
        assert_eq!(json, r#""BTC/USD""#);
        let back: Pair = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pair);
    }
}
