//! Deterministic placeholder rates.
//!
//! Used only when every live source and the cache have nothing to offer.
//! Values come from a fixed units-per-USD seed table with a small
//! multiplicative jitter and must always be tagged `Provenance::Mock`.

use crate::error::{RateError, RateResult};
use fxpulse_core::{CurrencyCode, RateTable};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Units of each code per 1 USD.
const UNITS_PER_USD: &[(&str, f64)] = &[
    ("USD", 1.0),
    ("EUR", 0.92),
    ("GBP", 0.79),
    ("JPY", 151.5),
    ("CHF", 0.88),
    ("AUD", 1.52),
    ("CAD", 1.36),
    ("NZD", 1.65),
    ("CNY", 7.23),
    ("HKD", 7.82),
    ("SGD", 1.35),
    ("INR", 83.3),
    ("SEK", 10.6),
    ("NOK", 10.8),
    ("MXN", 16.9),
    ("ZAR", 18.7),
    ("USDT", 1.0),
    ("BTC", 1.0 / 65_000.0),
    ("ETH", 1.0 / 3_200.0),
    ("SOL", 1.0 / 150.0),
    ("BNB", 1.0 / 580.0),
    ("XRP", 1.0 / 0.55),
    ("ADA", 1.0 / 0.45),
    ("DOGE", 1.0 / 0.15),
    ("SPX", 1.0 / 5_200.0),
    ("NDX", 1.0 / 18_200.0),
    ("DJI", 1.0 / 39_000.0),
    ("FTSE", 1.0 / 7_900.0),
    ("DAX", 1.0 / 18_000.0),
    ("N225", 1.0 / 39_500.0),
    ("HSI", 1.0 / 16_700.0),
    ("CAC", 1.0 / 8_100.0),
];

/// Maximum relative jitter applied to every mock rate (0.2%).
pub const MAX_JITTER: f64 = 0.002;

pub struct MockRateGenerator {
    rng: Mutex<StdRng>,
}

impl MockRateGenerator {
    /// Generator with a fixed seed, or an entropy seed when `None`.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: Mutex::new(rng),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(Some(seed))
    }

    fn seed(code: &str) -> Option<f64> {
        UNITS_PER_USD
            .iter()
            .find(|(c, _)| c.eq_ignore_ascii_case(code))
            .map(|(_, units)| *units)
    }

    /// Whether `code` has a seed.
    pub fn supports(code: &CurrencyCode) -> bool {
        Self::seed(code.as_str()).is_some()
    }

    /// Unjittered cross rate `base -> quote`.
    pub fn reference_rate(base: &str, quote: &str) -> Option<f64> {
        Some(Self::seed(quote)? / Self::seed(base)?)
    }

    fn jittered(&self, rate: f64) -> f64 {
        let jitter = self.rng.lock().gen_range(-MAX_JITTER..=MAX_JITTER);
        rate * (1.0 + jitter)
    }

    /// Full mock table for `base`, keyed by lower-case quote.
    pub fn table(&self, base: &CurrencyCode) -> RateResult<RateTable> {
        let base_units =
            Self::seed(base.as_str()).ok_or_else(|| RateError::UnknownBase(base.to_string()))?;
        Ok(UNITS_PER_USD
            .iter()
            .filter(|(code, _)| *code != base.as_str())
            .map(|(code, units)| (code.to_ascii_lowercase(), self.jittered(units / base_units)))
            .collect())
    }

    /// Single mock rate for `base -> quote`.
    pub fn rate(&self, base: &CurrencyCode, quote: &CurrencyCode) -> RateResult<f64> {
        let reference = Self::reference_rate(base.as_str(), quote.as_str()).ok_or_else(|| {
            let missing = if Self::supports(base) { quote } else { base };
            RateError::UnknownBase(missing.to_string())
        })?;
        Ok(self.jittered(reference))
    }
}

impl Default for MockRateGenerator {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxpulse_core::FailureKind;

    fn code(s: &str) -> CurrencyCode {
        CurrencyCode::new(s).unwrap()
    }

    #[test]
    fn test_same_seed_same_table() {
        let a = MockRateGenerator::seeded(7).table(&code("EUR")).unwrap();
        let b = MockRateGenerator::seeded(7).table(&code("EUR")).unwrap();
        assert_eq!(a, b);
        assert!(!a.contains_key("eur"));
    }

    #[test]
    fn test_jitter_is_bounded() {
        let generator = MockRateGenerator::seeded(42);
        let reference = MockRateGenerator::reference_rate("EUR", "USD").unwrap();
        for _ in 0..200 {
            let rate = generator.rate(&code("EUR"), &code("USD")).unwrap();
            assert!((rate / reference - 1.0).abs() <= MAX_JITTER + 1e-12);
        }
    }

    #[test]
    fn test_cross_rate_from_seeds() {
        let reference = MockRateGenerator::reference_rate("EUR", "JPY").unwrap();
        assert!((reference - 151.5 / 0.92).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_base_is_exhausted() {
        let err = MockRateGenerator::seeded(1).table(&code("XYZ")).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Exhausted);
        let err = MockRateGenerator::seeded(1)
            .rate(&code("EUR"), &code("QQQ"))
            .unwrap_err();
        assert!(matches!(err, RateError::UnknownBase(c) if c == "QQQ"));
    }
}
