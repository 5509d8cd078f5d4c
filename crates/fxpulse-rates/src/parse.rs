//! Rate payload parsing.

use crate::error::{RateError, RateResult};
use fxpulse_core::RateTable;
use serde_json::Value;

/// Parse `{"<base>": {"<quote>": <rate>, ...}, ...}` into a table keyed by
/// lower-case quote.
///
/// The base key is matched case-insensitively. Non-numeric, non-finite and
/// non-positive entries are skipped. An empty result is `Malformed`.
pub fn parse_rate_table(body: &str, base: &str) -> RateResult<RateTable> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| RateError::Malformed(format!("invalid JSON: {e}")))?;
    let root = value
        .as_object()
        .ok_or_else(|| RateError::Malformed("payload is not an object".to_string()))?;

    let rates = root
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(base))
        .and_then(|(_, v)| v.as_object())
        .ok_or_else(|| RateError::Malformed(format!("no rate object for {base}")))?;

    let table: RateTable = rates
        .iter()
        .filter_map(|(quote, rate)| {
            let rate = rate.as_f64()?;
            (rate.is_finite() && rate > 0.0).then(|| (quote.to_ascii_lowercase(), rate))
        })
        .collect();

    if table.is_empty() {
        return Err(RateError::Malformed(format!("empty rate table for {base}")));
    }
    Ok(table)
}

/// Parse a scraped quote value. Accepts a single number or a
/// `"<low> - <high>"` range, in which case the first value is taken.
/// Thousands separators are ignored.
pub fn parse_range_value(raw: &str) -> Option<f64> {
    let first = raw.split(" - ").next()?.trim();
    let cleaned: String = first.chars().filter(|c| *c != ',').collect();
    let rate: f64 = cleaned.parse().ok()?;
    (rate.is_finite() && rate > 0.0).then_some(rate)
}
