//! Publication time parsing.
//!
//! News pages mostly show relative times ("3 hours ago", "yesterday",
//! "last month"). A missing number reads as 1; months are 30 days and years
//! 365. Absolute dates ("Mar 12, 2025", ISO-8601) are accepted as well.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static RELATIVE_AGO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(\d+|an?|one)?\s*(seconds?|secs?|minutes?|mins?|hours?|hrs?|days?|weeks?|months?|years?|yrs?|[smhdwy])\s+ago\b",
    )
    .unwrap()
});

static RELATIVE_LAST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\blast\s+(second|minute|hour|day|week|month|year)\b").unwrap()
});

/// Upper bound on the numeric component, keeping the arithmetic in range.
const MAX_UNITS: i64 = 100_000;

const DATE_FORMATS: &[&str] = &[
    "%b %d, %Y",
    "%B %d, %Y",
    "%d %b %Y",
    "%d %B %Y",
    "%Y-%m-%d",
    "%m/%d/%Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%b %d, %Y %H:%M",
];

fn unit_duration(unit: &str, n: i64) -> Option<Duration> {
    let unit = unit.to_ascii_lowercase();
    let n = n.clamp(0, MAX_UNITS);
    let duration = match unit.as_str() {
        "s" | "sec" | "secs" | "second" | "seconds" => Duration::seconds(n),
        "m" | "min" | "mins" | "minute" | "minutes" => Duration::minutes(n),
        "h" | "hr" | "hrs" | "hour" | "hours" => Duration::hours(n),
        "d" | "day" | "days" => Duration::days(n),
        "w" | "week" | "weeks" => Duration::weeks(n),
        "month" | "months" => Duration::days(30 * n),
        "y" | "yr" | "yrs" | "year" | "years" => Duration::days(365 * n),
        _ => return None,
    };
    Some(duration)
}

fn count(token: Option<&str>) -> i64 {
    match token.map(str::to_ascii_lowercase).as_deref() {
        None | Some("a") | Some("an") | Some("one") => 1,
        Some(digits) => digits.parse().unwrap_or(MAX_UNITS),
    }
}

/// Parse a publication time relative to `now`. `None` when nothing matches.
pub fn parse_published(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();

    if lower.contains("just now") || lower == "now" || lower.contains("moments ago") {
        return Some(now);
    }
    if lower.contains("yesterday") {
        return now.checked_sub_signed(Duration::days(1));
    }
    if lower.contains("today") {
        return Some(now);
    }
    if let Some(caps) = RELATIVE_LAST.captures(trimmed) {
        let offset = unit_duration(caps.get(1)?.as_str(), 1)?;
        return now.checked_sub_signed(offset);
    }
    if let Some(caps) = RELATIVE_AGO.captures(trimmed) {
        let n = count(caps.get(1).map(|m| m.as_str()));
        let offset = unit_duration(caps.get(2)?.as_str(), n)?;
        return now.checked_sub_signed(offset);
    }
    parse_absolute(trimmed)
}

/// Like [`parse_published`], falling back to `now`.
pub fn resolve_published(text: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
    text.and_then(|t| parse_published(t, now)).unwrap_or(now)
}

fn parse_absolute(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_rfc2822(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 20, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_relative_with_number() {
        assert_eq!(parse_published("3 hours ago", now()), Some(now() - Duration::hours(3)));
        assert_eq!(parse_published("2 days ago", now()), Some(now() - Duration::days(2)));
        assert_eq!(parse_published("Reuters • 45 mins ago", now()), Some(now() - Duration::minutes(45)));
        assert_eq!(parse_published("5h ago", now()), Some(now() - Duration::hours(5)));
    }

    #[test]
    fn test_relative_default_one() {
        assert_eq!(parse_published("hours ago", now()), Some(now() - Duration::hours(1)));
        assert_eq!(parse_published("an hour ago", now()), Some(now() - Duration::hours(1)));
        assert_eq!(parse_published("a month ago", now()), Some(now() - Duration::days(30)));
    }

    #[test]
    fn test_named_relative() {
        assert_eq!(parse_published("yesterday", now()), Some(now() - Duration::days(1)));
        assert_eq!(parse_published("Last month", now()), Some(now() - Duration::days(30)));
        assert_eq!(parse_published("last week", now()), Some(now() - Duration::weeks(1)));
        assert_eq!(parse_published("just now", now()), Some(now()));
    }

    #[test]
    fn test_absolute_dates() {
        let march_12 = Utc.with_ymd_and_hms(2025, 3, 12, 0, 0, 0).unwrap();
        assert_eq!(parse_published("Mar 12, 2025", now()), Some(march_12));
        assert_eq!(parse_published("2025-03-12", now()), Some(march_12));
        assert_eq!(
            parse_published("2025-03-12T09:30:00Z", now()),
            Some(Utc.with_ymd_and_hms(2025, 3, 12, 9, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_unparseable_falls_back_to_now() {
        assert_eq!(parse_published("sometime", now()), None);
        assert_eq!(resolve_published(Some("sometime"), now()), now());
        assert_eq!(resolve_published(None, now()), now());
    }
}
