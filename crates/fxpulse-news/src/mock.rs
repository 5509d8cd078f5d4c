//! Deterministic placeholder news.

use crate::sentiment::{attach_sentiment, SentimentScorer};
use chrono::{DateTime, Duration, Utc};
use fxpulse_core::{NewsItem, Pair, Provenance};
use std::collections::BTreeSet;

/// (title, summary, source, related pairs or codes)
const TEMPLATES: &[(&str, &str, &str, &[&str])] = &[
    (
        "Euro edges higher as ECB signals patience",
        "Policymakers kept rates on hold and pushed back on near-term cuts.",
        "Market Wire",
        &["EUR/USD"],
    ),
    (
        "Dollar index firm after payrolls beat",
        "Stronger hiring data lifted Treasury yields and the greenback.",
        "Market Wire",
        &["USD"],
    ),
    (
        "Sterling steadies ahead of Bank of England decision",
        "Traders trimmed bets on a hike as wage growth cooled.",
        "City Desk",
        &["GBP"],
    ),
    (
        "Cable holds range as UK inflation eases",
        "GBP/USD stayed inside last week's range after the CPI print.",
        "City Desk",
        &["GBP/USD"],
    ),
    (
        "Yen weakens as BoJ keeps yield control unchanged",
        "USD/JPY climbed toward recent highs after the policy meeting.",
        "Asia Markets",
        &["USD/JPY"],
    ),
    (
        "Aussie slips on softer China data",
        "Commodity currencies eased as industrial output missed forecasts.",
        "Asia Markets",
        &["AUD/USD"],
    ),
    (
        "Euro-sterling cross drifts lower",
        "EUR/GBP eased as UK data surprised to the upside.",
        "City Desk",
        &["EUR/GBP"],
    ),
    (
        "Bitcoin consolidates after ETF inflows slow",
        "BTC traded sideways while spot ETF demand cooled.",
        "Crypto Desk",
        &["BTC/USD"],
    ),
    (
        "Ether gains ahead of network upgrade",
        "ETH outperformed as developers confirmed the upgrade timeline.",
        "Crypto Desk",
        &["ETH/USD"],
    ),
    (
        "Solana volumes climb on memecoin activity",
        "On-chain activity pushed SOL to a weekly high.",
        "Crypto Desk",
        &["SOL/USD"],
    ),
    (
        "S&P 500 closes at record on tech strength",
        "Megacap earnings lifted the benchmark index.",
        "Equity Wrap",
        &["SPX/USD"],
    ),
    (
        "Nasdaq 100 extends gains as chipmakers rally",
        "Semiconductor shares led the tech-heavy index higher.",
        "Equity Wrap",
        &["NDX/USD"],
    ),
    (
        "FTSE 100 lifted by miners and energy",
        "Commodity stocks offset weakness in consumer names.",
        "Equity Wrap",
        &["FTSE/GBP"],
    ),
];

/// Spacing between consecutive mock timestamps.
const MOCK_SPACING_MINUTES: i64 = 45;

fn codes_of(tags: &[&str]) -> BTreeSet<String> {
    tags.iter()
        .flat_map(|t| t.split('/'))
        .map(str::to_ascii_uppercase)
        .collect()
}

/// Mock items whose related currencies are all among the requested pairs'
/// currencies. Timestamps step back from `now`; items are newest-first and
/// tagged `Provenance::Mock`.
pub fn mock_news(pairs: &[Pair], now: DateTime<Utc>) -> Vec<NewsItem> {
    let requested: BTreeSet<String> = pairs
        .iter()
        .flat_map(|p| [p.base.to_string(), p.quote.to_string()])
        .collect();

    TEMPLATES
        .iter()
        .filter(|(_, _, _, tags)| codes_of(tags).is_subset(&requested))
        .enumerate()
        .map(|(i, (title, summary, source, tags))| NewsItem {
            title: (*title).to_string(),
            summary: (*summary).to_string(),
            timestamp: now - Duration::minutes(MOCK_SPACING_MINUTES * (i as i64 + 1)),
            source: (*source).to_string(),
            url: None,
            currency_pairs: tags.iter().map(|t| t.to_string()).collect(),
            sentiment: None,
            provenance: Provenance::Mock,
        })
        .collect()
}

/// [`mock_news`] run through `scorer`, as served in place of live news.
pub fn scored_mock_news(
    pairs: &[Pair],
    now: DateTime<Utc>,
    scorer: &dyn SentimentScorer,
) -> Vec<NewsItem> {
    let mut items = mock_news(pairs, now);
    for item in &mut items {
        attach_sentiment(item, scorer);
    }
    items
}
