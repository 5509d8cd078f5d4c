//! News source tables per market type.

use fxpulse_core::MarketType;
use fxpulse_scrape::{FieldSpec, ScrapePlan, SelectorSpec};
use serde::{Deserialize, Serialize};

/// Placeholder replaced by the market symbol of the requested pair.
pub const SYMBOL_PLACEHOLDER: &str = "{symbol}";

/// Field names produced by every news plan.
pub mod fields {
    pub const TITLE: &str = "title";
    pub const LINK: &str = "link";
    pub const SOURCE: &str = "source";
    pub const TIME: &str = "time";
    pub const SUMMARY: &str = "summary";
    /// Currency or asset code an event belongs to (market-wide sources).
    pub const CURRENCY: &str = "currency";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceScope {
    /// One page per requested pair, URL built from the pair symbol.
    Pair,
    /// One page for the whole market; items are routed by their currency field.
    Market,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsSource {
    pub name: String,
    pub url: String,
    pub scope: SourceScope,
    pub plan: ScrapePlan,
}

impl NewsSource {
    /// Page URL for `symbol`. Market-scoped URLs have no placeholder.
    pub fn url_for(&self, symbol: &str) -> String {
        self.url.replace(SYMBOL_PLACEHOLDER, symbol)
    }
}

/// Quote-page news list. Shared by the global site and its regional mirror.
fn quote_news_plan() -> ScrapePlan {
    let stream_item = SelectorSpec::css("stream-item", "li.stream-item")
        .field(FieldSpec::new(fields::TITLE).child_text("h3").required())
        .field(FieldSpec::new(fields::LINK).child_attr("a", "href"))
        .field(
            FieldSpec::new(fields::SOURCE)
                .child_text(".provider")
                .child_capture("div.publishing", r"^(.*?)\s*•", 1),
        )
        .field(
            FieldSpec::new(fields::TIME)
                .child_attr("time", "datetime")
                .child_capture("div.publishing", r"•\s*(.+)$", 1),
        )
        .field(FieldSpec::new(fields::SUMMARY).child_text("p"));

    let story_card = SelectorSpec::css("story-card", "section.story-item, div.story-item")
        .field(FieldSpec::new(fields::TITLE).child_text("h3").child_text("h2").required())
        .field(FieldSpec::new(fields::LINK).child_attr("a.subtle-link", "href").child_attr("a", "href"))
        .field(
            FieldSpec::new(fields::SOURCE)
                .child_capture(".publishing", r"^(.*?)\s*•", 1)
                .child_text(".provider"),
        )
        .field(
            FieldSpec::new(fields::TIME)
                .child_capture(".publishing", r"•\s*(.+)$", 1)
                .child_attr("time", "datetime"),
        )
        .field(FieldSpec::new(fields::SUMMARY).child_text("p"));

    let bare_links = SelectorSpec::css("news-links", r#"a[href*="/news/"]"#)
        .field(FieldSpec::new(fields::TITLE).child_text("h3").text().required())
        .field(FieldSpec::new(fields::LINK).attr("href"));

    ScrapePlan::new(vec![stream_item, story_card, bare_links]).with_containers(vec![
        SelectorSpec::css("quote-news", "#quote-news"),
        SelectorSpec::css("news-stream", r#"[data-testid="news-stream"]"#),
        SelectorSpec::css("main", "main"),
        SelectorSpec::css("body", "body"),
    ])
}

fn events_calendar_plan() -> ScrapePlan {
    let event_row = SelectorSpec::css("event-row", "tr.js-event-item, tr[data-event-datetime]")
        .field(FieldSpec::new(fields::TITLE).child_text("td.event").child_text("td.left.event").required())
        .field(FieldSpec::new(fields::LINK).child_attr("td.event a", "href"))
        .field(FieldSpec::new(fields::CURRENCY).child_text("td.flagCur").child_text("td.currency"))
        .field(FieldSpec::new(fields::TIME).attr("data-event-datetime").child_text("td.time"));

    ScrapePlan::new(vec![event_row]).with_containers(vec![
        SelectorSpec::css("calendar-table", "#economicCalendarData"),
        SelectorSpec::css("any-table", "table"),
    ])
}

fn crypto_events_plan() -> ScrapePlan {
    let card = SelectorSpec::css("event-card", "article.card, div.card")
        .field(
            FieldSpec::new(fields::TITLE)
                .child_text(".card__title")
                .child_text("h5")
                .required(),
        )
        .field(FieldSpec::new(fields::LINK).child_attr("a.link-detail", "href").child_attr("a", "href"))
        .field(
            FieldSpec::new(fields::CURRENCY)
                .child_capture(".card__coins", r"\(([A-Za-z0-9]{2,10})\)", 1)
                .child_attr(".card__coins a", "data-symbol"),
        )
        .field(FieldSpec::new(fields::TIME).child_text(".card__date").child_text("time"))
        .field(FieldSpec::new(fields::SUMMARY).child_text(".card__description"));

    ScrapePlan::new(vec![card])
}

/// Built-in sources for `market`.
pub fn default_sources(market: MarketType) -> Vec<NewsSource> {
    let mut sources = vec![
        NewsSource {
            name: "quote-news".to_string(),
            url: "https://finance.yahoo.com/quote/{symbol}/news".to_string(),
            scope: SourceScope::Pair,
            plan: quote_news_plan(),
        },
        NewsSource {
            name: "quote-news-uk".to_string(),
            url: "https://uk.finance.yahoo.com/quote/{symbol}/news".to_string(),
            scope: SourceScope::Pair,
            plan: quote_news_plan(),
        },
    ];
    match market {
        MarketType::Fx => sources.push(NewsSource {
            name: "economic-calendar".to_string(),
            url: "https://www.investing.com/economic-calendar/".to_string(),
            scope: SourceScope::Market,
            plan: events_calendar_plan(),
        }),
        MarketType::Crypto => sources.push(NewsSource {
            name: "crypto-events".to_string(),
            url: "https://coinmarketcal.com/en/".to_string(),
            scope: SourceScope::Market,
            plan: crypto_events_plan(),
        }),
        MarketType::Indices => {}
    }
    sources
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sources_per_market() {
        let names = |m| {
            default_sources(m)
                .into_iter()
                .map(|s| s.name)
                .collect::<Vec<_>>()
        };
        assert_eq!(names(MarketType::Fx), vec!["quote-news", "quote-news-uk", "economic-calendar"]);
        assert_eq!(names(MarketType::Crypto), vec!["quote-news", "quote-news-uk", "crypto-events"]);
        assert_eq!(names(MarketType::Indices), vec!["quote-news", "quote-news-uk"]);
    }

    #[test]
    fn test_mirrors_share_plan() {
        let sources = default_sources(MarketType::Fx);
        assert_eq!(sources[0].plan, sources[1].plan);
        assert_eq!(sources[0].url_for("EURUSD=X"), "https://finance.yahoo.com/quote/EURUSD=X/news");
    }
}
