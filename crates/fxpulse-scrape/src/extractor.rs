//! Chain evaluation over parsed documents.

use crate::document::Document;
use crate::error::{ExtractError, ExtractResult};
use crate::selector::{FieldRule, Query, SelectorSpec};
use parking_lot::Mutex;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, trace, warn};

/// Field name -> extracted value for one matched node.
pub type Record = BTreeMap<String, String>;

/// Field used when a spec declares no fields.
pub const TEXT_FIELD: &str = "text";

/// Result of a successful chain evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFields {
    /// Name of the spec that matched.
    pub matched_spec: String,
    /// Position of that spec in its chain.
    pub spec_index: usize,
    pub records: Vec<Record>,
}

impl ExtractedFields {
    /// `field` of the first record carrying it.
    pub fn first(&self, field: &str) -> Option<&str> {
        self.records
            .iter()
            .find_map(|r| r.get(field))
            .map(String::as_str)
    }

    /// Every value of `field`, in document order.
    pub fn values<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.records
            .iter()
            .filter_map(move |r| r.get(field))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Two-stage chain: the first matching container scopes the item chain.
///
/// An empty container chain runs the item chain over the whole document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapePlan {
    #[serde(default)]
    pub containers: Vec<SelectorSpec>,
    pub items: Vec<SelectorSpec>,
}

impl ScrapePlan {
    pub fn new(items: Vec<SelectorSpec>) -> Self {
        Self {
            containers: Vec::new(),
            items,
        }
    }

    #[must_use]
    pub fn with_containers(mut self, containers: Vec<SelectorSpec>) -> Self {
        self.containers = containers;
        self
    }
}

/// Evaluates selector chains. Compiled selectors and patterns are cached by
/// their source text, so one extractor can be shared across sources.
#[derive(Default)]
pub struct ScrapeExtractor {
    selectors: Mutex<HashMap<String, Selector>>,
    patterns: Mutex<HashMap<String, Regex>>,
}

impl ScrapeExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `chain` over `doc`, stopping at the first spec that yields records.
    pub fn extract(&self, doc: &Document, chain: &[SelectorSpec]) -> ExtractResult<ExtractedFields> {
        match doc {
            Document::Html(body) => {
                let html = Html::parse_document(body);
                let root = [html.root_element()];
                self.run_chain(chain, |spec| self.html_matches(spec, &root))
            }
            Document::Json(value) => self.run_chain(chain, |spec| self.json_matches(spec, &[value])),
            Document::Text(text) => self.run_chain(chain, |spec| self.text_matches(spec, text)),
        }
    }

    /// Run a container chain, then the item chain inside every element matched
    /// by the first container spec that matches.
    pub fn extract_plan(&self, doc: &Document, plan: &ScrapePlan) -> ExtractResult<ExtractedFields> {
        if plan.containers.is_empty() {
            return self.extract(doc, &plan.items);
        }

        let mut tried = Vec::new();
        let mut invalid = Vec::new();
        match doc {
            Document::Html(body) => {
                let html = Html::parse_document(body);
                for spec in &plan.containers {
                    let Query::Css(query) = &spec.query else {
                        tried.push(spec.name.clone());
                        continue;
                    };
                    let selector = match self.selector(&spec.name, query) {
                        Ok(selector) => selector,
                        Err(err) => {
                            warn!(container = %spec.name, error = %err, "Skipping unusable container spec");
                            tried.push(spec.name.clone());
                            invalid.push(err);
                            continue;
                        }
                    };
                    let scopes: Vec<ElementRef<'_>> = html.root_element().select(&selector).collect();
                    if scopes.is_empty() {
                        tried.push(spec.name.clone());
                        continue;
                    }
                    debug!(container = %spec.name, count = scopes.len(), "Container matched");
                    return self
                        .run_chain(&plan.items, |item| self.html_matches(item, &scopes))
                        .map_err(|e| with_container(e, &spec.name));
                }
            }
            Document::Json(value) => {
                for spec in &plan.containers {
                    let Query::JsonPointer(pointer) = &spec.query else {
                        tried.push(spec.name.clone());
                        continue;
                    };
                    if let Err(err) = check_pointer(&spec.name, pointer) {
                        warn!(container = %spec.name, error = %err, "Skipping unusable container spec");
                        tried.push(spec.name.clone());
                        invalid.push(err);
                        continue;
                    }
                    match value.pointer(pointer) {
                        Some(scope) if !scope.is_null() => {
                            debug!(container = %spec.name, "Container matched");
                            return self
                                .run_chain(&plan.items, |item| self.json_matches(item, &[scope]))
                                .map_err(|e| with_container(e, &spec.name));
                        }
                        _ => tried.push(spec.name.clone()),
                    }
                }
            }
            Document::Text(_) => return self.extract(doc, &plan.items),
        }
        exhausted(tried, invalid, plan.containers.len())
    }

    fn run_chain<F>(&self, chain: &[SelectorSpec], mut eval: F) -> ExtractResult<ExtractedFields>
    where
        F: FnMut(&SelectorSpec) -> ExtractResult<Option<Vec<Record>>>,
    {
        let mut tried = Vec::with_capacity(chain.len());
        let mut invalid = Vec::new();
        for (index, spec) in chain.iter().enumerate() {
            let outcome = match eval(spec) {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(spec = %spec.name, error = %err, "Skipping unusable selector spec");
                    tried.push(spec.name.clone());
                    invalid.push(err);
                    continue;
                }
            };
            match outcome {
                Some(records) if !records.is_empty() => {
                    debug!(spec = %spec.name, index, records = records.len(), "Selector matched");
                    return Ok(ExtractedFields {
                        matched_spec: spec.name.clone(),
                        spec_index: index,
                        records,
                    });
                }
                Some(_) => trace!(spec = %spec.name, "Selector matched nothing"),
                None => trace!(spec = %spec.name, "Query does not apply to this document"),
            }
            tried.push(spec.name.clone());
        }
        exhausted(tried, invalid, chain.len())
    }

    /// Apply every field chain of `spec`. `None` when a required field is
    /// missing or nothing was extracted.
    fn build_record<F>(
        &self,
        spec: &SelectorSpec,
        fallback_text: Option<String>,
        mut apply: F,
    ) -> ExtractResult<Option<Record>>
    where
        F: FnMut(&FieldRule) -> ExtractResult<Option<String>>,
    {
        let mut record = Record::new();
        if spec.fields.is_empty() {
            if let Some(text) = fallback_text.filter(|t| !t.is_empty()) {
                record.insert(TEXT_FIELD.to_string(), text);
            }
            return Ok((!record.is_empty()).then_some(record));
        }

        for field in &spec.fields {
            let mut value = None;
            for rule in &field.rules {
                value = apply(rule)?.filter(|v| !v.is_empty());
                if value.is_some() {
                    break;
                }
            }
            match value {
                Some(v) => {
                    record.insert(field.name.clone(), v);
                }
                None if field.required => return Ok(None),
                None => {}
            }
        }
        Ok((!record.is_empty()).then_some(record))
    }

    // =========================================================================
    // HTML
    // =========================================================================

    fn html_matches(
        &self,
        spec: &SelectorSpec,
        scopes: &[ElementRef<'_>],
    ) -> ExtractResult<Option<Vec<Record>>> {
        let Query::Css(query) = &spec.query else {
            return Ok(None);
        };
        let selector = self.selector(&spec.name, query)?;
        let mut records = Vec::new();
        for scope in scopes {
            for element in scope.select(&selector) {
                let record = self.build_record(spec, Some(element_text(element)), |rule| {
                    self.html_rule(spec, element, rule)
                })?;
                records.extend(record);
            }
        }
        Ok(Some(records))
    }

    fn html_rule(
        &self,
        spec: &SelectorSpec,
        element: ElementRef<'_>,
        rule: &FieldRule,
    ) -> ExtractResult<Option<String>> {
        Ok(match rule {
            FieldRule::Text => Some(element_text(element)),
            FieldRule::Attr(attr) => element.value().attr(attr).map(|v| v.trim().to_string()),
            FieldRule::ChildText(query) => {
                let selector = self.selector(&spec.name, query)?;
                element
                    .select(&selector)
                    .map(element_text)
                    .find(|t| !t.is_empty())
            }
            FieldRule::ChildAttr { selector, attr } => {
                let selector = self.selector(&spec.name, selector)?;
                element
                    .select(&selector)
                    .find_map(|child| child.value().attr(attr))
                    .map(|v| v.trim().to_string())
            }
            FieldRule::Capture { pattern, group } => {
                self.capture(&spec.name, pattern, *group, &element_text(element))?
            }
            FieldRule::ChildCapture {
                selector,
                pattern,
                group,
            } => {
                let selector = self.selector(&spec.name, selector)?;
                match element.select(&selector).next() {
                    Some(child) => self.capture(&spec.name, pattern, *group, &element_text(child))?,
                    None => None,
                }
            }
        })
    }

    // =========================================================================
    // JSON
    // =========================================================================

    fn json_matches(&self, spec: &SelectorSpec, scopes: &[&Value]) -> ExtractResult<Option<Vec<Record>>> {
        let Query::JsonPointer(pointer) = &spec.query else {
            return Ok(None);
        };
        check_pointer(&spec.name, pointer)?;
        let mut records = Vec::new();
        for scope in scopes {
            let nodes: Vec<&Value> = match scope.pointer(pointer) {
                Some(Value::Array(items)) => items.iter().collect(),
                Some(Value::Null) | None => Vec::new(),
                Some(node) => vec![node],
            };
            for node in nodes {
                let fallback = scalar(node).or_else(|| Some(node.to_string()));
                let record =
                    self.build_record(spec, fallback, |rule| self.json_rule(spec, node, rule))?;
                records.extend(record);
            }
        }
        Ok(Some(records))
    }

    fn json_rule(&self, spec: &SelectorSpec, node: &Value, rule: &FieldRule) -> ExtractResult<Option<String>> {
        Ok(match rule {
            FieldRule::Text => scalar(node),
            FieldRule::Attr(key) => node.get(key.as_str()).and_then(scalar),
            FieldRule::ChildText(pointer) => {
                check_pointer(&spec.name, pointer)?;
                node.pointer(pointer).and_then(scalar)
            }
            FieldRule::ChildAttr { selector, attr } => {
                check_pointer(&spec.name, selector)?;
                node.pointer(selector)
                    .and_then(|child| child.get(attr.as_str()))
                    .and_then(scalar)
            }
            FieldRule::Capture { pattern, group } => match scalar(node) {
                Some(text) => self.capture(&spec.name, pattern, *group, &text)?,
                None => None,
            },
            FieldRule::ChildCapture {
                selector,
                pattern,
                group,
            } => {
                check_pointer(&spec.name, selector)?;
                match node.pointer(selector).and_then(scalar) {
                    Some(text) => self.capture(&spec.name, pattern, *group, &text)?,
                    None => None,
                }
            }
        })
    }

    // =========================================================================
    // Text
    // =========================================================================

    fn text_matches(&self, spec: &SelectorSpec, text: &str) -> ExtractResult<Option<Vec<Record>>> {
        let Query::Pattern(pattern) = &spec.query else {
            return Ok(None);
        };
        let regex = self.regex(&spec.name, pattern)?;
        let mut records = Vec::new();
        for caps in regex.captures_iter(text) {
            let whole = caps.get(0).map(|m| m.as_str().trim().to_string());
            let record = self.build_record(spec, whole.clone(), |rule| {
                Ok(match rule {
                    FieldRule::Text => whole.clone(),
                    FieldRule::Attr(name) => caps.name(name).map(|m| m.as_str().trim().to_string()),
                    FieldRule::ChildText(_)
                    | FieldRule::ChildAttr { .. }
                    | FieldRule::ChildCapture { .. } => None,
                    FieldRule::Capture { pattern, group } => match &whole {
                        Some(text) => self.capture(&spec.name, pattern, *group, text)?,
                        None => None,
                    },
                })
            })?;
            records.extend(record);
        }
        Ok(Some(records))
    }

    // =========================================================================
    // Compiled caches
    // =========================================================================

    fn selector(&self, spec: &str, query: &str) -> ExtractResult<Selector> {
        if let Some(selector) = self.selectors.lock().get(query) {
            return Ok(selector.clone());
        }
        let selector = Selector::parse(query).map_err(|e| ExtractError::InvalidSelector {
            spec: spec.to_string(),
            reason: format!("{query}: {e}"),
        })?;
        self.selectors
            .lock()
            .insert(query.to_string(), selector.clone());
        Ok(selector)
    }

    fn regex(&self, spec: &str, pattern: &str) -> ExtractResult<Regex> {
        if let Some(regex) = self.patterns.lock().get(pattern) {
            return Ok(regex.clone());
        }
        let regex = Regex::new(pattern).map_err(|e| ExtractError::InvalidSelector {
            spec: spec.to_string(),
            reason: e.to_string(),
        })?;
        self.patterns.lock().insert(pattern.to_string(), regex.clone());
        Ok(regex)
    }

    fn capture(&self, spec: &str, pattern: &str, group: usize, haystack: &str) -> ExtractResult<Option<String>> {
        let regex = self.regex(spec, pattern)?;
        Ok(regex
            .captures(haystack)
            .and_then(|caps| caps.get(group))
            .map(|m| m.as_str().trim().to_string()))
    }
}

/// Whitespace-normalized text content of an element.
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn check_pointer(spec: &str, pointer: &str) -> ExtractResult<()> {
    if pointer.is_empty() || pointer.starts_with('/') {
        Ok(())
    } else {
        Err(ExtractError::InvalidSelector {
            spec: spec.to_string(),
            reason: format!("JSON pointer must start with '/': {pointer}"),
        })
    }
}

/// Error for a chain that produced nothing. A chain made up only of unusable
/// specs reports the last one; anything else is a plain no-match.
fn exhausted(
    tried: Vec<String>,
    mut invalid: Vec<ExtractError>,
    len: usize,
) -> ExtractResult<ExtractedFields> {
    match invalid.pop() {
        Some(err) if invalid.len() + 1 == len => Err(err),
        _ => Err(ExtractError::NoMatch { tried }),
    }
}

fn with_container(err: ExtractError, container: &str) -> ExtractError {
    match err {
        ExtractError::NoMatch { tried } => ExtractError::NoMatch {
            tried: tried
                .into_iter()
                .map(|item| format!("{container} > {item}"))
                .collect(),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::FieldSpec;

    const NEWS_PAGE: &str = r#"
        <html><body>
          <div id="quote-news">
            <ul>
              <li class="stream-item">
                <h3><a href="https://news.test/a">ECB holds rates</a></h3>
                <div class="publishing">Reuters • 3 hours ago</div>
                <p>Policy unchanged.</p>
              </li>
              <li class="stream-item">
                <h3><a href="https://news.test/b">Dollar slips</a></h3>
                <div class="publishing">Bloomberg • yesterday</div>
              </li>
              <li class="stream-item ad"><span>Sponsored</span></li>
            </ul>
          </div>
          <div id="other"><li class="stream-item"><h3>Unrelated</h3></li></div>
        </body></html>
    "#;

    fn item_spec(name: &str, query: &str) -> SelectorSpec {
        SelectorSpec::css(name, query)
            .field(FieldSpec::new("title").child_text("h3").required())
            .field(FieldSpec::new("link").child_attr("a", "href"))
            .field(FieldSpec::new("source").child_capture("div.publishing", r"^(.*?)\s*•", 1))
            .field(FieldSpec::new("time").child_capture("div.publishing", r"•\s*(.+)$", 1))
            .field(FieldSpec::new("summary").child_text("p"))
    }

    #[test]
    fn test_first_matching_spec_wins() {
        let extractor = ScrapeExtractor::new();
        let chain = vec![
            item_spec("new-layout", "section.news-card"),
            item_spec("stream", "li.stream-item"),
            item_spec("fallback", "li"),
        ];
        let doc = Document::html(NEWS_PAGE);
        let out = extractor.extract(&doc, &chain).unwrap();

        assert_eq!(out.matched_spec, "stream");
        assert_eq!(out.spec_index, 1);
        // The sponsored item has no title and is dropped.
        assert_eq!(out.len(), 3);
        assert_eq!(out.first("link"), Some("https://news.test/a"));
        assert_eq!(out.first("source"), Some("Reuters"));
        assert_eq!(out.records[1].get("time").map(String::as_str), Some("yesterday"));
        assert_eq!(out.records[0].get("summary").map(String::as_str), Some("Policy unchanged."));
        assert!(!out.records[1].contains_key("summary"));
    }

    #[test]
    fn test_field_rule_chain_falls_through() {
        let extractor = ScrapeExtractor::new();
        let spec = SelectorSpec::css("stream", "li.stream-item").field(
            FieldSpec::new("source")
                .child_text("span.provider")
                .capture(r"(\w+) •", 1)
                .required(),
        );
        let out = extractor.extract(&Document::html(NEWS_PAGE), &[spec]).unwrap();
        let sources: Vec<_> = out.values("source").collect();
        assert_eq!(sources, vec!["Reuters", "Bloomberg"]);
    }

    #[test]
    fn test_no_match_lists_tried_specs() {
        let extractor = ScrapeExtractor::new();
        let chain = vec![item_spec("a", "article"), item_spec("b", "table tr")];
        let err = extractor.extract(&Document::html(NEWS_PAGE), &chain).unwrap_err();
        assert_eq!(
            err,
            ExtractError::NoMatch {
                tried: vec!["a".to_string(), "b".to_string()]
            }
        );
        assert!(err.is_no_match());
    }

    #[test]
    fn test_invalid_selector_names_spec() {
        let extractor = ScrapeExtractor::new();
        let chain = vec![SelectorSpec::css("broken", "li[[")];
        let err = extractor.extract(&Document::html(NEWS_PAGE), &chain).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidSelector { ref spec, .. } if spec == "broken"));
    }

    #[test]
    fn test_malformed_spec_advances_chain() {
        let extractor = ScrapeExtractor::new();
        let doc = Document::html("<ul><li>x</li></ul>");
        let chain = vec![
            SelectorSpec::css("broken", "li[["),
            SelectorSpec::css("ok", "li").field(FieldSpec::new("title").text()),
        ];
        let out = extractor.extract(&doc, &chain).unwrap();
        assert_eq!(out.matched_spec, "ok");
        assert_eq!(out.spec_index, 1);
        assert_eq!(out.first("title"), Some("x"));

        // Malformed plus unmatched is an ordinary miss
        let chain = vec![
            SelectorSpec::css("broken", "li[["),
            SelectorSpec::css("bad-child", "li").field(FieldSpec::new("title").child_text("a[[")),
            SelectorSpec::css("absent", "table"),
        ];
        let err = extractor.extract(&doc, &chain).unwrap_err();
        assert_eq!(
            err,
            ExtractError::NoMatch {
                tried: vec!["broken".to_string(), "bad-child".to_string(), "absent".to_string()]
            }
        );
    }

    #[test]
    fn test_malformed_container_advances_plan() {
        let extractor = ScrapeExtractor::new();
        let plan = ScrapePlan::new(vec![item_spec("stream", "li.stream-item")]).with_containers(vec![
            SelectorSpec::css("broken", "div[["),
            SelectorSpec::css("quote-news", "#quote-news"),
        ]);
        let out = extractor.extract_plan(&Document::html(NEWS_PAGE), &plan).unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_plan_scopes_items_to_container() {
        let extractor = ScrapeExtractor::new();
        let plan = ScrapePlan::new(vec![item_spec("stream", "li.stream-item")]).with_containers(vec![
            SelectorSpec::css("missing", "#news-v2"),
            SelectorSpec::css("quote-news", "#quote-news"),
        ]);
        let out = extractor.extract_plan(&Document::html(NEWS_PAGE), &plan).unwrap();
        let titles: Vec<_> = out.values("title").collect();
        assert_eq!(titles, vec!["ECB holds rates", "Dollar slips"]);
    }

    #[test]
    fn test_plan_no_container() {
        let extractor = ScrapeExtractor::new();
        let plan = ScrapePlan::new(vec![item_spec("stream", "li")])
            .with_containers(vec![SelectorSpec::css("missing", "#nope")]);
        let err = extractor.extract_plan(&Document::html(NEWS_PAGE), &plan).unwrap_err();
        assert_eq!(err.kind(), fxpulse_core::FailureKind::NoMatch);
    }

    #[test]
    fn test_json_pointer_chain() {
        let extractor = ScrapeExtractor::new();
        let doc = Document::json(
            r#"{"data": {"events": [
                {"title": "CPI", "meta": {"time": "2025-03-12T13:30:00Z"}},
                {"title": "", "meta": {}},
                {"title": "NFP", "meta": {"time": "2025-03-07T13:30:00Z"}}
            ]}}"#,
        )
        .unwrap();
        let chain = vec![
            SelectorSpec::json("v1", "/events"),
            SelectorSpec::json("v2", "/data/events")
                .field(FieldSpec::new("title").attr("title").required())
                .field(FieldSpec::new("time").child_text("/meta/time")),
        ];
        let out = extractor.extract(&doc, &chain).unwrap();
        assert_eq!(out.matched_spec, "v2");
        assert_eq!(out.len(), 2);
        assert_eq!(out.records[1].get("time").map(String::as_str), Some("2025-03-07T13:30:00Z"));
    }

    #[test]
    fn test_text_pattern_named_groups() {
        let extractor = ScrapeExtractor::new();
        let doc = Document::text("EURUSD 1.0850\nGBPUSD 1.2710\n");
        let spec = SelectorSpec::pattern("quotes", r"(?P<sym>[A-Z]{6}) (?P<px>[0-9.]+)")
            .field(FieldSpec::new("symbol").attr("sym"))
            .field(FieldSpec::new("rate").attr("px"));
        let out = extractor.extract(&doc, &[spec]).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out.records[1].get("rate").map(String::as_str), Some("1.2710"));
    }

    #[test]
    fn test_query_kind_mismatch_is_skipped() {
        let extractor = ScrapeExtractor::new();
        let doc = Document::text("price 1.5");
        let chain = vec![
            SelectorSpec::css("css-on-text", "div"),
            SelectorSpec::pattern("re", r"[0-9.]+"),
        ];
        let out = extractor.extract(&doc, &chain).unwrap();
        assert_eq!(out.spec_index, 1);
        assert_eq!(out.first(TEXT_FIELD), Some("1.5"));
    }
}
