//! Selector specs and field rule chains.

use serde::{Deserialize, Serialize};

/// Structural query selecting the match set of a spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Query {
    /// CSS selector, HTML documents.
    Css(String),
    /// RFC 6901 pointer, JSON documents. Arrays yield one match per element.
    JsonPointer(String),
    /// Regular expression, text documents. One match per occurrence.
    Pattern(String),
}

impl Query {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Css(q) | Self::JsonPointer(q) | Self::Pattern(q) => q,
        }
    }
}

/// How to pull one field value out of a matched node.
///
/// Interpretation depends on the document:
///
/// | Rule | HTML | JSON | Text |
/// |---|---|---|---|
/// | `Text` | element text | scalar value | whole match |
/// | `Attr(a)` | attribute `a` | object key `a` | named group `a` |
/// | `ChildText(s)` | text of first descendant matching CSS `s` | scalar at relative pointer `s` | - |
/// | `ChildAttr` | attribute of first descendant matching | key of object at relative pointer | - |
/// | `Capture` | regex group over element text | regex group over scalar | regex group over match |
/// | `ChildCapture` | regex group over first matching descendant's text | regex group over scalar at relative pointer | - |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRule {
    Text,
    Attr(String),
    ChildText(String),
    ChildAttr { selector: String, attr: String },
    Capture { pattern: String, group: usize },
    ChildCapture {
        selector: String,
        pattern: String,
        group: usize,
    },
}

/// A named field with its own fallback chain of rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub rules: Vec<FieldRule>,
    /// Records missing a required field are dropped.
    #[serde(default)]
    pub required: bool,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
            required: false,
        }
    }

    #[must_use]
    pub fn rule(mut self, rule: FieldRule) -> Self {
        self.rules.push(rule);
        self
    }

    #[must_use]
    pub fn text(self) -> Self {
        self.rule(FieldRule::Text)
    }

    #[must_use]
    pub fn attr(self, attr: impl Into<String>) -> Self {
        self.rule(FieldRule::Attr(attr.into()))
    }

    #[must_use]
    pub fn child_text(self, selector: impl Into<String>) -> Self {
        self.rule(FieldRule::ChildText(selector.into()))
    }

    #[must_use]
    pub fn child_attr(self, selector: impl Into<String>, attr: impl Into<String>) -> Self {
        self.rule(FieldRule::ChildAttr {
            selector: selector.into(),
            attr: attr.into(),
        })
    }

    #[must_use]
    pub fn capture(self, pattern: impl Into<String>, group: usize) -> Self {
        self.rule(FieldRule::Capture {
            pattern: pattern.into(),
            group,
        })
    }

    #[must_use]
    pub fn child_capture(
        self,
        selector: impl Into<String>,
        pattern: impl Into<String>,
        group: usize,
    ) -> Self {
        self.rule(FieldRule::ChildCapture {
            selector: selector.into(),
            pattern: pattern.into(),
            group,
        })
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// One candidate in a selector chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorSpec {
    /// Diagnostic name, reported when this spec wins or all specs fail.
    pub name: String,
    pub query: Query,
    /// Empty means every match yields a single `text` field.
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

impl SelectorSpec {
    pub fn new(name: impl Into<String>, query: Query) -> Self {
        Self {
            name: name.into(),
            query,
            fields: Vec::new(),
        }
    }

    pub fn css(name: impl Into<String>, selector: impl Into<String>) -> Self {
        Self::new(name, Query::Css(selector.into()))
    }

    pub fn json(name: impl Into<String>, pointer: impl Into<String>) -> Self {
        Self::new(name, Query::JsonPointer(pointer.into()))
    }

    pub fn pattern(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(name, Query::Pattern(pattern.into()))
    }

    #[must_use]
    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let spec = SelectorSpec::css("list", "li.item")
            .field(FieldSpec::new("title").child_text("h3").text().required())
            .field(FieldSpec::new("link").child_attr("a", "href"));
        assert_eq!(spec.fields.len(), 2);
        assert!(spec.fields[0].required);
        assert_eq!(spec.fields[0].rules[1], FieldRule::Text);
        assert_eq!(spec.query.as_str(), "li.item");
    }

    #[test]
    fn test_spec_deserializes_from_json() {
        let raw = r#"{
            "name": "calendar",
            "query": {"css": "tr.event"},
            "fields": [{"name": "title", "rules": [{"child_text": "td.name"}], "required": true}]
        }"#;
        let spec: SelectorSpec = serde_json::from_str(raw).unwrap();
        assert_eq!(spec.query, Query::Css("tr.event".to_string()));
        assert_eq!(spec.fields[0].rules[0], FieldRule::ChildText("td.name".to_string()));
    }
}
