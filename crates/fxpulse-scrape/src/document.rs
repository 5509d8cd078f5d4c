//! Fetched document wrapper.

use crate::error::{ExtractError, ExtractResult};
use serde_json::Value;

/// A fetched body, tagged by how it should be queried.
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Html(String),
    Json(Value),
    Text(String),
}

impl Document {
    pub fn html(body: impl Into<String>) -> Self {
        Self::Html(body.into())
    }

    /// Parse a JSON body.
    pub fn json(body: &str) -> ExtractResult<Self> {
        serde_json::from_str(body)
            .map(Self::Json)
            .map_err(|e| ExtractError::Malformed(format!("invalid JSON: {e}")))
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self::Text(body.into())
    }

    /// Guess the document type from the body: JSON if it parses as an object or
    /// array, HTML if it looks like markup, plain text otherwise.
    pub fn detect(body: &str) -> Self {
        let trimmed = body.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
                return Self::Json(value);
            }
        }
        if trimmed.starts_with('<') {
            Self::Html(body.to_string())
        } else {
            Self::Text(body.to_string())
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Html(_) => "html",
            Self::Json(_) => "json",
            Self::Text(_) => "text",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect() {
        assert_eq!(Document::detect(r#"{"a":1}"#).kind(), "json");
        assert_eq!(Document::detect("  <html></html>").kind(), "html");
        assert_eq!(Document::detect("{not json").kind(), "text");
        assert_eq!(Document::detect("EURUSD 1.08").kind(), "text");
    }

    #[test]
    fn test_json_malformed() {
        let err = Document::json("{").unwrap_err();
        assert!(matches!(err, ExtractError::Malformed(_)));
    }
}
