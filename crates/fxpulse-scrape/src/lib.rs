//! Structural extraction with ordered fallback chains.
//!
//! Source pages change layout over time and between regional mirrors. Instead
//! of one brittle selector, callers hand the extractor an ordered chain of
//! [`SelectorSpec`]s; the first one that matches anything wins and its index is
//! reported back for diagnostics.
//!
//! Documents are kept as owned text (`Document`) and parsed inside the
//! synchronous extraction call, so nothing here is held across an `.await`.

pub mod document;
pub mod error;
pub mod extractor;
pub mod selector;

pub use document::Document;
pub use error::{ExtractError, ExtractResult};
pub use extractor::{ExtractedFields, Record, ScrapeExtractor, ScrapePlan};
pub use selector::{FieldRule, FieldSpec, Query, SelectorSpec};
