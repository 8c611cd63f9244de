//! Field extractor adapters.
//!
//! An extractor turns the bytes of one document into [`RawField`] candidates.
//! The pipeline only sees this trait, so the OCR engine or layout that
//! produced the fields does not matter downstream.

mod fixed;
mod json;
pub mod patterns;
mod text;

pub use fixed::FixedFieldExtractor;
pub use json::JsonFieldExtractor;
pub use text::TextFieldExtractor;

use crate::error::ExtractionError;
use crate::models::document::{DocumentRole, RawField};

/// Result type for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// Trait for field extractors.
pub trait FieldExtractor {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Extract raw fields from the content of a document in `role`.
    fn extract(&self, role: DocumentRole, content: &[u8]) -> Result<Vec<RawField>>;
}

/// Picks [`JsonFieldExtractor`] for JSON payloads and
/// [`TextFieldExtractor`] for everything else.
#[derive(Debug, Default)]
pub struct AutoFieldExtractor {
    json: JsonFieldExtractor,
    text: TextFieldExtractor,
}

impl AutoFieldExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    fn looks_like_json(content: &[u8]) -> bool {
        content
            .iter()
            .find(|b| !b.is_ascii_whitespace())
            .is_some_and(|b| *b == b'{')
    }
}

impl FieldExtractor for AutoFieldExtractor {
    fn name(&self) -> &'static str {
        "auto"
    }

    fn extract(&self, role: DocumentRole, content: &[u8]) -> Result<Vec<RawField>> {
        if Self::looks_like_json(content) {
            self.json.extract(role, content)
        } else {
            self.text.extract(role, content)
        }
    }
}
