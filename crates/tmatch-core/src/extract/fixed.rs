//! Extractor returning fields supplied up front.

use std::collections::HashMap;

use crate::models::document::{DocumentRole, RawField};

use super::{FieldExtractor, Result};

/// Returns pre-extracted fields per role and ignores document content.
///
/// Used when an upstream OCR service already produced the fields, and in
/// tests.
#[derive(Debug, Clone, Default)]
pub struct FixedFieldExtractor {
    fields: HashMap<DocumentRole, Vec<RawField>>,
}

impl FixedFieldExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fields returned for `role`.
    pub fn with_fields(mut self, role: DocumentRole, fields: Vec<RawField>) -> Self {
        self.fields.insert(role, fields);
        self
    }

    /// Add `(name, value)` pairs for `role`, all with the same confidence.
    pub fn with_values(mut self, role: DocumentRole, values: &[(&str, &str)], confidence: f32) -> Self {
        let entry = self.fields.entry(role).or_default();
        entry.extend(
            values
                .iter()
                .map(|(name, value)| RawField::new(*name, *value, confidence, role)),
        );
        self
    }
}

impl FieldExtractor for FixedFieldExtractor {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn extract(&self, role: DocumentRole, _content: &[u8]) -> Result<Vec<RawField>> {
        Ok(self.fields.get(&role).cloned().unwrap_or_default())
    }
}
