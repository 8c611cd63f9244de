//! Extractor for JSON payloads produced by an external OCR service.

use serde::Deserialize;
use serde_json::Value;

use crate::error::ExtractionError;
use crate::models::document::{BoundingContext, DocumentRole, RawField};
use crate::models::record::LineItem;

use super::{FieldExtractor, Result};

/// Confidence used when the payload does not state one.
const DEFAULT_CONFIDENCE: f32 = 1.0;

/// Extraction payload.
///
/// ```json
/// {
///   "document_type": "invoice",
///   "fields": [
///     {"name": "total_amount", "value": "S$1,000.00", "confidence": 0.97,
///      "context": {"page": 1, "bbox": [120, 440, 260, 460]}}
///   ],
///   "line_items": [
///     {"description": "Consulting", "quantity": 1, "amount": "1000.00", "confidence": 0.9}
///   ]
/// }
/// ```
#[derive(Debug, Deserialize)]
struct Payload {
    #[serde(default)]
    document_type: Option<String>,
    #[serde(default)]
    fields: Vec<PayloadField>,
    #[serde(default)]
    line_items: Vec<PayloadLineItem>,
}

#[derive(Debug, Deserialize)]
struct PayloadField {
    name: String,
    value: Value,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    context: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct PayloadLineItem {
    #[serde(default)]
    description: Option<Value>,
    #[serde(default)]
    quantity: Option<Value>,
    #[serde(default)]
    unit_price: Option<Value>,
    #[serde(default)]
    amount: Option<Value>,
    #[serde(default)]
    confidence: Option<f32>,
}

/// Reads `{"fields": [...]}` extraction payloads.
#[derive(Debug, Clone, Default)]
pub struct JsonFieldExtractor;

impl JsonFieldExtractor {
    pub fn new() -> Self {
        Self
    }
}

/// Render a scalar JSON value as the raw string an OCR engine would return.
fn raw_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

impl FieldExtractor for JsonFieldExtractor {
    fn name(&self) -> &'static str {
        "json"
    }

    fn extract(&self, role: DocumentRole, content: &[u8]) -> Result<Vec<RawField>> {
        let payload: Payload = serde_json::from_slice(content)?;

        if let Some(declared) = payload.document_type.as_deref() {
            if declared.parse::<DocumentRole>().ok() != Some(role) {
                return Err(ExtractionError::Format {
                    role,
                    reason: format!("payload declares document type '{}'", declared),
                });
            }
        }

        let mut out = Vec::with_capacity(payload.fields.len());
        for field in &payload.fields {
            let Some(raw) = raw_string(&field.value) else {
                continue;
            };
            let confidence = field.confidence.unwrap_or(DEFAULT_CONFIDENCE);
            out.push(
                RawField::new(field.name.clone(), raw, confidence, role)
                    .with_context(BoundingContext(field.context.clone())),
            );
        }

        for (index, item) in payload.line_items.iter().enumerate() {
            let confidence = item.confidence.unwrap_or(DEFAULT_CONFIDENCE);
            let attributes = [
                ("description", &item.description),
                ("quantity", &item.quantity),
                ("unit_price", &item.unit_price),
                ("amount", &item.amount),
            ];
            for (attribute, value) in attributes {
                if let Some(raw) = value.as_ref().and_then(raw_string) {
                    out.push(RawField::new(
                        LineItem::attribute_path(index, attribute),
                        raw,
                        confidence,
                        role,
                    ));
                }
            }
        }

        Ok(out)
    }
}
