//! Extractor for labelled plain-text documents.

use std::collections::HashSet;

use serde_json::json;
use tracing::debug;

use crate::error::ExtractionError;
use crate::models::document::{BoundingContext, DocumentRole, RawField};
use crate::models::record::LineItem;

use super::patterns::{column_attribute, labels_for, TABLE_RULE};
use super::{FieldExtractor, Result};

/// Confidence of a value read from a `Label: value` line.
const LABEL_CONFIDENCE: f32 = 0.95;

/// Confidence of a value read from a table cell.
const TABLE_CONFIDENCE: f32 = 0.9;

/// Reads `Label: value` lines and one pipe-separated line-item table.
///
/// ```text
/// Invoice No: 00000003
/// Total: S$1,000.00
///
/// | Description | Qty | Unit Price | Amount |
/// |-------------|-----|------------|--------|
/// | Consulting  | 1   | 1,000.00   | 1,000.00 |
/// ```
#[derive(Debug, Clone)]
pub struct TextFieldExtractor {
    label_confidence: f32,
    table_confidence: f32,
}

impl Default for TextFieldExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl TextFieldExtractor {
    pub fn new() -> Self {
        Self {
            label_confidence: LABEL_CONFIDENCE,
            table_confidence: TABLE_CONFIDENCE,
        }
    }

    /// Set the confidence assigned to labelled values.
    pub fn with_label_confidence(mut self, confidence: f32) -> Self {
        self.label_confidence = confidence;
        self
    }

    /// Set the confidence assigned to table cells.
    pub fn with_table_confidence(mut self, confidence: f32) -> Self {
        self.table_confidence = confidence;
        self
    }

    /// Extract fields from already decoded text.
    pub fn extract_text(&self, role: DocumentRole, text: &str) -> Vec<RawField> {
        let mut out = self.extract_labels(role, text);
        out.extend(self.extract_table(role, text));
        out
    }

    fn extract_labels(&self, role: DocumentRole, text: &str) -> Vec<RawField> {
        let labels = labels_for(role);
        let mut seen: HashSet<&'static str> = HashSet::new();
        let mut out = Vec::new();

        for (line_no, line) in text.lines().enumerate() {
            if line.trim_start().starts_with('|') {
                continue;
            }
            for (pattern, field) in &labels {
                let Some(caps) = pattern.captures(line) else {
                    continue;
                };
                // First occurrence of a field wins; the line is claimed either way.
                if seen.insert(*field) {
                    let context = BoundingContext(Some(json!({ "line": line_no + 1 })));
                    out.push(
                        RawField::new(*field, caps[1].to_string(), self.label_confidence, role)
                            .with_context(context),
                    );
                }
                break;
            }
        }
        out
    }

    fn extract_table(&self, role: DocumentRole, text: &str) -> Vec<RawField> {
        let mut columns: Option<Vec<Option<&'static str>>> = None;
        let mut index = 0;
        let mut out = Vec::new();

        for (line_no, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if !trimmed.contains('|') {
                if columns.is_some() && index > 0 {
                    break;
                }
                continue;
            }
            if TABLE_RULE.is_match(trimmed) {
                continue;
            }

            let cells = split_cells(trimmed);
            if columns.is_none() {
                let mapped: Vec<Option<&'static str>> =
                    cells.iter().map(|c| column_attribute(c)).collect();
                if mapped.iter().flatten().count() >= 2 {
                    debug!("Line-item table header on line {}", line_no + 1);
                    columns = Some(mapped);
                }
                continue;
            }
            let Some(cols) = &columns else {
                continue;
            };

            if cells.iter().all(|c| c.is_empty()) {
                continue;
            }
            for (cell, attribute) in cells.iter().zip(cols.iter()) {
                let Some(attribute) = attribute else {
                    continue;
                };
                if cell.is_empty() {
                    continue;
                }
                let context = BoundingContext(Some(json!({ "line": line_no + 1 })));
                out.push(
                    RawField::new(
                        LineItem::attribute_path(index, attribute),
                        cell.to_string(),
                        self.table_confidence,
                        role,
                    )
                    .with_context(context),
                );
            }
            index += 1;
        }
        out
    }
}

/// Split a table row into trimmed cells, dropping the outer pipes.
fn split_cells(row: &str) -> Vec<&str> {
    let row = row.strip_prefix('|').unwrap_or(row);
    let row = row.strip_suffix('|').unwrap_or(row);
    row.split('|').map(|c| c.trim()).collect()
}

impl FieldExtractor for TextFieldExtractor {
    fn name(&self) -> &'static str {
        "text"
    }

    fn extract(&self, role: DocumentRole, content: &[u8]) -> Result<Vec<RawField>> {
        let text = std::str::from_utf8(content).map_err(|e| ExtractionError::Unreadable {
            role,
            reason: format!("not UTF-8 text: {}", e),
        })?;
        let fields = self.extract_text(role, text);
        if fields.is_empty() {
            return Err(ExtractionError::Format {
                role,
                reason: "no labelled fields or line-item table found".to_string(),
            });
        }
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::fields;

    const INVOICE: &str = "\
TAX INVOICE
Invoice No: 00000003
PO Number: PO-SG-2023-001
Invoice Date: 2023-04-05
Due Date: 2023-05-05
Vendor: Clearwater Pte Ltd
Bill To: Harbour Trading Pte Ltd
Currency: SGD

| Description | Qty | Unit Price | Amount |
|-------------|-----|------------|--------|
| Consulting services | 1 | 1,000.00 | 1,000.00 |

Total: S$1,000.00
";

    fn value<'a>(raw: &'a [RawField], name: &str) -> Option<&'a str> {
        raw.iter().find(|f| f.name() == name).map(|f| f.raw_value())
    }

    #[test]
    fn test_extract_invoice_labels() {
        let raw = TextFieldExtractor::new().extract_text(DocumentRole::Invoice, INVOICE);
        assert_eq!(value(&raw, fields::INVOICE_NUMBER), Some("00000003"));
        assert_eq!(value(&raw, fields::PO_REFERENCE), Some("PO-SG-2023-001"));
        assert_eq!(value(&raw, fields::INVOICE_DATE), Some("2023-04-05"));
        assert_eq!(value(&raw, fields::DUE_DATE), Some("2023-05-05"));
        assert_eq!(value(&raw, fields::PAYEE_NAME), Some("Clearwater Pte Ltd"));
        assert_eq!(value(&raw, fields::PAYER_NAME), Some("Harbour Trading Pte Ltd"));
        assert_eq!(value(&raw, fields::TOTAL_AMOUNT), Some("S$1,000.00"));
        assert_eq!(value(&raw, fields::CURRENCY), Some("SGD"));
    }

    #[test]
    fn test_extract_line_item_table() {
        let raw = TextFieldExtractor::new().extract_text(DocumentRole::Invoice, INVOICE);
        assert_eq!(value(&raw, "line_items[0].description"), Some("Consulting services"));
        assert_eq!(value(&raw, "line_items[0].quantity"), Some("1"));
        assert_eq!(value(&raw, "line_items[0].unit_price"), Some("1,000.00"));
        assert_eq!(value(&raw, "line_items[0].amount"), Some("1,000.00"));
        assert!(value(&raw, "line_items[1].quantity").is_none());

        let qty = raw.iter().find(|f| f.name() == "line_items[0].quantity").unwrap();
        assert_eq!(qty.confidence(), TABLE_CONFIDENCE);
        assert!(!qty.context().is_none());
    }

    #[test]
    fn test_custom_confidences() {
        let raw = TextFieldExtractor::new()
            .with_label_confidence(0.7)
            .with_table_confidence(0.6)
            .extract_text(DocumentRole::Invoice, INVOICE);
        let confidence = |name: &str| raw.iter().find(|f| f.name() == name).map(|f| f.confidence());
        assert_eq!(confidence(fields::TOTAL_AMOUNT), Some(0.7));
        assert_eq!(confidence("line_items[0].quantity"), Some(0.6));
    }

    #[test]
    fn test_first_label_wins() {
        let text = "Total: 100.00\nTotal: 200.00\n";
        let raw = TextFieldExtractor::new().extract_text(DocumentRole::Invoice, text);
        assert_eq!(value(&raw, fields::TOTAL_AMOUNT), Some("100.00"));
        assert_eq!(raw.len(), 1);
    }

    #[test]
    fn test_role_specific_labels() {
        let text = "Total: S$1,000.00\nDate: 1/4/2023\n";
        let raw = TextFieldExtractor::new().extract_text(DocumentRole::PurchaseOrder, text);
        assert_eq!(value(&raw, fields::AUTHORIZED_AMOUNT), Some("S$1,000.00"));
        assert_eq!(value(&raw, fields::PO_DATE), Some("1/4/2023"));
    }

    #[test]
    fn test_unreadable_and_empty_documents() {
        let extractor = TextFieldExtractor::new();
        assert!(matches!(
            extractor.extract(DocumentRole::Invoice, &[0xff, 0xfe, 0x00]),
            Err(ExtractionError::Unreadable { .. })
        ));
        assert!(matches!(
            extractor.extract(DocumentRole::Invoice, b"nothing to see here"),
            Err(ExtractionError::Format { .. })
        ));
    }
}
