//! Normalized per-document records and the three-document bundle.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::document::DocumentRole;
use super::value::{Currency, FieldValue, Money, NormalizedField};

/// Canonical field names.
pub mod fields {
    pub const INVOICE_NUMBER: &str = "invoice_number";
    pub const TOTAL_AMOUNT: &str = "total_amount";
    pub const CURRENCY: &str = "currency";
    pub const INVOICE_DATE: &str = "invoice_date";
    pub const DUE_DATE: &str = "due_date";
    pub const PAYEE_NAME: &str = "payee_name";
    pub const PAYER_NAME: &str = "payer_name";
    pub const PO_REFERENCE: &str = "po_reference";
    pub const TOTAL_QUANTITY: &str = "total_quantity";

    pub const PO_NUMBER: &str = "po_number";
    pub const AUTHORIZED_AMOUNT: &str = "authorized_amount";
    pub const PO_DATE: &str = "po_date";
    pub const BUYER_NAME: &str = "buyer_name";
    pub const VENDOR_NAME: &str = "vendor_name";

    pub const DELIVERY_REFERENCE: &str = "delivery_reference";
    pub const DELIVERY_DATE: &str = "delivery_date";
    pub const QUANTITY_DELIVERED: &str = "quantity_delivered";
    pub const RECIPIENT_NAME: &str = "recipient_name";
    pub const INVOICE_REFERENCE: &str = "invoice_reference";

    pub const LINE_DESCRIPTION: &str = "description";
    pub const LINE_QUANTITY: &str = "quantity";
    pub const LINE_UNIT_PRICE: &str = "unit_price";
    pub const LINE_AMOUNT: &str = "amount";
}

/// Fields each document must carry for the 3-way match.
///
/// A required field that no extractor located is an extraction failure and
/// is flagged for review.
pub fn required_fields(role: DocumentRole) -> &'static [&'static str] {
    match role {
        DocumentRole::Invoice => &[
            fields::INVOICE_NUMBER,
            fields::TOTAL_AMOUNT,
            fields::INVOICE_DATE,
            fields::DUE_DATE,
            fields::PAYEE_NAME,
            fields::PAYER_NAME,
        ],
        DocumentRole::PurchaseOrder => &[
            fields::PO_NUMBER,
            fields::AUTHORIZED_AMOUNT,
            fields::PO_DATE,
        ],
        DocumentRole::ProofOfDelivery => &[fields::DELIVERY_REFERENCE, fields::DELIVERY_DATE],
    }
}

/// One line of an itemized document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Position of the line on the source document.
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<NormalizedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<NormalizedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<NormalizedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<NormalizedField>,
}

impl LineItem {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            description: None,
            quantity: None,
            unit_price: None,
            amount: None,
        }
    }

    /// Relative path of a line-item attribute, e.g. `line_items[0].quantity`.
    pub fn attribute_path(index: usize, attribute: &str) -> String {
        format!("line_items[{}].{}", index, attribute)
    }

    /// Description lowercased with whitespace collapsed, used for pairing.
    pub fn match_key(&self) -> Option<String> {
        let text = self.description.as_ref()?.value.as_ref()?.as_text()?;
        let key = text
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        (!key.is_empty()).then_some(key)
    }

    pub fn quantity_value(&self) -> Option<i64> {
        self.quantity.as_ref()?.value.as_ref()?.as_quantity()
    }

    pub fn unit_price_value(&self) -> Option<&Money> {
        self.unit_price.as_ref()?.value.as_ref()?.as_money()
    }

    pub fn amount_value(&self) -> Option<&Money> {
        self.amount.as_ref()?.value.as_ref()?.as_money()
    }

    pub fn description_text(&self) -> Option<&str> {
        self.description.as_ref()?.value.as_ref()?.as_text()
    }

    /// Attributes present on this line as `(attribute, field)` pairs.
    pub fn attributes(&self) -> impl Iterator<Item = (&'static str, &NormalizedField)> {
        [
            (fields::LINE_DESCRIPTION, self.description.as_ref()),
            (fields::LINE_QUANTITY, self.quantity.as_ref()),
            (fields::LINE_UNIT_PRICE, self.unit_price.as_ref()),
            (fields::LINE_AMOUNT, self.amount.as_ref()),
        ]
        .into_iter()
        .filter_map(|(name, field)| field.map(|f| (name, f)))
    }
}

/// Normalized content of one document. Owned by the verification request
/// that created it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub role: DocumentRole,
    /// Hash of the document's raw bytes.
    pub content_hash: String,
    /// Header fields keyed by canonical name.
    pub fields: BTreeMap<String, NormalizedField>,
    /// Line items ordered by index.
    pub line_items: Vec<LineItem>,
}

impl DocumentRecord {
    pub fn new(role: DocumentRole, content_hash: impl Into<String>) -> Self {
        Self {
            role,
            content_hash: content_hash.into(),
            fields: BTreeMap::new(),
            line_items: Vec::new(),
        }
    }

    /// Full path of a header field, e.g. `purchase_order.po_date`.
    pub fn path(&self, name: &str) -> String {
        self.role.field_path(name)
    }

    /// Full path of a line-item attribute.
    pub fn line_path(&self, index: usize, attribute: &str) -> String {
        self.role.field_path(&LineItem::attribute_path(index, attribute))
    }

    pub fn field(&self, name: &str) -> Option<&NormalizedField> {
        self.fields.get(name)
    }

    pub fn value(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)?.value.as_ref()
    }

    pub fn money(&self, name: &str) -> Option<&Money> {
        self.value(name)?.as_money()
    }

    pub fn quantity(&self, name: &str) -> Option<i64> {
        self.value(name)?.as_quantity()
    }

    pub fn date(&self, name: &str) -> Option<NaiveDate> {
        self.value(name)?.as_date()
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.value(name)?.as_text()
    }

    pub fn currency(&self) -> Option<&Currency> {
        self.value(fields::CURRENCY)?.as_currency()
    }

    pub fn has_line_items(&self) -> bool {
        !self.line_items.is_empty()
    }

    /// Every normalized field on the document with its full path, header
    /// fields first (in name order) then line items (in index order).
    pub fn all_fields(&self) -> Vec<(String, &NormalizedField)> {
        let mut out: Vec<(String, &NormalizedField)> = self
            .fields
            .iter()
            .map(|(name, field)| (self.path(name), field))
            .collect();
        for item in &self.line_items {
            for (attribute, field) in item.attributes() {
                out.push((self.line_path(item.index, attribute), field));
            }
        }
        out
    }

    /// Required fields that are absent from the record.
    pub fn missing_required(&self) -> Vec<&'static str> {
        required_fields(self.role)
            .iter()
            .copied()
            .filter(|name| !self.fields.contains_key(*name))
            .collect()
    }
}

/// Exactly one record per role plus the bundle hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentBundle {
    pub invoice: DocumentRecord,
    pub purchase_order: DocumentRecord,
    pub proof_of_delivery: DocumentRecord,
    pub bundle_hash: String,
}

impl DocumentBundle {
    pub fn get(&self, role: DocumentRole) -> &DocumentRecord {
        match role {
            DocumentRole::Invoice => &self.invoice,
            DocumentRole::PurchaseOrder => &self.purchase_order,
            DocumentRole::ProofOfDelivery => &self.proof_of_delivery,
        }
    }

    /// Records in fixed role order.
    pub fn records(&self) -> [&DocumentRecord; 3] {
        [&self.invoice, &self.purchase_order, &self.proof_of_delivery]
    }
}
