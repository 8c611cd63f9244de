//! Field normalization.
//!
//! Converts raw extracted strings into typed [`FieldValue`]s and assembles the
//! per-document [`DocumentRecord`]. Values that cannot be parsed are kept as
//! unparseable fields with confidence 0 so they surface as review flags.

pub mod amounts;
pub mod dates;
pub mod patterns;
pub mod quantities;
pub mod text;

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::{Result, TmatchError};
use crate::models::config::NormalizationConfig;
use crate::models::document::{DocumentRole, RawField};
use crate::models::record::{fields, DocumentRecord, LineItem};
use crate::models::value::{Currency, FieldValue, NormalizedField};

use self::patterns::LINE_ITEM_NAME;

/// Confidence factor applied when OCR digit repair was needed to parse a value.
pub const OCR_REPAIR_FACTOR: f32 = 0.9;

/// Confidence factor for numeric dates that are valid in both day/month orders.
pub const AMBIGUOUS_DATE_FACTOR: f32 = 0.8;

/// A successfully parsed value with its normalization confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<T> {
    pub value: T,
    pub confidence: f32,
    pub note: Option<String>,
}

impl<T> Parsed<T> {
    pub fn new(value: T, confidence: f32) -> Self {
        Self {
            value,
            confidence,
            note: None,
        }
    }

    /// Attach a note, appending to any existing one.
    pub fn note(mut self, note: impl Into<String>) -> Self {
        let note = note.into();
        self.note = Some(match self.note.take() {
            Some(existing) => format!("{}; {}", existing, note),
            None => note,
        });
        self
    }

    /// Multiply the confidence by `factor` and record why.
    pub fn penalize(mut self, factor: f32, note: impl Into<String>) -> Self {
        self.confidence *= factor;
        self.note(note)
    }
}

/// The value type a canonical field normalizes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Money,
    Quantity,
    Date,
    Identifier,
    PartyName,
    Currency,
    Text,
}

impl FieldKind {
    /// Kind of a header field by canonical name. Unknown names are text.
    pub fn of_header(name: &str) -> Self {
        match name {
            fields::TOTAL_AMOUNT | fields::AUTHORIZED_AMOUNT => FieldKind::Money,
            fields::TOTAL_QUANTITY | fields::QUANTITY_DELIVERED => FieldKind::Quantity,
            fields::INVOICE_DATE | fields::DUE_DATE | fields::PO_DATE | fields::DELIVERY_DATE => {
                FieldKind::Date
            }
            fields::INVOICE_NUMBER
            | fields::PO_NUMBER
            | fields::PO_REFERENCE
            | fields::DELIVERY_REFERENCE
            | fields::INVOICE_REFERENCE => FieldKind::Identifier,
            fields::PAYEE_NAME
            | fields::PAYER_NAME
            | fields::BUYER_NAME
            | fields::VENDOR_NAME
            | fields::RECIPIENT_NAME => FieldKind::PartyName,
            fields::CURRENCY => FieldKind::Currency,
            _ => FieldKind::Text,
        }
    }

    /// Kind of a line-item attribute, or `None` for unknown attributes.
    pub fn of_line_attribute(attribute: &str) -> Option<Self> {
        match attribute {
            fields::LINE_DESCRIPTION => Some(FieldKind::Text),
            fields::LINE_QUANTITY => Some(FieldKind::Quantity),
            fields::LINE_UNIT_PRICE | fields::LINE_AMOUNT => Some(FieldKind::Money),
            _ => None,
        }
    }
}

/// Where a raw field lands in the record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Slot {
    Header(String),
    Line(usize, &'static str),
}

/// Lowercase a raw field name and join its words with underscores.
fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() || c == '[' || c == ']' || c == '.' {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out.replace("._", ".").replace("_.", ".")
}

/// Map an extractor's header field name to the canonical name for `role`.
pub fn canonical_header_name(role: DocumentRole, raw_name: &str) -> String {
    let name = slug(raw_name);
    let canonical = match (role, name.as_str()) {
        (DocumentRole::Invoice, "invoice_no" | "invoice_id" | "invoice" | "number") => {
            fields::INVOICE_NUMBER
        }
        (DocumentRole::Invoice, "total" | "amount" | "amount_due" | "invoice_total" | "grand_total") => {
            fields::TOTAL_AMOUNT
        }
        (DocumentRole::Invoice, "date" | "issue_date") => fields::INVOICE_DATE,
        (DocumentRole::Invoice, "payment_due" | "due") => fields::DUE_DATE,
        (DocumentRole::Invoice, "payee" | "vendor" | "vendor_name" | "seller" | "supplier") => {
            fields::PAYEE_NAME
        }
        (DocumentRole::Invoice, "payer" | "buyer" | "bill_to" | "customer" | "customer_name") => {
            fields::PAYER_NAME
        }
        (DocumentRole::Invoice, "po_number" | "po_ref" | "po_no" | "purchase_order") => {
            fields::PO_REFERENCE
        }
        (DocumentRole::Invoice, "quantity" | "qty") => fields::TOTAL_QUANTITY,

        (DocumentRole::PurchaseOrder, "po_no" | "po_id" | "number" | "purchase_order_number") => {
            fields::PO_NUMBER
        }
        (
            DocumentRole::PurchaseOrder,
            "total" | "amount" | "total_amount" | "po_amount" | "authorized_total",
        ) => fields::AUTHORIZED_AMOUNT,
        (DocumentRole::PurchaseOrder, "date" | "order_date") => fields::PO_DATE,
        (DocumentRole::PurchaseOrder, "buyer" | "payer" | "payer_name" | "customer") => {
            fields::BUYER_NAME
        }
        (DocumentRole::PurchaseOrder, "vendor" | "supplier" | "seller" | "payee" | "payee_name") => {
            fields::VENDOR_NAME
        }
        (DocumentRole::PurchaseOrder, "quantity" | "qty") => fields::TOTAL_QUANTITY,

        (
            DocumentRole::ProofOfDelivery,
            "delivery_ref" | "delivery_number" | "delivery_no" | "pod_reference" | "do_number",
        ) => fields::DELIVERY_REFERENCE,
        (DocumentRole::ProofOfDelivery, "date" | "received_date" | "delivered_on") => {
            fields::DELIVERY_DATE
        }
        (
            DocumentRole::ProofOfDelivery,
            "quantity" | "qty" | "quantity_received" | "received_quantity" | "total_quantity",
        ) => fields::QUANTITY_DELIVERED,
        (DocumentRole::ProofOfDelivery, "recipient" | "received_by" | "consignee") => {
            fields::RECIPIENT_NAME
        }
        (DocumentRole::ProofOfDelivery, "invoice_number" | "invoice_no") => {
            fields::INVOICE_REFERENCE
        }
        (DocumentRole::ProofOfDelivery, "po_number" | "po_ref" | "po_no") => fields::PO_REFERENCE,

        _ => return name,
    };
    canonical.to_string()
}

/// Map a line-item attribute alias to its canonical attribute.
fn canonical_line_attribute(attribute: &str) -> Option<&'static str> {
    match attribute {
        "description" | "desc" | "item" | "product" | "name" => Some(fields::LINE_DESCRIPTION),
        "quantity" | "qty" | "quantity_received" | "received" => Some(fields::LINE_QUANTITY),
        "unit_price" | "price" | "rate" => Some(fields::LINE_UNIT_PRICE),
        "amount" | "total" | "line_total" => Some(fields::LINE_AMOUNT),
        _ => None,
    }
}

fn slot_for(role: DocumentRole, raw_name: &str) -> Option<Slot> {
    let name = slug(raw_name);
    if let Some(caps) = LINE_ITEM_NAME.captures(&name) {
        let index: usize = caps[1].parse().ok()?;
        return canonical_line_attribute(&caps[2]).map(|attribute| Slot::Line(index, attribute));
    }
    Some(Slot::Header(canonical_header_name(role, raw_name)))
}

/// Field normalizer.
#[derive(Debug, Clone)]
pub struct Normalizer {
    config: NormalizationConfig,
    default_currency: Currency,
}

impl Normalizer {
    /// Create a normalizer; fails if the configured default currency is not
    /// a three-letter code.
    pub fn new(config: &NormalizationConfig) -> Result<Self> {
        let default_currency = Currency::from_code(&config.default_currency).ok_or_else(|| {
            TmatchError::Config(format!(
                "invalid default currency '{}'",
                config.default_currency
            ))
        })?;
        Ok(Self {
            config: config.clone(),
            default_currency,
        })
    }

    pub fn default_currency(&self) -> &Currency {
        &self.default_currency
    }

    /// Normalize a single field by its canonical header name, using the
    /// configured default currency.
    pub fn normalize(&self, raw: &RawField) -> NormalizedField {
        let name = canonical_header_name(raw.source(), raw.name());
        let kind = FieldKind::of_header(&name);
        self.normalize_as(raw, name, kind, &self.default_currency)
    }

    /// Parse `raw` as `kind`. `currency` is used for amounts without a
    /// currency marker.
    pub fn normalize_as(
        &self,
        raw: &RawField,
        name: String,
        kind: FieldKind,
        currency: &Currency,
    ) -> NormalizedField {
        let repair = self.config.repair_ocr_digits;
        let value = raw.raw_value();
        let parsed: std::result::Result<Parsed<FieldValue>, String> = match kind {
            FieldKind::Money => amounts::parse_amount(value, currency, repair)
                .map(|p| map_parsed(p, FieldValue::Money)),
            FieldKind::Quantity => quantities::parse_quantity(value, repair)
                .map(|p| map_parsed(p, FieldValue::Quantity)),
            FieldKind::Date => dates::parse_date(value, self.config.date_order, repair)
                .map(|p| map_parsed(p, FieldValue::Date)),
            FieldKind::Identifier => {
                text::clean_identifier(value).map(|p| map_parsed(p, FieldValue::Identifier))
            }
            FieldKind::PartyName => {
                text::clean_text(value).map(|p| map_parsed(p, FieldValue::PartyName))
            }
            FieldKind::Text => text::clean_text(value).map(|p| map_parsed(p, FieldValue::Text)),
            FieldKind::Currency => amounts::parse_currency(value, currency)
                .map(|p| map_parsed(p, FieldValue::Currency)),
        };

        match parsed {
            Ok(p) => NormalizedField::parsed(name, p.value, raw.confidence(), p.confidence)
                .with_note(p.note),
            Err(reason) => {
                warn!(
                    "Unparseable {} field {}: {}",
                    raw.source(),
                    name,
                    reason
                );
                NormalizedField::unparseable(name, reason)
            }
        }
    }

    /// Normalize every raw field of one document into a record.
    ///
    /// Fields from another document are ignored. When several raw fields
    /// map to the same slot, the one with the highest extraction confidence
    /// is kept. The document's currency field is resolved first and used for
    /// amounts that carry no currency marker.
    pub fn normalize_document(
        &self,
        role: DocumentRole,
        content_hash: &str,
        raw_fields: &[RawField],
    ) -> DocumentRecord {
        let mut slots: BTreeMap<Slot, &RawField> = BTreeMap::new();
        for raw in raw_fields {
            if raw.source() != role {
                warn!(
                    "Ignoring field {} from {} while normalizing {}",
                    raw.name(),
                    raw.source(),
                    role
                );
                continue;
            }
            let Some(slot) = slot_for(role, raw.name()) else {
                debug!("Ignoring unknown line-item attribute {}", raw.name());
                continue;
            };
            let replace = slots
                .get(&slot)
                .is_none_or(|existing| raw.confidence() > existing.confidence());
            if replace {
                slots.insert(slot, raw);
            }
        }

        let mut record = DocumentRecord::new(role, content_hash);

        let currency_slot = Slot::Header(fields::CURRENCY.to_string());
        let document_currency = match slots.get(&currency_slot) {
            Some(raw) => {
                let field = self.normalize_as(
                    raw,
                    fields::CURRENCY.to_string(),
                    FieldKind::Currency,
                    &self.default_currency,
                );
                let currency = field
                    .value
                    .as_ref()
                    .and_then(|v| v.as_currency())
                    .cloned()
                    .unwrap_or_else(|| self.default_currency.clone());
                record.fields.insert(fields::CURRENCY.to_string(), field);
                currency
            }
            None => self.default_currency.clone(),
        };

        let mut lines: BTreeMap<usize, LineItem> = BTreeMap::new();
        for (slot, raw) in &slots {
            match slot {
                Slot::Header(name) if name == fields::CURRENCY => {}
                Slot::Header(name) => {
                    let kind = FieldKind::of_header(name);
                    let field = self.normalize_as(raw, name.clone(), kind, &document_currency);
                    record.fields.insert(name.clone(), field);
                }
                Slot::Line(index, attribute) => {
                    let Some(kind) = FieldKind::of_line_attribute(attribute) else {
                        continue;
                    };
                    let field = self.normalize_as(
                        raw,
                        LineItem::attribute_path(*index, attribute),
                        kind,
                        &document_currency,
                    );
                    let item = lines.entry(*index).or_insert_with(|| LineItem::new(*index));
                    match *attribute {
                        fields::LINE_DESCRIPTION => item.description = Some(field),
                        fields::LINE_QUANTITY => item.quantity = Some(field),
                        fields::LINE_UNIT_PRICE => item.unit_price = Some(field),
                        _ => item.amount = Some(field),
                    }
                }
            }
        }
        record.line_items = lines.into_values().collect();

        debug!(
            "Normalized {}: {} header fields, {} line items",
            role,
            record.fields.len(),
            record.line_items.len()
        );
        record
    }
}

fn map_parsed<T>(parsed: Parsed<T>, wrap: impl FnOnce(T) -> FieldValue) -> Parsed<FieldValue> {
    Parsed {
        value: wrap(parsed.value),
        confidence: parsed.confidence,
        note: parsed.note,
    }
}
