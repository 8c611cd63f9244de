//! Document roles and raw extracted fields.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role of a document in the 3-way match.
///
/// The declaration order is the fixed evaluation and hashing order
/// (Invoice, PO, POD) and is what `Ord` compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentRole {
    /// The claim for payment.
    Invoice,
    /// The authorization for goods or services.
    PurchaseOrder,
    /// Evidence that goods or services were received.
    ProofOfDelivery,
}

impl DocumentRole {
    /// All roles in fixed order.
    pub const ALL: [DocumentRole; 3] = [
        DocumentRole::Invoice,
        DocumentRole::PurchaseOrder,
        DocumentRole::ProofOfDelivery,
    ];

    /// Prefix used in field paths, e.g. `invoice.total_amount`.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentRole::Invoice => "invoice",
            DocumentRole::PurchaseOrder => "purchase_order",
            DocumentRole::ProofOfDelivery => "proof_of_delivery",
        }
    }

    /// Build the path of a field on this document.
    pub fn field_path(&self, field: &str) -> String {
        format!("{}.{}", self.as_str(), field)
    }
}

/// A document type name that is not one of the three roles.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown document role '{0}'")]
pub struct UnknownRole(pub String);

/// Accepts common spellings: "po", "pod", "purchase order", ...
impl FromStr for DocumentRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace(['-', ' '], "_");
        match key.as_str() {
            "invoice" | "inv" => Ok(DocumentRole::Invoice),
            "purchase_order" | "po" => Ok(DocumentRole::PurchaseOrder),
            "proof_of_delivery" | "pod" | "delivery" => Ok(DocumentRole::ProofOfDelivery),
            _ => Err(UnknownRole(s.trim().to_string())),
        }
    }
}

impl fmt::Display for DocumentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Spatial or engine-specific context attached by the extractor.
///
/// Carried through untouched; the core never interprets it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoundingContext(pub Option<serde_json::Value>);

impl BoundingContext {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }
}

/// A field candidate as produced by an extractor. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawField {
    name: String,
    raw_value: String,
    confidence: f32,
    source: DocumentRole,
    #[serde(default, skip_serializing_if = "BoundingContext::is_none")]
    context: BoundingContext,
}

impl RawField {
    /// Create a raw field. Confidence is clamped to 0..=1 and NaN becomes 0.
    pub fn new(
        name: impl Into<String>,
        raw_value: impl Into<String>,
        confidence: f32,
        source: DocumentRole,
    ) -> Self {
        Self {
            name: name.into(),
            raw_value: raw_value.into(),
            confidence: clamp_confidence(confidence),
            source,
            context: BoundingContext::none(),
        }
    }

    pub fn with_context(mut self, context: BoundingContext) -> Self {
        self.context = context;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn raw_value(&self) -> &str {
        &self.raw_value
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn source(&self) -> DocumentRole {
        self.source
    }

    pub fn context(&self) -> &BoundingContext {
        &self.context
    }
}

pub(crate) fn clamp_confidence(confidence: f32) -> f32 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}
