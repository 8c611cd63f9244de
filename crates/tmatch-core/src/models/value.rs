//! Canonical typed values produced by the normalizer.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::document::clamp_confidence;

/// ISO 4217 currency code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    /// Parse a three-letter code. Case-insensitive.
    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim();
        if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
            Some(Self(code.to_ascii_uppercase()))
        } else {
            None
        }
    }

    pub fn code(&self) -> &str {
        &self.0
    }

    /// Number of decimal digits in the currency's minor unit.
    pub fn minor_digits(&self) -> u32 {
        match self.0.as_str() {
            "JPY" | "KRW" | "VND" | "CLP" | "ISK" | "UGX" | "XAF" | "XOF" => 0,
            "BHD" | "IQD" | "JOD" | "KWD" | "LYD" | "OMR" | "TND" => 3,
            _ => 2,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A monetary amount held as integer minor units.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    minor_units: i64,
    currency: Currency,
}

impl Money {
    pub fn from_minor(minor_units: i64, currency: Currency) -> Self {
        Self {
            minor_units,
            currency,
        }
    }

    /// Convert a decimal amount, rounding half-to-even to the currency's
    /// minor-unit precision.
    ///
    /// Returns the money value and whether rounding changed the amount, or
    /// `None` if the amount does not fit in `i64` minor units.
    pub fn from_decimal(amount: Decimal, currency: Currency) -> Option<(Self, bool)> {
        let digits = currency.minor_digits();
        let rounded =
            amount.round_dp_with_strategy(digits, RoundingStrategy::MidpointNearestEven);
        let was_rounded = rounded != amount;
        let scale = Decimal::from(10_i64.checked_pow(digits)?);
        let minor_units = rounded.checked_mul(scale)?.trunc().to_i64()?;
        Some((Self::from_minor(minor_units, currency), was_rounded))
    }

    pub fn minor_units(&self) -> i64 {
        self.minor_units
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    /// Amount in major units as a decimal with the currency's precision.
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.minor_units, self.currency.minor_digits())
    }

    /// `self - other`, or `None` on currency mismatch or overflow.
    pub fn checked_sub(&self, other: &Money) -> Option<Money> {
        if self.currency != other.currency {
            return None;
        }
        self.minor_units
            .checked_sub(other.minor_units)
            .map(|m| Money::from_minor(m, self.currency.clone()))
    }

    /// `self + other`, or `None` on currency mismatch or overflow.
    pub fn checked_add(&self, other: &Money) -> Option<Money> {
        if self.currency != other.currency {
            return None;
        }
        self.minor_units
            .checked_add(other.minor_units)
            .map(|m| Money::from_minor(m, self.currency.clone()))
    }

    /// Plain decimal rendering without the currency code, e.g. `"2000.00"`.
    pub fn amount_string(&self) -> String {
        self.to_decimal().to_string()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.currency, self.to_decimal())
    }
}

/// A normalized value. Each variant is a distinct type so a quantity can never
/// be compared against an amount by accident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Money(Money),
    Quantity(i64),
    Date(NaiveDate),
    Identifier(String),
    PartyName(String),
    /// Free text such as a line-item description.
    Text(String),
    Currency(Currency),
}

impl FieldValue {
    pub fn as_money(&self) -> Option<&Money> {
        match self {
            FieldValue::Money(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_quantity(&self) -> Option<i64> {
        match self {
            FieldValue::Quantity(q) => Some(*q),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_currency(&self) -> Option<&Currency> {
        match self {
            FieldValue::Currency(c) => Some(c),
            _ => None,
        }
    }

    /// String content of name, text and identifier values.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::PartyName(s) | FieldValue::Text(s) | FieldValue::Identifier(s) => Some(s),
            _ => None,
        }
    }

    /// Display form used in extracted data summaries.
    pub fn display(&self) -> String {
        match self {
            FieldValue::Money(m) => m.amount_string(),
            FieldValue::Quantity(q) => q.to_string(),
            FieldValue::Date(d) => d.to_string(),
            FieldValue::Identifier(s) | FieldValue::PartyName(s) | FieldValue::Text(s) => {
                s.clone()
            }
            FieldValue::Currency(c) => c.to_string(),
        }
    }
}

/// A field after normalization.
///
/// `confidence` is the minimum of the extraction confidence and the
/// normalization confidence. A field that failed to parse has no value and
/// confidence 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedField {
    pub name: String,
    pub value: Option<FieldValue>,
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl NormalizedField {
    /// A successfully parsed field.
    pub fn parsed(
        name: impl Into<String>,
        value: FieldValue,
        extraction_confidence: f32,
        normalization_confidence: f32,
    ) -> Self {
        Self {
            name: name.into(),
            value: Some(value),
            confidence: clamp_confidence(extraction_confidence.min(normalization_confidence)),
            note: None,
        }
    }

    /// A field whose raw value could not be parsed.
    pub fn unparseable(name: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            confidence: 0.0,
            note: Some(note.into()),
        }
    }

    pub fn with_note(mut self, note: Option<String>) -> Self {
        self.note = note;
        self
    }

    pub fn is_parsed(&self) -> bool {
        self.value.is_some()
    }

    pub fn below(&self, threshold: f32) -> bool {
        self.confidence < threshold
    }
}
