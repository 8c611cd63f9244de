//! Integer quantity normalization.

use rust_decimal::prelude::ToPrimitive;

use super::amounts::parse_decimal_amount;
use super::patterns::{GROUP_SEPARATORS, QUANTITY};
use super::text::repair_ocr_digits;
use super::{Parsed, OCR_REPAIR_FACTOR};

/// Parse a count of goods such as `"50"`, `"1,000 pcs"` or `"50.00"`.
///
/// Quantities are whole numbers. A value written with zero decimals is
/// accepted with a note; any fractional quantity is rejected.
pub fn parse_quantity(raw: &str, repair: bool) -> Result<Parsed<i64>, String> {
    match parse_quantity_exact(raw) {
        Ok(parsed) => Ok(parsed),
        Err(err) => {
            if repair {
                if let Some(repaired) = repair_ocr_digits(raw) {
                    if let Ok(parsed) = parse_quantity_exact(&repaired) {
                        return Ok(parsed.penalize(
                            OCR_REPAIR_FACTOR,
                            format!("OCR digit repair applied to '{}'", raw.trim()),
                        ));
                    }
                }
            }
            Err(err)
        }
    }
}

fn parse_quantity_exact(raw: &str) -> Result<Parsed<i64>, String> {
    let text = raw.trim();
    if text.is_empty() {
        return Err("empty value".to_string());
    }
    if text.starts_with('-') {
        return Err(format!("negative quantity '{}'", text));
    }

    let caps = QUANTITY
        .captures(text)
        .ok_or_else(|| format!("not a quantity: '{}'", text))?;
    let number = GROUP_SEPARATORS.replace_all(&caps[1], "");
    let value =
        parse_decimal_amount(&number).ok_or_else(|| format!("not a quantity: '{}'", text))?;

    if !value.fract().is_zero() {
        return Err(format!("fractional quantity '{}'", text));
    }
    let quantity = value
        .trunc()
        .to_i64()
        .ok_or_else(|| format!("quantity out of range: '{}'", text))?;

    let mut parsed = Parsed::new(quantity, 1.0);
    if number.contains('.') && value.scale() > 0 {
        parsed = parsed.note(format!("'{}' read as whole quantity {}", text, quantity));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_quantities() {
        assert_eq!(parse_quantity("50", true).unwrap().value, 50);
        assert_eq!(parse_quantity(" 1 ", true).unwrap().value, 1);
        assert_eq!(parse_quantity("1,000 pcs", true).unwrap().value, 1000);
        assert_eq!(parse_quantity("12 units", true).unwrap().value, 12);
    }

    #[test]
    fn test_zero_decimals_accepted_with_note() {
        let parsed = parse_quantity("50.00", true).unwrap();
        assert_eq!(parsed.value, 50);
        assert_eq!(parsed.confidence, 1.0);
        assert!(parsed.note.is_some());
    }

    #[test]
    fn test_fractional_and_negative_rejected() {
        assert!(parse_quantity("2.5", true).is_err());
        assert!(parse_quantity("-3", true).is_err());
        assert!(parse_quantity("fifty", true).is_err());
        assert!(parse_quantity("", true).is_err());
    }

    #[test]
    fn test_ocr_repair() {
        let parsed = parse_quantity("5O", true).unwrap();
        assert_eq!(parsed.value, 50);
        assert_eq!(parsed.confidence, OCR_REPAIR_FACTOR);
        assert!(parse_quantity("5O", false).is_err());
    }
}
