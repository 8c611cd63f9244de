//! Regex patterns used during normalization.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Currency symbols, longest first so "S$" wins over "$"
    pub static ref CURRENCY_SYMBOL: Regex = Regex::new(
        r"(US\$|USD\$|S\$|SG\$|A\$|AU\$|C\$|CA\$|HK\$|NZ\$|R\$|\$|€|£|¥|₹|zł)"
    ).unwrap();

    // Three-letter alphabetic runs, checked against the known code list.
    // Digits may touch the code ("SGD1000").
    pub static ref CURRENCY_CODE: Regex = Regex::new(
        r"(?i)(?:^|[^a-z])([a-z]{3})(?:$|[^a-z])"
    ).unwrap();

    // Digit-group separators found in OCR output: whitespace, NBSP, thin spaces, apostrophes
    pub static ref GROUP_SEPARATORS: Regex = Regex::new(
        r"[\s\u{00a0}\u{2009}\u{202f}']+"
    ).unwrap();

    // Thousands grouping with commas: 1,000 or 12,345,678
    pub static ref COMMA_GROUPED: Regex = Regex::new(
        r"^\d{1,3}(?:,\d{3})+$"
    ).unwrap();

    // Thousands grouping with dots: 1.000 or 12.345.678
    pub static ref DOT_GROUPED: Regex = Regex::new(
        r"^\d{1,3}(?:\.\d{3})+$"
    ).unwrap();

    // Numeric dates: DD/MM/YYYY, MM-DD-YY, DD.MM.YYYY
    pub static ref DATE_NUMERIC: Regex = Regex::new(
        r"^(\d{1,2})[./\-](\d{1,2})[./\-](\d{4}|\d{2})$"
    ).unwrap();

    // Year-first dates: YYYY-MM-DD, YYYY/MM/DD, YYYY.MM.DD
    pub static ref DATE_YMD: Regex = Regex::new(
        r"^(\d{4})[./\-](\d{1,2})[./\-](\d{1,2})$"
    ).unwrap();

    // Ordinal suffixes: "5th", "1st"
    pub static ref ORDINAL_SUFFIX: Regex = Regex::new(
        r"(?i)\b(\d{1,2})(?:st|nd|rd|th)\b"
    ).unwrap();

    // Quantity with an optional trailing unit
    pub static ref QUANTITY: Regex = Regex::new(
        r"(?i)^([0-9][0-9,.]*)\s*(?:units?|pcs?\.?|pieces?|items?|ea\.?|each|box(?:es)?|cartons?|sets?|nos?\.?)?$"
    ).unwrap();

    // Line-item field names: line_items[0].quantity, items[2].description
    pub static ref LINE_ITEM_NAME: Regex = Regex::new(
        r"^(?:line_items?|items?|lines?)\[(\d+)\]\.([a-z_]+)$"
    ).unwrap();

    // Control characters removed from free text
    pub static ref CONTROL_CHARS: Regex = Regex::new(
        r"[\x00-\x1f\x7f-\x9f]"
    ).unwrap();
}

/// ISO 4217 codes accepted when written next to an amount.
pub const KNOWN_CURRENCY_CODES: &[&str] = &[
    "AUD", "BHD", "BRL", "CAD", "CHF", "CNY", "CZK", "DKK", "EUR", "GBP", "HKD", "IDR", "INR",
    "JOD", "JPY", "KRW", "KWD", "MYR", "NOK", "NZD", "OMR", "PHP", "PLN", "SEK", "SGD", "THB",
    "TWD", "USD", "VND", "ZAR",
];

/// Map a currency symbol to its ISO code. A bare `$` has no fixed code.
pub fn symbol_to_code(symbol: &str) -> Option<&'static str> {
    match symbol {
        "US$" | "USD$" => Some("USD"),
        "S$" | "SG$" => Some("SGD"),
        "A$" | "AU$" => Some("AUD"),
        "C$" | "CA$" => Some("CAD"),
        "HK$" => Some("HKD"),
        "NZ$" => Some("NZD"),
        "R$" => Some("BRL"),
        "€" => Some("EUR"),
        "£" => Some("GBP"),
        "¥" => Some("JPY"),
        "₹" => Some("INR"),
        "zł" => Some("PLN"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_symbol_prefers_longest() {
        let m = CURRENCY_SYMBOL.find("S$1,000.00").unwrap();
        assert_eq!(m.as_str(), "S$");
        assert_eq!(symbol_to_code(m.as_str()), Some("SGD"));
        assert_eq!(symbol_to_code("$"), None);
    }

    #[test]
    fn test_line_item_name() {
        let caps = LINE_ITEM_NAME.captures("line_items[3].unit_price").unwrap();
        assert_eq!(&caps[1], "3");
        assert_eq!(&caps[2], "unit_price");
        assert!(LINE_ITEM_NAME.is_match("items[0].qty"));
        assert!(!LINE_ITEM_NAME.is_match("total_amount"));
    }

    #[test]
    fn test_quantity_pattern() {
        assert_eq!(&QUANTITY.captures("50 units").unwrap()[1], "50");
        assert_eq!(&QUANTITY.captures("1,000 pcs").unwrap()[1], "1,000");
        assert!(QUANTITY.captures("fifty").is_none());
    }
}
