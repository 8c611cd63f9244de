//! Free text, party name and identifier cleanup.

use super::patterns::CONTROL_CHARS;
use super::Parsed;

/// Remove control characters and collapse whitespace.
pub fn clean_text(raw: &str) -> Result<Parsed<String>, String> {
    let without_control = CONTROL_CHARS.replace_all(raw, " ");
    let cleaned = without_control.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        return Err("empty value".to_string());
    }
    Ok(Parsed::new(cleaned, 1.0))
}

/// Clean an identifier such as an invoice or PO number.
///
/// Strips label punctuation around the value ("#", ":") and collapses
/// whitespace. Case is preserved; comparisons go through [`identifiers_equal`].
pub fn clean_identifier(raw: &str) -> Result<Parsed<String>, String> {
    let text = clean_text(raw)?.value;
    let trimmed = text
        .trim_matches(|c: char| c == '#' || c == ':' || c == ',' || c.is_whitespace())
        .to_string();
    if trimmed.is_empty() {
        return Err("identifier has no characters".to_string());
    }
    Ok(Parsed::new(trimmed, 1.0))
}

/// Compare identifiers ignoring ASCII case, whitespace and a leading `#`.
pub fn identifiers_equal(a: &str, b: &str) -> bool {
    identifier_key(a) == identifier_key(b)
}

/// Comparison key for an identifier.
pub fn identifier_key(s: &str) -> String {
    s.trim_start_matches(|c: char| c == '#' || c.is_whitespace())
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Replace letters commonly misread for digits (`O`→`0`, `l`→`1`, ...).
///
/// Returns `None` when the text contains no digit at all or nothing changed,
/// so words are never turned into numbers.
pub fn repair_ocr_digits(raw: &str) -> Option<String> {
    if !raw.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    let repaired: String = raw
        .chars()
        .map(|c| match c {
            'O' | 'o' => '0',
            'l' | 'I' => '1',
            other => other,
        })
        .collect();
    (repaired != raw).then_some(repaired)
}
