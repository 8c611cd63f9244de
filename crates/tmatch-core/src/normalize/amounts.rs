//! Monetary amount and currency normalization.

use std::str::FromStr;

use regex::Captures;
use rust_decimal::Decimal;

use crate::models::value::{Currency, Money};

use super::patterns::{
    symbol_to_code, COMMA_GROUPED, CURRENCY_CODE, CURRENCY_SYMBOL, DOT_GROUPED, GROUP_SEPARATORS,
    KNOWN_CURRENCY_CODES,
};
use super::text::repair_ocr_digits;
use super::{Parsed, OCR_REPAIR_FACTOR};

/// Parse a monetary amount such as `"S$1,000.00"`, `"USD 8000"` or
/// `"1.234,56 €"` into integer minor units.
///
/// `fallback` is the currency used for a bare `$` or when no currency marker
/// is present. Amounts with more decimals than the currency's minor unit are
/// rounded half-to-even.
pub fn parse_amount(raw: &str, fallback: &Currency, repair: bool) -> Result<Parsed<Money>, String> {
    match parse_amount_exact(raw, fallback) {
        Ok(parsed) => Ok(parsed),
        Err(err) => {
            if repair {
                if let Some(repaired) = repair_ocr_digits(raw) {
                    if let Ok(parsed) = parse_amount_exact(&repaired, fallback) {
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

fn parse_amount_exact(raw: &str, fallback: &Currency) -> Result<Parsed<Money>, String> {
    let text = raw.trim();
    if text.is_empty() {
        return Err("empty value".to_string());
    }

    let (currency, currency_note, rest) = split_currency(text, fallback)?;

    let rest = rest.trim();
    if rest.starts_with('-') || rest.ends_with('-') || (rest.starts_with('(') && rest.ends_with(')')) {
        return Err(format!("negative amount '{}'", text));
    }

    let number = GROUP_SEPARATORS.replace_all(rest, "");
    let value = parse_decimal_amount(&number).ok_or_else(|| format!("not an amount: '{}'", text))?;

    let (money, rounded) = Money::from_decimal(value, currency)
        .ok_or_else(|| format!("amount out of range: '{}'", text))?;

    let mut parsed = Parsed::new(money, 1.0);
    if let Some(note) = currency_note {
        parsed = parsed.note(note);
    }
    if rounded {
        let digits = parsed.value.currency().minor_digits();
        parsed = parsed.note(format!(
            "{} rounded half-to-even to {} decimal place(s)",
            value, digits
        ));
    }
    Ok(parsed)
}

/// Separate currency markers from the numeric part.
///
/// Returns the resolved currency, a note when it was inferred, and the text
/// with all markers removed.
fn split_currency(
    text: &str,
    fallback: &Currency,
) -> Result<(Currency, Option<String>, String), String> {
    let mut codes: Vec<String> = Vec::new();
    let mut bare_dollar = false;

    let without_symbols = CURRENCY_SYMBOL.replace_all(text, |caps: &Captures| {
        match symbol_to_code(&caps[1]) {
            Some(code) => codes.push(code.to_string()),
            None => bare_dollar = true,
        }
        " ".to_string()
    });

    let without_codes = CURRENCY_CODE.replace_all(&without_symbols, |caps: &Captures| {
        let token = caps[1].to_ascii_uppercase();
        if KNOWN_CURRENCY_CODES.contains(&token.as_str()) {
            codes.push(token);
            caps[0].replacen(&caps[1], " ", 1)
        } else {
            caps[0].to_string()
        }
    });

    codes.sort();
    codes.dedup();

    let (currency, note) = match codes.as_slice() {
        [] if bare_dollar => (
            fallback.clone(),
            Some(format!("bare '$' read as {}", fallback)),
        ),
        [] => (
            fallback.clone(),
            Some(format!("no currency marker, assumed {}", fallback)),
        ),
        [code] => (
            Currency::from_code(code).ok_or_else(|| format!("invalid currency code {}", code))?,
            None,
        ),
        many => {
            return Err(format!("conflicting currency markers: {}", many.join(", ")));
        }
    };

    Ok((currency, note, without_codes.into_owned()))
}

/// Parse a bare number with thousands and decimal separators.
///
/// When both `,` and `.` appear, the last one is the decimal separator. A
/// lone `,` is a decimal separator unless it groups thousands (`1,000`);
/// repeated `.` must group thousands (`1.234.567`).
pub fn parse_decimal_amount(s: &str) -> Option<Decimal> {
    let s = s.trim().trim_end_matches('.');
    if !s.chars().any(|c| c.is_ascii_digit())
        || !s.chars().all(|c| c.is_ascii_digit() || c == ',' || c == '.')
    {
        return None;
    }

    let normalized = match (s.rfind(','), s.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => s.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => s.replace(',', ""),
        (Some(_), None) => {
            if COMMA_GROUPED.is_match(s) {
                s.replace(',', "")
            } else if s.matches(',').count() == 1 {
                s.replace(',', ".")
            } else {
                return None;
            }
        }
        (None, Some(_)) => {
            if s.matches('.').count() == 1 {
                s.to_string()
            } else if DOT_GROUPED.is_match(s) {
                s.replace('.', "")
            } else {
                return None;
            }
        }
        (None, None) => s.to_string(),
    };

    Decimal::from_str(&normalized).ok()
}

/// Parse a currency field such as `"S$"`, `"SGD"` or `"$"`.
pub fn parse_currency(raw: &str, fallback: &Currency) -> Result<Parsed<Currency>, String> {
    let text = raw.trim();
    if text.is_empty() {
        return Err("empty value".to_string());
    }
    if let Some(m) = CURRENCY_SYMBOL.find(text) {
        if m.as_str().len() == text.len() {
            return Ok(match symbol_to_code(text) {
                Some(code) => Parsed::new(
                    Currency::from_code(code).ok_or_else(|| format!("invalid currency code {}", code))?,
                    1.0,
                ),
                None => Parsed::new(fallback.clone(), 1.0)
                    .note(format!("bare '$' read as {}", fallback)),
            });
        }
    }
    Currency::from_code(text)
        .map(|c| Parsed::new(c, 1.0))
        .ok_or_else(|| format!("unknown currency '{}'", text))
}
