//! Calendar date normalization.

use chrono::NaiveDate;

use crate::models::config::DateOrder;

use super::patterns::{DATE_NUMERIC, DATE_YMD, ORDINAL_SUFFIX};
use super::text::repair_ocr_digits;
use super::{Parsed, AMBIGUOUS_DATE_FACTOR, OCR_REPAIR_FACTOR};

/// Written-out formats, tried in order.
const NAMED_MONTH_FORMATS: &[&str] = &[
    "%B %d, %Y", // January 5, 2024
    "%B %d %Y",  // January 5 2024
    "%b %d, %Y", // Jan 5, 2024
    "%b %d %Y",  // Jan 5 2024
    "%d %B %Y",  // 5 January 2024
    "%d %b %Y",  // 5 Jan 2024
    "%d-%b-%Y",  // 05-Jan-2024
    "%d %B, %Y", // 5 January, 2024
];

/// Parse a date written in any accepted format.
///
/// Numeric day/month dates are read in `order`. When the other order would
/// also give a valid but different date the result is kept with reduced
/// confidence; a date that is invalid in the configured order is rejected
/// rather than reinterpreted.
pub fn parse_date(raw: &str, order: DateOrder, repair: bool) -> Result<Parsed<NaiveDate>, String> {
    match parse_date_exact(raw, order) {
        Ok(parsed) => Ok(parsed),
        Err(err) => {
            if repair {
                if let Some(repaired) = repair_ocr_digits(raw) {
                    if let Ok(parsed) = parse_numeric_only(&repaired, order) {
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

fn parse_date_exact(raw: &str, order: DateOrder) -> Result<Parsed<NaiveDate>, String> {
    let text = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return Err("empty value".to_string());
    }

    if let Ok(parsed) = parse_numeric_only(&text, order) {
        return Ok(parsed);
    }

    let text = ORDINAL_SUFFIX.replace_all(&text, "$1");
    let mut text = text.replace('.', "");
    if text.contains("Sept") && !text.contains("September") {
        text = text.replace("Sept", "Sep");
    }
    for format in NAMED_MONTH_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&text, format) {
            return Ok(Parsed::new(date, 1.0));
        }
    }

    Err(format!("no accepted date format matches '{}'", raw.trim()))
}

fn parse_numeric_only(text: &str, order: DateOrder) -> Result<Parsed<NaiveDate>, String> {
    let text = text.trim();

    if let Some(caps) = DATE_YMD.captures(text) {
        let year: i32 = caps[1].parse().map_err(|_| "invalid year".to_string())?;
        let month: u32 = caps[2].parse().map_err(|_| "invalid month".to_string())?;
        let day: u32 = caps[3].parse().map_err(|_| "invalid day".to_string())?;
        return NaiveDate::from_ymd_opt(year, month, day)
            .map(|d| Parsed::new(d, 1.0))
            .ok_or_else(|| format!("'{}' is not a calendar date", text));
    }

    let caps = DATE_NUMERIC
        .captures(text)
        .ok_or_else(|| format!("'{}' is not a numeric date", text))?;
    let first: u32 = caps[1].parse().map_err(|_| "invalid day or month".to_string())?;
    let second: u32 = caps[2].parse().map_err(|_| "invalid day or month".to_string())?;
    let year = parse_year(&caps[3]);

    let (day, month) = match order {
        DateOrder::DayFirst => (first, second),
        DateOrder::MonthFirst => (second, first),
    };
    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        format!("'{}' is not a valid {} date", text, order_name(order))
    })?;

    let mut parsed = Parsed::new(date, 1.0);
    if caps[3].len() == 2 {
        parsed = parsed.note(format!("two-digit year read as {}", year));
    }
    if let Some(alternative) = NaiveDate::from_ymd_opt(year, day, month) {
        if alternative != date {
            parsed = parsed.penalize(
                AMBIGUOUS_DATE_FACTOR,
                format!(
                    "ambiguous numeric date '{}' read {} as {}",
                    text,
                    order_name(order),
                    date
                ),
            );
        }
    }
    Ok(parsed)
}

fn parse_year(s: &str) -> i32 {
    let year: i32 = s.parse().unwrap_or(0);
    if year < 100 {
        // Two-digit year: assume 2000s for 00-50, 1900s for 51-99
        if year <= 50 {
            2000 + year
        } else {
            1900 + year
        }
    } else {
        year
    }
}

fn order_name(order: DateOrder) -> &'static str {
    match order {
        DateOrder::DayFirst => "day-first",
        DateOrder::MonthFirst => "month-first",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn parse(raw: &str) -> Parsed<NaiveDate> {
        parse_date(raw, DateOrder::DayFirst, true).unwrap()
    }

    #[test]
    fn test_iso_and_long_formats_agree() {
        assert_eq!(parse("2024-01-05").value, ymd(2024, 1, 5));
        assert_eq!(parse("January 5, 2024").value, ymd(2024, 1, 5));
        assert_eq!(parse("Jan 5 2024").value, ymd(2024, 1, 5));
        assert_eq!(parse("5th January 2024").value, ymd(2024, 1, 5));
        assert_eq!(parse("05-Jan-2024").value, ymd(2024, 1, 5));
        assert_eq!(parse("2024-01-05").confidence, 1.0);
    }

    #[test]
    fn test_numeric_date_order() {
        let parsed = parse_date("1/4/2023", DateOrder::DayFirst, true).unwrap();
        assert_eq!(parsed.value, ymd(2023, 4, 1));
        assert_eq!(parsed.confidence, AMBIGUOUS_DATE_FACTOR);

        let parsed = parse_date("1/4/2023", DateOrder::MonthFirst, true).unwrap();
        assert_eq!(parsed.value, ymd(2023, 1, 4));
    }

    #[test]
    fn test_unambiguous_numeric_date_keeps_confidence() {
        let parsed = parse("25/12/2023");
        assert_eq!(parsed.value, ymd(2023, 12, 25));
        assert_eq!(parsed.confidence, 1.0);

        let parsed = parse("15.01.2024");
        assert_eq!(parsed.value, ymd(2024, 1, 15));
    }

    #[test]
    fn test_invalid_in_configured_order_is_not_guessed() {
        assert!(parse_date("12/31/2023", DateOrder::DayFirst, true).is_err());
        assert!(parse_date("2023-02-30", DateOrder::DayFirst, true).is_err());
        assert!(parse_date("next Tuesday", DateOrder::DayFirst, true).is_err());
    }

    #[test]
    fn test_two_digit_year() {
        let parsed = parse("25/12/23");
        assert_eq!(parsed.value, ymd(2023, 12, 25));
        assert!(parsed.note.is_some());
    }

    #[test]
    fn test_ocr_repair() {
        let parsed = parse("2O24-01-05");
        assert_eq!(parsed.value, ymd(2024, 1, 5));
        assert!(parsed.confidence < 1.0);
    }
}
