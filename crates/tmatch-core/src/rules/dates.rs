//! date_sequence: PO date <= invoice date <= delivery date <= due date.

use serde_json::json;

use crate::models::document::DocumentRole;
use crate::models::record::{fields, DocumentBundle};
use crate::models::verification::CheckResult;

use super::{Inputs, Rule, RuleOutcome, DATE_SEQUENCE};

/// The four dates, in the order they must occur.
const SEQUENCE: [(DocumentRole, &str); 4] = [
    (DocumentRole::PurchaseOrder, fields::PO_DATE),
    (DocumentRole::Invoice, fields::INVOICE_DATE),
    (DocumentRole::ProofOfDelivery, fields::DELIVERY_DATE),
    (DocumentRole::Invoice, fields::DUE_DATE),
];

/// All comparisons are inclusive. Every date is required; a sequence that
/// cannot be verified fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateSequenceRule;

impl Rule for DateSequenceRule {
    fn name(&self) -> &'static str {
        DATE_SEQUENCE
    }

    fn evaluate(&self, bundle: &DocumentBundle) -> RuleOutcome {
        let mut inputs = Inputs::new(bundle);
        let dates: Vec<_> = SEQUENCE
            .iter()
            .map(|(role, name)| (role.field_path(name), inputs.date(*role, name)))
            .collect();

        if inputs.has_missing() {
            return inputs.fail_missing(DATE_SEQUENCE);
        }
        let dates: Vec<_> = dates
            .into_iter()
            .filter_map(|(path, date)| date.map(|d| (path, d)))
            .collect();

        let violations: Vec<_> = dates
            .windows(2)
            .filter(|pair| pair[0].1 > pair[1].1)
            .map(|pair| {
                json!({
                    "earlier_field": pair[0].0,
                    "earlier": pair[0].1.to_string(),
                    "later_field": pair[1].0,
                    "later": pair[1].1.to_string(),
                })
            })
            .collect();

        let check = if violations.is_empty() {
            CheckResult::pass(DATE_SEQUENCE, "Dates are in sequence")
        } else {
            let first = &violations[0];
            CheckResult::fail(
                DATE_SEQUENCE,
                format!(
                    "Date out of sequence: {} ({}) is after {} ({})",
                    first["earlier_field"].as_str().unwrap_or_default(),
                    first["earlier"].as_str().unwrap_or_default(),
                    first["later_field"].as_str().unwrap_or_default(),
                    first["later"].as_str().unwrap_or_default(),
                ),
            )
            .detail("violations", violations)
        };
        let check = dates
            .iter()
            .fold(check, |check, (path, date)| check.detail(path, date.to_string()));
        inputs.finish(check)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::testing::bundle;

    fn evaluate(po: &str, invoice: &str, delivery: &str, due: &str) -> RuleOutcome {
        let bundle = bundle(
            &[("invoice_date", invoice), ("due_date", due)],
            &[("po_date", po)],
            &[("delivery_date", delivery)],
        );
        DateSequenceRule.evaluate(&bundle)
    }

    #[test]
    fn test_in_sequence_with_equal_dates() {
        let outcome = evaluate("2024-01-02", "2024-01-05", "2024-01-05", "February 5, 2024");
        assert!(outcome.check.passed, "{}", outcome.check.message);
        assert_eq!(outcome.consumed.len(), 4);
    }

    #[test]
    fn test_po_after_invoice_fails() {
        let outcome = evaluate("2024-01-10", "2024-01-05", "2024-01-12", "2024-02-05");
        assert!(!outcome.check.passed);
        assert!(outcome.check.message.contains("purchase_order.po_date"));
        assert_eq!(outcome.check.details["violations"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_delivery_after_due_date_fails() {
        let outcome = evaluate("2024-01-02", "2024-01-05", "2024-03-01", "2024-02-05");
        assert!(!outcome.check.passed);
    }

    #[test]
    fn test_missing_date_fails_closed() {
        let bundle = bundle(
            &[("invoice_date", "2024-01-05")],
            &[("po_date", "2024-01-02")],
            &[("delivery_date", "2024-01-06")],
        );
        let outcome = DateSequenceRule.evaluate(&bundle);
        assert!(!outcome.check.passed);
        assert!(outcome.check.message.contains("invoice.due_date"));
    }
}
