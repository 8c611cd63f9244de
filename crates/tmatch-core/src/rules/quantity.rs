//! quantity_match: billed quantities were ordered and delivered.

use serde_json::{json, Value};

use crate::models::document::DocumentRole;
use crate::models::record::{fields, DocumentBundle, DocumentRecord};
use crate::models::verification::CheckResult;

use super::pairing::pair_line_items;
use super::{Inputs, Rule, RuleOutcome, QUANTITY_MATCH};

/// Every paired invoice line quantity must equal the PO line quantity, and
/// the quantity confirmed on the proof of delivery must equal the invoiced
/// total. Zero tolerance.
///
/// When both the invoice and the POD have line items, POD lines are paired
/// with invoice lines and only the matched POD quantities count as
/// delivered. Without a POD line breakdown its `quantity_delivered` field is
/// compared against the invoice's `total_quantity`, or its line sum when the
/// header is absent. An invoice header that disagrees with its own lines is
/// a mismatch.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuantityMatchRule;

/// Quantity of the line at `position`, recorded as consumed.
fn line_quantity<'a>(inputs: &mut Inputs<'a>, record: &'a DocumentRecord, position: usize) -> Option<i64> {
    let item = &record.line_items[position];
    inputs
        .take(
            record.line_path(item.index, fields::LINE_QUANTITY),
            item.quantity.as_ref(),
        )
        .and_then(|f| f.value.as_ref()?.as_quantity())
}

/// Sum line quantities, recording each as consumed. `None` if any line
/// quantity is unreadable.
fn sum_lines<'a>(inputs: &mut Inputs<'a>, record: &'a DocumentRecord) -> Option<i64> {
    let mut total: i64 = 0;
    let mut complete = true;
    for position in 0..record.line_items.len() {
        match line_quantity(inputs, record, position) {
            Some(q) => total = total.saturating_add(q),
            None => complete = false,
        }
    }
    complete.then_some(total)
}

/// Total quantity of a document: the sum of its lines when it has any,
/// otherwise the header field `name`.
fn document_total<'a>(
    inputs: &mut Inputs<'a>,
    record: &'a DocumentRecord,
    role: DocumentRole,
    name: &str,
) -> Option<i64> {
    if record.has_line_items() {
        sum_lines(inputs, record)
    } else {
        inputs.quantity(role, name)
    }
}

/// Sum of the POD quantities paired with invoice lines. Each pair whose
/// quantities differ is added to `mismatches`; POD lines with no invoice
/// counterpart are not counted.
fn delivered_per_line<'a>(
    inputs: &mut Inputs<'a>,
    invoice: &'a DocumentRecord,
    pod: &'a DocumentRecord,
    mismatches: &mut Vec<Value>,
) -> Option<i64> {
    let pairing = pair_line_items(&invoice.line_items, &pod.line_items);
    let mut delivered: i64 = 0;
    let mut complete = true;
    for &(i, j) in &pairing.pairs {
        let billed = line_quantity(inputs, invoice, i);
        let Some(received) = line_quantity(inputs, pod, j) else {
            complete = false;
            continue;
        };
        delivered = delivered.saturating_add(received);
        if let Some(billed) = billed.filter(|b| *b != received) {
            mismatches.push(json!({
                "item": line_label(invoice, i),
                "invoice_line": invoice.line_items[i].index,
                "delivery_line": pod.line_items[j].index,
                "expected": billed,
                "actual": received,
            }));
        }
    }
    complete.then_some(delivered)
}

fn line_label(record: &DocumentRecord, position: usize) -> String {
    let item = &record.line_items[position];
    match item.description_text() {
        Some(d) => d.to_string(),
        None => format!("line {}", item.index + 1),
    }
}

impl Rule for QuantityMatchRule {
    fn name(&self) -> &'static str {
        QUANTITY_MATCH
    }

    fn evaluate(&self, bundle: &DocumentBundle) -> RuleOutcome {
        let invoice = &bundle.invoice;
        let po = &bundle.purchase_order;
        let pod = &bundle.proof_of_delivery;
        let mut inputs = Inputs::new(bundle);
        let mut mismatches: Vec<Value> = Vec::new();

        // Invoice vs PO, line by line.
        if invoice.has_line_items() && po.has_line_items() {
            let pairing = pair_line_items(&invoice.line_items, &po.line_items);
            for &(i, j) in &pairing.pairs {
                let inv_qty = line_quantity(&mut inputs, invoice, i);
                let po_qty = line_quantity(&mut inputs, po, j);
                if let (Some(actual), Some(expected)) = (inv_qty, po_qty) {
                    if actual != expected {
                        mismatches.push(json!({
                            "item": line_label(invoice, i),
                            "invoice_line": invoice.line_items[i].index,
                            "purchase_order_line": po.line_items[j].index,
                            "expected": expected,
                            "actual": actual,
                        }));
                    }
                }
            }
        } else if po.field(fields::TOTAL_QUANTITY).is_some() || po.has_line_items() {
            // No per-line comparison possible: compare document totals.
            let invoice_total = document_total(
                &mut inputs,
                invoice,
                DocumentRole::Invoice,
                fields::TOTAL_QUANTITY,
            );
            let po_total = document_total(
                &mut inputs,
                po,
                DocumentRole::PurchaseOrder,
                fields::TOTAL_QUANTITY,
            );
            if let (Some(actual), Some(expected)) = (invoice_total, po_total) {
                if actual != expected {
                    mismatches.push(json!({
                        "item": "ordered_total",
                        "expected": expected,
                        "actual": actual,
                    }));
                }
            }
        }

        // The invoice's own total quantity against its lines.
        let invoice_lines = if invoice.has_line_items() {
            sum_lines(&mut inputs, invoice)
        } else {
            None
        };
        let invoice_header =
            if invoice.field(fields::TOTAL_QUANTITY).is_some() || !invoice.has_line_items() {
                inputs.quantity(DocumentRole::Invoice, fields::TOTAL_QUANTITY)
            } else {
                None
            };
        if let (Some(lines), Some(header)) = (invoice_lines, invoice_header) {
            if lines != header {
                mismatches.push(json!({
                    "item": "invoice_total_quantity",
                    "expected": lines,
                    "actual": header,
                }));
            }
        }

        // Invoiced vs delivered.
        let (invoiced, delivered) = if pod.has_line_items() {
            let delivered = if invoice.has_line_items() {
                delivered_per_line(&mut inputs, invoice, pod, &mut mismatches)
            } else {
                sum_lines(&mut inputs, pod)
            };
            (invoice_lines.or(invoice_header), delivered)
        } else {
            let delivered =
                inputs.quantity(DocumentRole::ProofOfDelivery, fields::QUANTITY_DELIVERED);
            (invoice_header.or(invoice_lines), delivered)
        };

        if inputs.has_missing() {
            return inputs.fail_missing(QUANTITY_MATCH);
        }
        let (Some(invoiced), Some(delivered)) = (invoiced, delivered) else {
            return inputs.fail_missing(QUANTITY_MATCH);
        };

        let mut check_details: Vec<(&str, Value)> = vec![
            ("invoiced_quantity", json!(invoiced)),
            ("delivered_quantity", json!(delivered)),
        ];
        if delivered != invoiced {
            mismatches.push(json!({
                "item": "delivered_total",
                "expected": invoiced,
                "actual": delivered,
            }));
            if delivered < invoiced {
                check_details.push(("shortfall", json!(invoiced.saturating_sub(delivered))));
            } else {
                check_details.push(("excess_delivered", json!(delivered.saturating_sub(invoiced))));
            }
        }

        let check = if mismatches.is_empty() {
            CheckResult::pass(
                QUANTITY_MATCH,
                format!("Quantities match: {} invoiced, {} delivered", invoiced, delivered),
            )
        } else {
            let message = if delivered < invoiced {
                format!(
                    "Quantity mismatch: {} invoiced but {} delivered (shortfall {})",
                    invoiced,
                    delivered,
                    invoiced.saturating_sub(delivered)
                )
            } else {
                format!("Quantity mismatch on {} item(s)", mismatches.len())
            };
            CheckResult::fail(QUANTITY_MATCH, message).detail("mismatched_items", mismatches)
        };
        let check = check_details
            .into_iter()
            .fold(check, |check, (key, value)| check.detail(key, value));
        inputs.finish(check)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::testing::bundle;

    #[test]
    fn test_matching_quantities_pass() {
        let bundle = bundle(
            &[
                ("line_items[0].description", "Widget"),
                ("line_items[0].quantity", "50"),
            ],
            &[
                ("line_items[0].description", "widget"),
                ("line_items[0].quantity", "50"),
            ],
            &[("quantity_delivered", "50")],
        );
        let outcome = QuantityMatchRule.evaluate(&bundle);
        assert!(outcome.check.passed, "{}", outcome.check.message);
        assert_eq!(outcome.consumed.len(), 3);
    }

    #[test]
    fn test_shortfall_reported() {
        let bundle = bundle(
            &[("line_items[0].description", "Widget"), ("line_items[0].quantity", "60")],
            &[("line_items[0].description", "Widget"), ("line_items[0].quantity", "60")],
            &[("line_items[0].description", "Widget"), ("line_items[0].quantity", "40")],
        );
        let outcome = QuantityMatchRule.evaluate(&bundle);
        assert!(!outcome.check.passed);
        assert_eq!(outcome.check.details["shortfall"], json!(20));
        assert!(outcome.check.message.contains("shortfall 20"));
    }

    #[test]
    fn test_invoice_po_line_mismatch_listed() {
        let bundle = bundle(
            &[("line_items[0].description", "Widget"), ("line_items[0].quantity", "60")],
            &[("line_items[0].description", "Widget"), ("line_items[0].quantity", "50")],
            &[("quantity_delivered", "60")],
        );
        let outcome = QuantityMatchRule.evaluate(&bundle);
        assert!(!outcome.check.passed);
        let items = outcome.check.details["mismatched_items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["expected"], json!(50));
        assert_eq!(items[0]["actual"], json!(60));
    }

    #[test]
    fn test_unbilled_delivery_line_does_not_hide_shortfall() {
        let bundle = bundle(
            &[("line_items[0].description", "Widget"), ("line_items[0].quantity", "50")],
            &[("line_items[0].description", "Widget"), ("line_items[0].quantity", "50")],
            &[
                ("line_items[0].description", "Widget"),
                ("line_items[0].quantity", "30"),
                ("line_items[1].description", "Gadget"),
                ("line_items[1].quantity", "20"),
            ],
        );
        let outcome = QuantityMatchRule.evaluate(&bundle);
        assert!(!outcome.check.passed, "{}", outcome.check.message);
        assert_eq!(outcome.check.details["delivered_quantity"], json!(30));
        assert_eq!(outcome.check.details["shortfall"], json!(20));

        let items = outcome.check.details["mismatched_items"].as_array().unwrap();
        assert_eq!(items[0]["item"], json!("Widget"));
        assert_eq!(items[0]["delivery_line"], json!(0));
        assert_eq!(items[0]["expected"], json!(50));
        assert_eq!(items[0]["actual"], json!(30));
    }

    #[test]
    fn test_delivery_lines_matched_by_description() {
        let bundle = bundle(
            &[
                ("line_items[0].description", "Widget"),
                ("line_items[0].quantity", "10"),
                ("line_items[1].description", "Gadget"),
                ("line_items[1].quantity", "5"),
            ],
            &[],
            &[
                ("line_items[0].description", "gadget"),
                ("line_items[0].quantity", "5"),
                ("line_items[1].description", "widget"),
                ("line_items[1].quantity", "10"),
            ],
        );
        let outcome = QuantityMatchRule.evaluate(&bundle);
        assert!(outcome.check.passed, "{}", outcome.check.message);
        assert_eq!(outcome.check.details["delivered_quantity"], json!(15));
    }

    #[test]
    fn test_invoice_header_disagreeing_with_lines() {
        let bundle = bundle(
            &[
                ("total_quantity", "60"),
                ("line_items[0].description", "Widget"),
                ("line_items[0].quantity", "50"),
            ],
            &[("line_items[0].description", "Widget"), ("line_items[0].quantity", "50")],
            &[("quantity_delivered", "50")],
        );
        let outcome = QuantityMatchRule.evaluate(&bundle);
        assert!(!outcome.check.passed);
        assert!(outcome
            .consumed
            .iter()
            .any(|c| c.path == "invoice.total_quantity"));

        let items = outcome.check.details["mismatched_items"].as_array().unwrap();
        let header = items
            .iter()
            .find(|m| m["item"] == json!("invoice_total_quantity"))
            .unwrap();
        assert_eq!(header["expected"], json!(50));
        assert_eq!(header["actual"], json!(60));
        assert_eq!(outcome.check.details["invoiced_quantity"], json!(60));
    }

    #[test]
    fn test_totals_without_lines() {
        let bundle = bundle(
            &[("total_quantity", "1")],
            &[],
            &[("quantity_delivered", "1 unit")],
        );
        assert!(QuantityMatchRule.evaluate(&bundle).check.passed);
    }

    #[test]
    fn test_missing_delivery_quantity_fails_closed() {
        let bundle = bundle(&[("total_quantity", "1")], &[], &[]);
        let outcome = QuantityMatchRule.evaluate(&bundle);
        assert!(!outcome.check.passed);
        assert!(outcome
            .check
            .message
            .contains("proof_of_delivery.quantity_delivered"));
    }

    #[test]
    fn test_fractional_quantity_fails_closed() {
        let bundle = bundle(
            &[("total_quantity", "2.5")],
            &[],
            &[("quantity_delivered", "2")],
        );
        let outcome = QuantityMatchRule.evaluate(&bundle);
        assert!(!outcome.check.passed);
        assert!(outcome.check.message.contains("invoice.total_quantity"));
    }
}
