//! Anomaly detection.
//!
//! Anomalies are signals for a human reviewer. They never fail a check; an
//! `error` anomaly only moves an otherwise passing verification to review.

use rust_decimal::Decimal;
use tracing::debug;

use crate::hashing::SubmissionRecord;
use crate::models::config::AnomalyConfig;
use crate::models::document::DocumentRole;
use crate::models::record::{fields, DocumentBundle, DocumentRecord};
use crate::models::value::Money;
use crate::models::verification::Anomaly;
use crate::normalize::text::identifier_key;
use crate::rules::pairing::pair_line_items;

pub const ROUND_AMOUNT: &str = "ROUND_AMOUNT";
pub const LINE_ITEM_SUM_MISMATCH: &str = "LINE_ITEM_SUM_MISMATCH";
pub const LINE_ITEM_MATH: &str = "LINE_ITEM_MATH";
pub const QUANTITY_OUTLIER: &str = "QUANTITY_OUTLIER";
pub const REPEATED_REFERENCE: &str = "REPEATED_REFERENCE";
pub const UNMATCHED_LINE_ITEM: &str = "UNMATCHED_LINE_ITEM";
pub const PARTY_NAME_MISMATCH: &str = "PARTY_NAME_MISMATCH";
pub const AMOUNT_UNDERBILLED: &str = "AMOUNT_UNDERBILLED";
pub const LONG_PAYMENT_TERM: &str = "LONG_PAYMENT_TERM";
pub const DUPLICATE_BUNDLE: &str = "DUPLICATE_BUNDLE";
pub const NEAR_DUPLICATE_BUNDLE: &str = "NEAR_DUPLICATE_BUNDLE";
pub const AMOUNT_SPIKE: &str = "AMOUNT_SPIKE";

/// Company suffixes dropped before comparing party names.
const NAME_SUFFIXES: [&str; 8] = [
    " pte. ltd.",
    " pte ltd",
    " pte",
    " ltd",
    " inc",
    " corp",
    " llc",
    ".",
];

/// Words OCR tends to merge into a party name from nearby stamps and labels.
const NAME_ARTIFACTS: [&str; 4] = ["p.o.", "po-", "stamp", "company"];

/// Scans a normalized bundle, and the wallet's submission history, for
/// patterns no single rule captures.
#[derive(Debug, Clone, Default)]
pub struct AnomalyDetector {
    config: AnomalyConfig,
}

impl AnomalyDetector {
    pub fn new(config: &AnomalyConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Run every detector. The output order is fixed for identical input.
    pub fn detect(&self, bundle: &DocumentBundle, history: &[SubmissionRecord]) -> Vec<Anomaly> {
        let mut anomalies = Vec::new();
        self.round_amount(bundle, &mut anomalies);
        self.line_item_sum(bundle, &mut anomalies);
        self.line_item_math(bundle, &mut anomalies);
        self.quantity_outliers(bundle, &mut anomalies);
        repeated_references(bundle, &mut anomalies);
        unmatched_line_items(bundle, &mut anomalies);
        party_names(bundle, &mut anomalies);
        self.underbilling(bundle, &mut anomalies);
        self.payment_term(bundle, &mut anomalies);
        duplicate_submissions(bundle, history, &mut anomalies);
        self.amount_spike(bundle, history, &mut anomalies);

        for anomaly in &anomalies {
            debug!(
                "Anomaly {} ({}) at {}: {}",
                anomaly.code, anomaly.severity, anomaly.field_path, anomaly.message
            );
        }
        anomalies
    }

    fn round_amount(&self, bundle: &DocumentBundle, out: &mut Vec<Anomaly>) {
        let Some(total) = bundle.invoice.money(fields::TOTAL_AMOUNT) else {
            return;
        };
        let amount = total.to_decimal();
        let unit = self.config.round_amount_unit;
        if unit > Decimal::ZERO
            && amount >= self.config.round_amount_threshold
            && (amount % unit).is_zero()
        {
            out.push(Anomaly::warning(
                ROUND_AMOUNT,
                format!("Invoice total {} is a suspiciously round amount", total),
                bundle.invoice.path(fields::TOTAL_AMOUNT),
            ));
        }
    }

    fn line_item_sum(&self, bundle: &DocumentBundle, out: &mut Vec<Anomaly>) {
        let invoice = &bundle.invoice;
        let Some(total) = invoice.money(fields::TOTAL_AMOUNT) else {
            return;
        };
        let Some(sum) = sum_line_amounts(invoice) else {
            return;
        };
        if sum.currency() != total.currency() {
            return;
        }
        let Some(skew) = total.to_decimal().checked_sub(sum.to_decimal()).map(|d| d.abs()) else {
            return;
        };
        if skew > self.config.reconciliation_tolerance {
            out.push(
                Anomaly::error(
                    LINE_ITEM_SUM_MISMATCH,
                    format!(
                        "Invoice total {} differs from the sum of its line items {} by {}",
                        total, sum, skew
                    ),
                    invoice.path(fields::TOTAL_AMOUNT),
                )
                .with_values(sum.amount_string(), total.amount_string()),
            );
        }
    }

    fn line_item_math(&self, bundle: &DocumentBundle, out: &mut Vec<Anomaly>) {
        let invoice = &bundle.invoice;
        for item in &invoice.line_items {
            let (Some(quantity), Some(unit_price), Some(amount)) = (
                item.quantity_value(),
                item.unit_price_value(),
                item.amount_value(),
            ) else {
                continue;
            };
            if unit_price.currency() != amount.currency() {
                continue;
            }
            let path = invoice
                .role
                .field_path(&format!("line_items[{}]", item.index));
            let stated = amount.to_decimal();
            let Some(calculated) = unit_price.to_decimal().checked_mul(Decimal::from(quantity))
            else {
                out.push(
                    Anomaly::warning(
                        LINE_ITEM_MATH,
                        format!(
                            "Line {}: {} x {} is out of range, line amount is {}",
                            item.index + 1,
                            quantity,
                            unit_price.to_decimal(),
                            stated
                        ),
                        path,
                    )
                    .with_values("out of range", stated.to_string()),
                );
                continue;
            };
            let skew = calculated.checked_sub(stated).map(|d| d.abs());
            if skew.is_none_or(|d| d > self.config.reconciliation_tolerance) {
                out.push(
                    Anomaly::warning(
                        LINE_ITEM_MATH,
                        format!(
                            "Line {}: {} x {} = {}, but line amount is {}",
                            item.index + 1,
                            quantity,
                            unit_price.to_decimal(),
                            calculated,
                            stated
                        ),
                        path,
                    )
                    .with_values(calculated.to_string(), stated.to_string()),
                );
            }
        }
    }

    fn quantity_outliers(&self, bundle: &DocumentBundle, out: &mut Vec<Anomaly>) {
        let max = self.config.max_plausible_quantity;
        for record in bundle.records() {
            for (path, field) in record.all_fields() {
                let Some(quantity) = field.value.as_ref().and_then(|v| v.as_quantity()) else {
                    continue;
                };
                if quantity > max {
                    out.push(
                        Anomaly::warning(
                            QUANTITY_OUTLIER,
                            format!("Quantity {} exceeds plausible maximum {}", quantity, max),
                            path,
                        )
                        .with_values(format!("<= {}", max), quantity.to_string()),
                    );
                }
            }
        }
    }

    fn underbilling(&self, bundle: &DocumentBundle, out: &mut Vec<Anomaly>) {
        let (Some(total), Some(authorized)) = (
            bundle.invoice.money(fields::TOTAL_AMOUNT),
            bundle.purchase_order.money(fields::AUTHORIZED_AMOUNT),
        ) else {
            return;
        };
        if total.currency() != authorized.currency() || authorized.minor_units() <= 0 {
            return;
        }
        let Some(floor) = (Decimal::ONE - self.config.underbilling_variance)
            .checked_mul(authorized.to_decimal())
        else {
            return;
        };
        if total.to_decimal() < floor {
            out.push(
                Anomaly::warning(
                    AMOUNT_UNDERBILLED,
                    format!(
                        "Invoice total {} is well below authorized amount {}",
                        total, authorized
                    ),
                    bundle.invoice.path(fields::TOTAL_AMOUNT),
                )
                .with_values(authorized.amount_string(), total.amount_string()),
            );
        }
    }

    fn payment_term(&self, bundle: &DocumentBundle, out: &mut Vec<Anomaly>) {
        let invoice = &bundle.invoice;
        let (Some(issued), Some(due)) = (
            invoice.date(fields::INVOICE_DATE),
            invoice.date(fields::DUE_DATE),
        ) else {
            return;
        };
        let days = (due - issued).num_days();
        let limit = self.config.long_payment_term_days;
        if days > limit {
            out.push(
                Anomaly::warning(
                    LONG_PAYMENT_TERM,
                    format!("Payment term of {} days exceeds {} days", days, limit),
                    invoice.path(fields::DUE_DATE),
                )
                .with_values(format!("<= {} days", limit), format!("{} days", days)),
            );
        }
    }

    fn amount_spike(
        &self,
        bundle: &DocumentBundle,
        history: &[SubmissionRecord],
        out: &mut Vec<Anomaly>,
    ) {
        let Some(total) = bundle.invoice.money(fields::TOTAL_AMOUNT) else {
            return;
        };
        let prior: Vec<Decimal> = history
            .iter()
            .filter_map(|s| s.total.as_ref())
            .filter(|m| m.currency() == total.currency())
            .map(Money::to_decimal)
            .collect();
        if prior.is_empty() {
            return;
        }
        let Some(average) = prior
            .iter()
            .try_fold(Decimal::ZERO, |sum, amount| sum.checked_add(*amount))
            .and_then(|sum| sum.checked_div(Decimal::from(prior.len())))
        else {
            return;
        };
        if average <= Decimal::ZERO {
            return;
        }
        let Some(ratio) = total.to_decimal().checked_div(average) else {
            return;
        };
        if ratio > self.config.amount_spike_multiplier {
            out.push(
                Anomaly::warning(
                    AMOUNT_SPIKE,
                    format!(
                        "Invoice total {} is {}x the wallet's average of {:.2} {}",
                        total,
                        ratio.round_dp(1),
                        average,
                        total.currency()
                    ),
                    bundle.invoice.path(fields::TOTAL_AMOUNT),
                )
                .with_values(format!("{:.2}", average), total.amount_string()),
            );
        }
    }
}

/// Sum of the invoice's line amounts. `None` without lines or when any line
/// amount is missing or in another currency.
fn sum_line_amounts(record: &DocumentRecord) -> Option<Money> {
    let mut amounts = record.line_items.iter().map(|item| item.amount_value());
    let first = amounts.next()??.clone();
    amounts.try_fold(first, |sum, amount| sum.checked_add(amount?))
}

fn repeated_references(bundle: &DocumentBundle, out: &mut Vec<Anomaly>) {
    let references = [
        (DocumentRole::Invoice, fields::INVOICE_NUMBER),
        (DocumentRole::PurchaseOrder, fields::PO_NUMBER),
        (DocumentRole::ProofOfDelivery, fields::DELIVERY_REFERENCE),
    ];
    let keys: Vec<(String, String)> = references
        .iter()
        .filter_map(|(role, name)| {
            let value = bundle.get(*role).text(name)?;
            Some((role.field_path(name), identifier_key(value)))
        })
        .filter(|(_, key)| !key.is_empty())
        .collect();

    for (i, (later_path, key)) in keys.iter().enumerate() {
        if let Some((earlier_path, _)) = keys[..i].iter().find(|(_, k)| k == key) {
            out.push(
                Anomaly::warning(
                    REPEATED_REFERENCE,
                    format!(
                        "{} repeats the reference number of {}",
                        later_path, earlier_path
                    ),
                    later_path.clone(),
                )
                .with_values(format!("distinct from {}", earlier_path), key.clone()),
            );
        }
    }
}

fn unmatched_line_items(bundle: &DocumentBundle, out: &mut Vec<Anomaly>) {
    let invoice = &bundle.invoice;
    let po = &bundle.purchase_order;
    let pod = &bundle.proof_of_delivery;
    if !invoice.has_line_items() {
        return;
    }
    if po.has_line_items() {
        let pairing = pair_line_items(&invoice.line_items, &po.line_items);
        for (record, positions, other) in [
            (invoice, &pairing.unmatched_invoice, "purchase order"),
            (po, &pairing.unmatched_po, "invoice"),
        ] {
            unmatched_lines(record, positions, other, out);
        }
    }
    // Delivered lines nobody billed. Billed lines that were not delivered
    // show up as a quantity shortfall instead.
    if pod.has_line_items() {
        let pairing = pair_line_items(&invoice.line_items, &pod.line_items);
        unmatched_lines(pod, &pairing.unmatched_po, "invoice", out);
    }
}

fn unmatched_lines(record: &DocumentRecord, positions: &[usize], other: &str, out: &mut Vec<Anomaly>) {
    for &position in positions {
        let item = &record.line_items[position];
        let label = item
            .description_text()
            .map(str::to_string)
            .unwrap_or_else(|| format!("line {}", item.index + 1));
        out.push(Anomaly::error(
            UNMATCHED_LINE_ITEM,
            format!("{} line item '{}' has no counterpart on the {}", record.role, label, other),
            record.role.field_path(&format!("line_items[{}]", item.index)),
        ));
    }
}

fn party_names(bundle: &DocumentBundle, out: &mut Vec<Anomaly>) {
    let pairs = [
        (fields::PAYEE_NAME, fields::VENDOR_NAME, "Payee"),
        (fields::PAYER_NAME, fields::BUYER_NAME, "Payer"),
    ];
    for (invoice_field, po_field, label) in pairs {
        let (Some(invoice_name), Some(po_name)) = (
            bundle.invoice.text(invoice_field),
            bundle.purchase_order.text(po_field),
        ) else {
            continue;
        };
        if !party_names_match(invoice_name, po_name) {
            out.push(
                Anomaly::warning(
                    PARTY_NAME_MISMATCH,
                    format!(
                        "{} '{}' does not match purchase order {} '{}'",
                        label,
                        invoice_name,
                        po_field.trim_end_matches("_name"),
                        po_name
                    ),
                    bundle.invoice.path(invoice_field),
                )
                .with_values(po_name, invoice_name),
            );
        }
    }
}

fn duplicate_submissions(
    bundle: &DocumentBundle,
    history: &[SubmissionRecord],
    out: &mut Vec<Anomaly>,
) {
    if let Some(prior) = history.iter().find(|s| s.bundle_hash == bundle.bundle_hash) {
        out.push(Anomaly::error(
            DUPLICATE_BUNDLE,
            format!(
                "Identical bundle already submitted by this wallet at {}",
                prior.recorded_at.to_rfc3339()
            ),
            "bundle_hash",
        ));
        return;
    }

    let hashes = [
        &bundle.invoice.content_hash,
        &bundle.purchase_order.content_hash,
        &bundle.proof_of_delivery.content_hash,
    ];
    let near = history.iter().find(|s| {
        let prior = [&s.invoice_hash, &s.po_hash, &s.pod_hash];
        hashes.iter().zip(prior).filter(|(a, b)| **a == *b).count() >= 2
    });
    if let Some(prior) = near {
        out.push(Anomaly::warning(
            NEAR_DUPLICATE_BUNDLE,
            format!(
                "Bundle shares documents with prior submission {}",
                prior.bundle_hash
            ),
            "bundle_hash",
        ));
    }
}

/// Lowercase and strip company suffixes and OCR artifacts.
fn normalize_party_name(name: &str) -> String {
    let mut name = name.to_lowercase();
    for suffix in NAME_SUFFIXES {
        name = name.replace(suffix, "");
    }
    for artifact in NAME_ARTIFACTS {
        name = name.replace(artifact, "");
    }
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Fuzzy party-name comparison. Names match when equal after cleanup, when
/// one contains the other, or when they share a word longer than three
/// characters. Empty or `unknown` names are never reported as mismatches.
pub fn party_names_match(a: &str, b: &str) -> bool {
    let a = normalize_party_name(a);
    let b = normalize_party_name(b);
    if a.is_empty() || b.is_empty() || a == "unknown" || b == "unknown" {
        return true;
    }
    if a == b || a.contains(&b) || b.contains(&a) {
        return true;
    }
    a.split_whitespace()
        .filter(|w| w.len() > 3)
        .any(|w| b.split_whitespace().any(|other| other == w))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::BundleHashes;
    use crate::models::value::Currency;
    use crate::models::verification::Severity;
    use crate::rules::testing::bundle;

    fn detect(bundle: &DocumentBundle) -> Vec<Anomaly> {
        AnomalyDetector::default().detect(bundle, &[])
    }

    fn codes(anomalies: &[Anomaly]) -> Vec<&str> {
        anomalies.iter().map(|a| a.code.as_str()).collect()
    }

    #[test]
    fn test_clean_bundle_has_no_anomalies() {
        let bundle = bundle(
            &[
                ("invoice_number", "INV-1"),
                ("total_amount", "S$1,000.00"),
                ("invoice_date", "2024-01-05"),
                ("due_date", "2024-02-05"),
                ("payee_name", "ABC Trading Pte Ltd"),
                ("line_items[0].description", "Widget"),
                ("line_items[0].quantity", "1"),
                ("line_items[0].unit_price", "S$1,000.00"),
                ("line_items[0].amount", "S$1,000.00"),
            ],
            &[
                ("po_number", "PO-1"),
                ("authorized_amount", "S$1,000.00"),
                ("vendor_name", "ABC Trading"),
                ("line_items[0].description", "Widget"),
                ("line_items[0].quantity", "1"),
            ],
            &[("delivery_reference", "DN-1"), ("quantity_delivered", "1")],
        );
        assert!(detect(&bundle).is_empty(), "{:?}", detect(&bundle));
    }

    #[test]
    fn test_round_amount() {
        let flagged = bundle(&[("total_amount", "USD 50,000.00")], &[], &[]);
        assert_eq!(codes(&detect(&flagged)), vec![ROUND_AMOUNT]);

        let below = bundle(&[("total_amount", "USD 9,000.00")], &[], &[]);
        assert!(detect(&below).is_empty());

        let uneven = bundle(&[("total_amount", "USD 50,250.00")], &[], &[]);
        assert!(detect(&uneven).is_empty());
    }

    #[test]
    fn test_line_item_sum_mismatch_is_error() {
        let bundle = bundle(
            &[
                ("total_amount", "$950.00"),
                ("line_items[0].amount", "$500.00"),
                ("line_items[1].amount", "$500.00"),
            ],
            &[],
            &[],
        );
        let anomalies = detect(&bundle);
        assert_eq!(codes(&anomalies), vec![LINE_ITEM_SUM_MISMATCH]);
        assert_eq!(anomalies[0].severity, Severity::Error);
        assert_eq!(anomalies[0].expected_value.as_deref(), Some("1000.00"));
        assert_eq!(anomalies[0].actual_value.as_deref(), Some("950.00"));
    }

    #[test]
    fn test_line_item_math() {
        let bundle = bundle(
            &[
                ("line_items[0].quantity", "3"),
                ("line_items[0].unit_price", "$10.00"),
                ("line_items[0].amount", "$35.00"),
            ],
            &[],
            &[],
        );
        let anomalies = detect(&bundle);
        assert_eq!(codes(&anomalies), vec![LINE_ITEM_MATH]);
        assert_eq!(anomalies[0].field_path, "invoice.line_items[0]");
        assert_eq!(anomalies[0].expected_value.as_deref(), Some("30.00"));
    }

    #[test]
    fn test_quantity_outlier() {
        let bundle = bundle(&[], &[], &[("quantity_delivered", "5000000")]);
        let anomalies = detect(&bundle);
        assert_eq!(codes(&anomalies), vec![QUANTITY_OUTLIER]);
        assert_eq!(anomalies[0].field_path, "proof_of_delivery.quantity_delivered");
    }

    #[test]
    fn test_repeated_reference() {
        let bundle = bundle(
            &[("invoice_number", "REF-100")],
            &[("po_number", "ref-100")],
            &[("delivery_reference", "DN-1")],
        );
        let anomalies = detect(&bundle);
        assert_eq!(codes(&anomalies), vec![REPEATED_REFERENCE]);
        assert_eq!(anomalies[0].field_path, "purchase_order.po_number");
    }

    #[test]
    fn test_unmatched_line_items() {
        let bundle = bundle(
            &[
                ("line_items[0].description", "Widget"),
                ("line_items[1].description", "Gadget"),
            ],
            &[("line_items[0].description", "Widget")],
            &[],
        );
        let anomalies = detect(&bundle);
        assert_eq!(codes(&anomalies), vec![UNMATCHED_LINE_ITEM]);
        assert_eq!(anomalies[0].field_path, "invoice.line_items[1]");
        assert_eq!(anomalies[0].severity, Severity::Error);
    }

    #[test]
    fn test_undelivered_billing_line_is_unmatched() {
        let bundle = bundle(
            &[("line_items[0].description", "Widget"), ("line_items[0].quantity", "50")],
            &[],
            &[
                ("line_items[0].description", "Widget"),
                ("line_items[0].quantity", "30"),
                ("line_items[1].description", "Gadget"),
                ("line_items[1].quantity", "20"),
            ],
        );
        let anomalies = detect(&bundle);
        assert_eq!(codes(&anomalies), vec![UNMATCHED_LINE_ITEM]);
        assert_eq!(anomalies[0].field_path, "proof_of_delivery.line_items[1]");
    }

    #[test]
    fn test_line_item_math_out_of_range() {
        let bundle = bundle(
            &[
                ("line_items[0].quantity", "10000000000000"),
                ("line_items[0].unit_price", "$10000000000000000.00"),
                ("line_items[0].amount", "$1.00"),
            ],
            &[],
            &[],
        );
        let anomalies = detect(&bundle);
        let math = anomalies
            .iter()
            .find(|a| a.code == LINE_ITEM_MATH)
            .expect("line item math anomaly");
        assert_eq!(math.field_path, "invoice.line_items[0]");
        assert_eq!(math.expected_value.as_deref(), Some("out of range"));
    }

    #[test]
    fn test_party_names_match() {
        assert!(party_names_match("ABC Trading Pte. Ltd.", "abc trading"));
        assert!(party_names_match("Global Logistics Inc", "Global Freight Corp"));
        assert!(party_names_match("Unknown", "Anything Ltd"));
        assert!(!party_names_match("Acme Corp", "Globex Inc"));
    }

    #[test]
    fn test_party_name_mismatch() {
        let bundle = bundle(
            &[("payee_name", "Acme Corp"), ("payer_name", "Buyer Holdings")],
            &[("vendor_name", "Globex Inc"), ("buyer_name", "Buyer Holdings Ltd")],
            &[],
        );
        let anomalies = detect(&bundle);
        assert_eq!(codes(&anomalies), vec![PARTY_NAME_MISMATCH]);
        assert_eq!(anomalies[0].field_path, "invoice.payee_name");
    }

    #[test]
    fn test_underbilled() {
        let bundle = bundle(
            &[("total_amount", "$700.00")],
            &[("authorized_amount", "$1,000.00")],
            &[],
        );
        assert_eq!(codes(&detect(&bundle)), vec![AMOUNT_UNDERBILLED]);

        let bundle = crate::rules::testing::bundle(
            &[("total_amount", "$800.00")],
            &[("authorized_amount", "$1,000.00")],
            &[],
        );
        assert!(detect(&bundle).is_empty());
    }

    #[test]
    fn test_long_payment_term() {
        let bundle = bundle(
            &[("invoice_date", "2024-01-01"), ("due_date", "2024-12-31")],
            &[],
            &[],
        );
        let anomalies = detect(&bundle);
        assert_eq!(codes(&anomalies), vec![LONG_PAYMENT_TERM]);
        assert_eq!(anomalies[0].actual_value.as_deref(), Some("365 days"));
    }

    #[test]
    fn test_duplicate_and_near_duplicate_history() {
        let bundle = bundle(&[], &[], &[]);
        let mut prior = SubmissionRecord::new(
            &BundleHashes {
                invoice_hash: "sha256:test".to_string(),
                po_hash: "sha256:test".to_string(),
                pod_hash: "sha256:other".to_string(),
                bundle_hash: "sha256:previous".to_string(),
            },
            None,
        );
        let detector = AnomalyDetector::default();

        let anomalies = detector.detect(&bundle, std::slice::from_ref(&prior));
        assert_eq!(codes(&anomalies), vec![NEAR_DUPLICATE_BUNDLE]);

        prior.bundle_hash = "sha256:bundle".to_string();
        let anomalies = detector.detect(&bundle, &[prior]);
        assert_eq!(codes(&anomalies), vec![DUPLICATE_BUNDLE]);
        assert_eq!(anomalies[0].severity, Severity::Error);
    }

    #[test]
    fn test_amount_spike() {
        let bundle = bundle(&[("total_amount", "S$9,999.00")], &[], &[]);
        let sgd = Currency::from_code("SGD").unwrap();
        let usd = Currency::from_code("USD").unwrap();
        let hashes = BundleHashes::compute(b"a", b"b", b"c");
        let history = vec![
            SubmissionRecord::new(&hashes, Some(Money::from_minor(100_000, sgd.clone()))),
            SubmissionRecord::new(&hashes, Some(Money::from_minor(200_000, sgd))),
            SubmissionRecord::new(&hashes, Some(Money::from_minor(1, usd))),
        ];
        let anomalies = AnomalyDetector::default().detect(&bundle, &history);
        assert_eq!(codes(&anomalies), vec![AMOUNT_SPIKE]);
        assert_eq!(anomalies[0].expected_value.as_deref(), Some("1500.00"));
    }
}
