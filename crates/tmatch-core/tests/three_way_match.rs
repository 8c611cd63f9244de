//! End-to-end verification of plain-text document bundles.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;

use tmatch_core::anomaly::{LINE_ITEM_SUM_MISMATCH, ROUND_AMOUNT};
use tmatch_core::rules::{AMOUNT_AUTHORIZATION, DATE_SEQUENCE, PO_REFERENCE, QUANTITY_MATCH, RULE_ORDER};
use tmatch_core::{
    BundleError, BundleHashes, DocumentRole, DuplicateStore, EngineConfig, InMemoryDuplicateStore,
    TextFieldExtractor, TmatchError, VerificationEngine, VerificationRequest, VerificationStatus,
};

const WALLET: &str = "0x3f5CE5FBFe3E9af3971dD833D26bA9b5C936f0bE";

fn invoice(quantity: i64, unit_price: &str, total: &str, invoice_date: &str) -> String {
    format!(
        "TAX INVOICE\n\
         Invoice Number: INV-2024-001\n\
         Invoice Date: {invoice_date}\n\
         Due Date: February 5, 2024\n\
         Reference PO: PO-SG-2023-001\n\
         From: ABC Trading Pte Ltd\n\
         Bill To: XYZ Holdings Pte Ltd\n\
         Currency: SGD\n\
         \n\
         | Description | Qty | Unit Price | Amount |\n\
         |-------------|-----|------------|--------|\n\
         | Consulting Services | {quantity} | {unit_price} | {total} |\n\
         \n\
         TOTAL DUE: S${total}\n"
    )
}

fn purchase_order(quantity: i64, authorized: &str, po_date: &str) -> String {
    format!(
        "PURCHASE ORDER\n\
         PO Number: PO-SG-2023-001\n\
         PO Date: {po_date}\n\
         Buyer: XYZ Holdings Pte Ltd\n\
         Vendor: ABC Trading Pte Ltd\n\
         Currency: SGD\n\
         \n\
         | Description | Qty |\n\
         |---|---|\n\
         | Consulting Services | {quantity} |\n\
         \n\
         Total Authorized Amount: S${authorized}\n"
    )
}

fn delivery(quantity: i64) -> String {
    format!(
        "DELIVERY ORDER\n\
         Delivery Reference: DO-2024-001\n\
         PO Number: PO-SG-2023-001\n\
         Delivery Date: January 10, 2024\n\
         Received By: XYZ Holdings Pte Ltd\n\
         Total Quantity: {quantity} units\n"
    )
}

fn engine() -> VerificationEngine {
    VerificationEngine::new(EngineConfig::default()).unwrap()
}

fn verify(invoice: &str, po: &str, pod: &str) -> tmatch_core::VerificationResult {
    engine()
        .verify_bundle(invoice.as_bytes(), po.as_bytes(), pod.as_bytes(), WALLET, false)
        .unwrap()
}

fn valid_bundle() -> (String, String, String) {
    (
        invoice(1, "1,000.00", "1,000.00", "January 5, 2024"),
        purchase_order(1, "1,000.00", "January 2, 2024"),
        delivery(1),
    )
}

#[test]
fn test_matching_bundle_passes_without_anomalies() {
    let (inv, po, pod) = valid_bundle();
    let result = verify(&inv, &po, &pod);

    assert_eq!(result.status, VerificationStatus::Passed);
    let names: Vec<&str> = result.checks.iter().map(|c| c.rule_name.as_str()).collect();
    assert_eq!(names, RULE_ORDER.to_vec());
    assert!(result.all_checks_passed());
    assert!(result.anomalies.is_empty(), "{:?}", result.anomalies);
    assert!(result.review_flags.is_empty(), "{:?}", result.review_flags);

    let data = &result.extracted_data;
    assert_eq!(data.invoice_number.as_deref(), Some("INV-2024-001"));
    assert_eq!(data.total_amount.as_deref(), Some("1000.00"));
    assert_eq!(data.currency.as_deref(), Some("SGD"));
    assert_eq!(data.payee_name.as_deref(), Some("ABC Trading Pte Ltd"));
    assert_eq!(data.po_number.as_deref(), Some("PO-SG-2023-001"));
    assert_eq!(data.pod_reference.as_deref(), Some("DO-2024-001"));
    assert!(!result.verification_id.is_empty());
}

#[test]
fn test_amount_over_authorization_fails() {
    let result = verify(
        &invoice(1, "1,500.00", "1,500.00", "January 5, 2024"),
        &purchase_order(1, "1,000.00", "January 2, 2024"),
        &delivery(1),
    );
    assert_eq!(result.status, VerificationStatus::Failed);
    let check = result.check(AMOUNT_AUTHORIZATION).unwrap();
    assert!(!check.passed);
    assert_eq!(check.details["excess"], json!("500.00"));
    assert!(result.check(QUANTITY_MATCH).unwrap().passed);
}

#[test]
fn test_authorization_boundary() {
    let equal = verify(
        &invoice(8, "1,000.00", "8,000.00", "January 5, 2024"),
        &purchase_order(8, "8,000.00", "January 2, 2024"),
        &delivery(8),
    );
    assert!(equal.check(AMOUNT_AUTHORIZATION).unwrap().passed);
    assert_eq!(equal.status, VerificationStatus::Passed);

    let over = verify(
        &invoice(10, "1,000.00", "10,000.00", "January 5, 2024"),
        &purchase_order(10, "8,000.00", "January 2, 2024"),
        &delivery(10),
    );
    let check = over.check(AMOUNT_AUTHORIZATION).unwrap();
    assert!(!check.passed);
    assert_eq!(check.details["excess"], json!("2000.00"));
    assert!(over.anomaly(ROUND_AMOUNT).is_some());
}

#[test]
fn test_delivery_shortfall_fails() {
    let result = verify(
        &invoice(60, "10.00", "600.00", "January 5, 2024"),
        &purchase_order(60, "600.00", "January 2, 2024"),
        &delivery(40),
    );
    assert_eq!(result.status, VerificationStatus::Failed);
    let check = result.check(QUANTITY_MATCH).unwrap();
    assert!(!check.passed);
    assert_eq!(check.details["shortfall"], json!(20));
    assert!(result.check(AMOUNT_AUTHORIZATION).unwrap().passed);
}

#[test]
fn test_po_dated_after_invoice_fails() {
    let result = verify(
        &invoice(1, "1,000.00", "1,000.00", "January 5, 2024"),
        &purchase_order(1, "1,000.00", "January 8, 2024"),
        &delivery(1),
    );
    assert_eq!(result.status, VerificationStatus::Failed);
    assert!(!result.check(DATE_SEQUENCE).unwrap().passed);
    for rule in [QUANTITY_MATCH, AMOUNT_AUTHORIZATION, PO_REFERENCE] {
        assert!(result.check(rule).unwrap().passed, "{}", rule);
    }
}

#[test]
fn test_low_confidence_requires_review() {
    let (inv, po, pod) = valid_bundle();
    let result = engine()
        .with_extractor(TextFieldExtractor::new().with_label_confidence(0.7))
        .verify_bundle(inv.as_bytes(), po.as_bytes(), pod.as_bytes(), WALLET, false)
        .unwrap();

    assert!(result.all_checks_passed());
    assert_eq!(result.status, VerificationStatus::RequiresReview);
    assert!(result.review_flags.contains(&"invoice.total_amount".to_string()));
}

#[test]
fn test_advisory_flags_do_not_block() {
    let (inv, po, pod) = valid_bundle();
    let result = engine()
        .with_extractor(TextFieldExtractor::new().with_label_confidence(0.8))
        .verify_bundle(inv.as_bytes(), po.as_bytes(), pod.as_bytes(), WALLET, false)
        .unwrap();

    assert_eq!(result.status, VerificationStatus::Passed);
    assert!(result.review_flags.contains(&"purchase_order.authorized_amount".to_string()));
}

#[test]
fn test_line_items_not_adding_up_need_review() {
    let inv = invoice(1, "1,000.00", "1,000.00", "January 5, 2024")
        .replace("TOTAL DUE: S$1,000.00", "TOTAL DUE: S$900.00");
    let (_, po, pod) = valid_bundle();
    let result = verify(&inv, &po, &pod);

    assert!(result.all_checks_passed());
    assert!(result.has_error_anomalies());
    assert!(result.anomaly(LINE_ITEM_SUM_MISMATCH).is_some());
    assert_eq!(result.status, VerificationStatus::RequiresReview);
}

#[test]
fn test_missing_invoice_po_reference_is_flagged() {
    let (inv, po, pod) = valid_bundle();
    let inv = inv.replace("Reference PO: PO-SG-2023-001\n", "");
    let pod = pod.replace("PO Number: PO-SG-2023-001\n", "");
    let result = verify(&inv, &po, &pod);

    assert!(result.check(PO_REFERENCE).unwrap().passed);
    assert_eq!(result.status, VerificationStatus::Passed);
    assert_eq!(result.review_flags, vec!["invoice.po_reference".to_string()]);
}

#[test]
fn test_hashes_are_deterministic_and_role_bound() {
    let (inv, po, pod) = valid_bundle();
    let first = verify(&inv, &po, &pod);
    let second = verify(&inv, &po, &pod);
    assert_eq!(first.bundle_hash, second.bundle_hash);
    assert_eq!(first.invoice_hash, second.invoice_hash);
    assert_ne!(first.verification_id, second.verification_id);

    let expected = BundleHashes::compute(inv.as_bytes(), po.as_bytes(), pod.as_bytes());
    assert_eq!(first.bundle_hash, expected.bundle_hash);
    assert_eq!(first.pod_hash, expected.pod_hash);

    let reordered = VerificationRequest::new(WALLET)
        .with_document(DocumentRole::ProofOfDelivery, pod.clone())
        .with_document(DocumentRole::PurchaseOrder, po.clone())
        .with_document(DocumentRole::Invoice, inv.clone());
    let reordered = engine().verify(&reordered).unwrap();
    assert_eq!(reordered.bundle_hash, first.bundle_hash);

    let swapped = engine()
        .verify_bundle(po.as_bytes(), inv.as_bytes(), pod.as_bytes(), WALLET, false)
        .unwrap();
    assert_ne!(swapped.bundle_hash, first.bundle_hash);
    assert_eq!(swapped.status, VerificationStatus::Failed);
}

#[test]
fn test_duplicate_invoice_rejected() {
    let (inv, po, pod) = valid_bundle();
    let store = Arc::new(InMemoryDuplicateStore::new());
    let engine = engine().with_store(store.clone());

    let first = engine
        .verify_bundle(inv.as_bytes(), po.as_bytes(), pod.as_bytes(), WALLET, false)
        .unwrap();
    assert!(engine.record_submission(WALLET, &first));
    assert!(store.is_duplicate(&first.invoice_hash));

    let err = engine
        .verify_bundle(inv.as_bytes(), po.as_bytes(), pod.as_bytes(), WALLET, false)
        .unwrap_err();
    match err {
        TmatchError::Duplicate(dup) => assert_eq!(dup.invoice_hash, first.invoice_hash),
        other => panic!("expected duplicate, got {:?}", other),
    }

    let skipped = engine
        .verify_bundle(inv.as_bytes(), po.as_bytes(), pod.as_bytes(), WALLET, true)
        .unwrap();
    assert_eq!(skipped.bundle_hash, first.bundle_hash);
}

#[test]
fn test_malformed_bundles_rejected() {
    let (inv, po, _) = valid_bundle();
    let two = VerificationRequest::new(WALLET)
        .with_document(DocumentRole::Invoice, inv.clone())
        .with_document(DocumentRole::PurchaseOrder, po.clone());
    assert!(matches!(
        engine().verify(&two),
        Err(TmatchError::Bundle(BundleError::WrongDocumentCount(2)))
    ));

    let empty = two.with_document(DocumentRole::ProofOfDelivery, Vec::<u8>::new());
    assert!(matches!(
        engine().verify(&empty),
        Err(TmatchError::Bundle(BundleError::EmptyDocument(DocumentRole::ProofOfDelivery)))
    ));
}

#[test]
fn test_unreadable_document_fails_closed() {
    let (inv, po, _) = valid_bundle();
    let result = verify(&inv, &po, "scanned image, no text layer");

    assert_eq!(result.status, VerificationStatus::Failed);
    assert!(!result.check(QUANTITY_MATCH).unwrap().passed);
    assert!(!result.check(DATE_SEQUENCE).unwrap().passed);
    assert!(result
        .review_flags
        .contains(&"proof_of_delivery.delivery_date".to_string()));
}

#[test]
fn test_sequential_pipeline_matches_parallel() {
    let (inv, po, pod) = valid_bundle();
    let mut config = EngineConfig::default();
    config.pipeline.parallel_normalization = false;
    let sequential = VerificationEngine::new(config)
        .unwrap()
        .verify_bundle(inv.as_bytes(), po.as_bytes(), pod.as_bytes(), WALLET, false)
        .unwrap();
    let parallel = verify(&inv, &po, &pod);

    assert_eq!(sequential.checks, parallel.checks);
    assert_eq!(sequential.anomalies, parallel.anomalies);
    assert_eq!(sequential.status, parallel.status);
}

#[test]
fn test_huge_line_values_still_produce_a_result() {
    let inv = invoice(
        10_000_000_000_000,
        "10,000,000,000,000,000.00",
        "1.00",
        "January 5, 2024",
    );
    let result = verify(
        &inv,
        &purchase_order(1, "1,000.00", "January 2, 2024"),
        &delivery(1),
    );
    assert_eq!(result.status, VerificationStatus::Failed);
    assert_eq!(result.checks.len(), RULE_ORDER.len());
    assert!(!result.check(QUANTITY_MATCH).unwrap().passed);
}
