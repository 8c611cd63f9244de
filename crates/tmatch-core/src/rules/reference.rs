//! po_reference: the invoice points at the submitted purchase order.

use crate::models::document::DocumentRole;
use crate::models::record::{fields, DocumentBundle};
use crate::models::verification::CheckResult;
use crate::normalize::text::identifiers_equal;

use super::{Inputs, Rule, RuleOutcome, PO_REFERENCE};

/// The invoice PO reference, when present, must equal the PO's own number
/// (ignoring case, whitespace and a leading `#`). A missing reference is an
/// advisory review flag rather than a failure. A PO reference on the proof
/// of delivery must match as well.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoReferenceRule;

impl Rule for PoReferenceRule {
    fn name(&self) -> &'static str {
        PO_REFERENCE
    }

    fn evaluate(&self, bundle: &DocumentBundle) -> RuleOutcome {
        let invoice_ref_path = bundle.invoice.path(fields::PO_REFERENCE);
        let invoice_has_ref = bundle.invoice.field(fields::PO_REFERENCE).is_some();
        let pod_has_ref = bundle.proof_of_delivery.field(fields::PO_REFERENCE).is_some();

        if !invoice_has_ref && !pod_has_ref {
            let check = CheckResult::pass(
                PO_REFERENCE,
                "Invoice carries no PO reference; manual confirmation advised",
            );
            return RuleOutcome::new(check, Vec::new()).with_review_flag(invoice_ref_path);
        }

        let mut inputs = Inputs::new(bundle);
        let po_number = inputs.identifier(DocumentRole::PurchaseOrder, fields::PO_NUMBER);
        let invoice_ref = if invoice_has_ref {
            inputs.identifier(DocumentRole::Invoice, fields::PO_REFERENCE)
        } else {
            None
        };
        let pod_ref = if pod_has_ref {
            inputs.identifier(DocumentRole::ProofOfDelivery, fields::PO_REFERENCE)
        } else {
            None
        };

        if inputs.has_missing() {
            let mut outcome = inputs.fail_missing(PO_REFERENCE);
            if !invoice_has_ref {
                outcome = outcome.with_review_flag(invoice_ref_path);
            }
            return outcome;
        }
        let Some(po_number) = po_number else {
            return inputs.fail_missing(PO_REFERENCE);
        };

        let mismatched: Vec<(DocumentRole, &str)> = [
            (DocumentRole::Invoice, invoice_ref),
            (DocumentRole::ProofOfDelivery, pod_ref),
        ]
        .into_iter()
        .filter_map(|(role, reference)| reference.map(|r| (role, r)))
        .filter(|(_, reference)| !identifiers_equal(reference, po_number))
        .collect();

        let check = match mismatched.first() {
            None => CheckResult::pass(
                PO_REFERENCE,
                format!("PO reference matches purchase order {}", po_number),
            ),
            Some((role, reference)) => CheckResult::fail(
                PO_REFERENCE,
                format!(
                    "{} references PO {} but purchase order number is {}",
                    role, reference, po_number
                ),
            )
            .detail("expected", po_number)
            .detail("actual", *reference)
            .detail(
                "mismatched_documents",
                mismatched
                    .iter()
                    .map(|(role, _)| role.as_str())
                    .collect::<Vec<_>>(),
            ),
        };

        let mut outcome = inputs.finish(check);
        if !invoice_has_ref {
            outcome = outcome.with_review_flag(invoice_ref_path);
        }
        outcome
    }
}
