//! Verdict aggregation: one terminal status plus the review flags.

use std::collections::HashSet;

use tracing::debug;

use crate::models::config::ReviewConfig;
use crate::models::record::{fields, DocumentBundle, DocumentRecord};
use crate::models::verification::{Anomaly, ExtractedData, Severity, VerificationStatus};
use crate::rules::RuleOutcome;

/// Final status and review flags of one verification.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub status: VerificationStatus,
    pub review_flags: Vec<String>,
}

/// Combines check results, anomaly severities and field confidence.
#[derive(Debug, Clone, Default)]
pub struct VerdictAggregator {
    config: ReviewConfig,
}

impl VerdictAggregator {
    pub fn new(config: &ReviewConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn aggregate(
        &self,
        bundle: &DocumentBundle,
        outcomes: &[RuleOutcome],
        anomalies: &[Anomaly],
    ) -> Verdict {
        Verdict {
            status: self.status(outcomes, anomalies),
            review_flags: self.review_flags(bundle, outcomes),
        }
    }

    /// Terminal status.
    ///
    /// Any failed check fails the verification. Otherwise a field consumed
    /// by a passing check below the hard threshold, or an `error` anomaly,
    /// sends it to review.
    pub fn status(&self, outcomes: &[RuleOutcome], anomalies: &[Anomaly]) -> VerificationStatus {
        if let Some(failed) = outcomes.iter().find(|o| !o.check.passed) {
            debug!("Verdict failed: {} did not pass", failed.check.rule_name);
            return VerificationStatus::Failed;
        }

        let low_confidence = outcomes
            .iter()
            .flat_map(|o| o.consumed.iter())
            .find(|field| field.confidence < self.config.hard_threshold);
        if let Some(field) = low_confidence {
            debug!(
                "Verdict requires review: {} has confidence {:.2}",
                field.path, field.confidence
            );
            return VerificationStatus::RequiresReview;
        }

        if let Some(anomaly) = anomalies.iter().find(|a| a.severity == Severity::Error) {
            debug!("Verdict requires review: {} anomaly", anomaly.code);
            return VerificationStatus::RequiresReview;
        }

        VerificationStatus::Passed
    }

    /// Field paths needing a human look, in role order without duplicates:
    /// fields below the advisory threshold, then required fields no
    /// extractor found, then paths flagged by rules.
    pub fn review_flags(&self, bundle: &DocumentBundle, outcomes: &[RuleOutcome]) -> Vec<String> {
        let mut flags = Vec::new();
        for record in bundle.records() {
            flags.extend(
                record
                    .all_fields()
                    .into_iter()
                    .filter(|(_, field)| field.below(self.config.advisory_threshold))
                    .map(|(path, _)| path),
            );
        }
        for record in bundle.records() {
            flags.extend(record.missing_required().into_iter().map(|name| record.path(name)));
        }
        flags.extend(outcomes.iter().flat_map(|o| o.review_flags.iter().cloned()));

        let mut seen = HashSet::new();
        flags.retain(|path| seen.insert(path.clone()));
        flags
    }
}

fn display(record: &DocumentRecord, name: &str) -> Option<String> {
    record.value(name).map(|v| v.display())
}

/// Header summary of the bundle for display.
pub fn extracted_data(bundle: &DocumentBundle) -> ExtractedData {
    let invoice = &bundle.invoice;
    let total = invoice.money(fields::TOTAL_AMOUNT);
    ExtractedData {
        invoice_number: display(invoice, fields::INVOICE_NUMBER),
        total_amount: total.map(|m| m.amount_string()),
        currency: total
            .map(|m| m.currency())
            .or_else(|| invoice.currency())
            .map(|c| c.code().to_string()),
        invoice_date: invoice.date(fields::INVOICE_DATE),
        due_date: invoice.date(fields::DUE_DATE),
        payee_name: display(invoice, fields::PAYEE_NAME),
        payer_name: display(invoice, fields::PAYER_NAME),
        po_number: display(&bundle.purchase_order, fields::PO_NUMBER)
            .or_else(|| display(invoice, fields::PO_REFERENCE)),
        pod_reference: display(&bundle.proof_of_delivery, fields::DELIVERY_REFERENCE),
    }
}
