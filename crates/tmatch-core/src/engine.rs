//! Verification pipeline.
//!
//! Extractor -> Normalizer -> {Rule Engine, Anomaly Detector} -> Hash Guard
//! -> Verdict Aggregator. The engine holds no per-request state; the only
//! state shared between requests is the optional duplicate store behind the
//! [`HashGuard`].

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::anomaly::AnomalyDetector;
use crate::error::{BundleError, DuplicateDetected, Result};
use crate::extract::{AutoFieldExtractor, FieldExtractor};
use crate::hashing::{BundleHashes, DuplicateStore, HashGuard, SubmissionRecord};
use crate::models::config::EngineConfig;
use crate::models::document::DocumentRole;
use crate::models::record::{DocumentBundle, DocumentRecord};
use crate::models::value::{Currency, Money};
use crate::models::verification::{VerificationResult, VerificationStatus};
use crate::normalize::Normalizer;
use crate::rules::RuleEngine;
use crate::verdict::{extracted_data, VerdictAggregator};

/// One bundle submitted for verification.
#[derive(Debug, Clone, Default)]
pub struct VerificationRequest {
    /// Documents tagged with their role, in upload order.
    pub documents: Vec<(DocumentRole, Vec<u8>)>,
    pub wallet_address: String,
    pub skip_duplicate_check: bool,
}

impl VerificationRequest {
    pub fn new(wallet_address: impl Into<String>) -> Self {
        Self {
            documents: Vec::new(),
            wallet_address: wallet_address.into(),
            skip_duplicate_check: false,
        }
    }

    /// Request holding the three documents in role order.
    pub fn from_documents(
        invoice: impl Into<Vec<u8>>,
        po: impl Into<Vec<u8>>,
        pod: impl Into<Vec<u8>>,
        wallet_address: impl Into<String>,
    ) -> Self {
        Self::new(wallet_address)
            .with_document(DocumentRole::Invoice, invoice)
            .with_document(DocumentRole::PurchaseOrder, po)
            .with_document(DocumentRole::ProofOfDelivery, pod)
    }

    pub fn with_document(mut self, role: DocumentRole, content: impl Into<Vec<u8>>) -> Self {
        self.documents.push((role, content.into()));
        self
    }

    pub fn with_skip_duplicate_check(mut self, skip: bool) -> Self {
        self.skip_duplicate_check = skip;
        self
    }

    /// Document contents in fixed role order.
    ///
    /// Rejects a bundle that does not hold exactly one non-empty document
    /// per role.
    pub fn validate(&self) -> std::result::Result<[&[u8]; 3], BundleError> {
        if self.documents.len() != 3 {
            return Err(BundleError::WrongDocumentCount(self.documents.len()));
        }
        let mut ordered: [Option<&[u8]>; 3] = [None; 3];
        for (role, content) in &self.documents {
            let slot = &mut ordered[role_index(*role)];
            if slot.is_some() {
                return Err(BundleError::DuplicateRole(*role));
            }
            *slot = Some(content.as_slice());
        }

        let mut contents: [&[u8]; 3] = [&[]; 3];
        for role in DocumentRole::ALL {
            let content = ordered[role_index(role)].ok_or(BundleError::MissingDocument(role))?;
            if content.iter().all(u8::is_ascii_whitespace) {
                return Err(BundleError::EmptyDocument(role));
            }
            contents[role_index(role)] = content;
        }
        Ok(contents)
    }
}

fn role_index(role: DocumentRole) -> usize {
    match role {
        DocumentRole::Invoice => 0,
        DocumentRole::PurchaseOrder => 1,
        DocumentRole::ProofOfDelivery => 2,
    }
}

/// First 12 hex characters of a rendered hash, for logs.
fn short_hash(hash: &str) -> &str {
    let hex = hash.strip_prefix(crate::hashing::HASH_PREFIX).unwrap_or(hash);
    hex.get(..12).unwrap_or(hex)
}

/// The 3-way match verification engine.
pub struct VerificationEngine {
    config: EngineConfig,
    normalizer: Normalizer,
    extractor: Box<dyn FieldExtractor + Send + Sync>,
    guard: HashGuard,
    rules: RuleEngine,
    detector: AnomalyDetector,
    aggregator: VerdictAggregator,
}

impl VerificationEngine {
    /// Create an engine with the automatic extractor and no duplicate store.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            normalizer: Normalizer::new(&config.normalization)?,
            extractor: Box::new(AutoFieldExtractor::new()),
            guard: HashGuard::new(),
            rules: RuleEngine::new(),
            detector: AnomalyDetector::new(&config.anomaly),
            aggregator: VerdictAggregator::new(&config.review),
            config,
        })
    }

    /// Use `extractor` to read documents.
    pub fn with_extractor(mut self, extractor: impl FieldExtractor + Send + Sync + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    pub fn with_guard(mut self, guard: HashGuard) -> Self {
        self.guard = guard;
        self
    }

    /// Back the duplicate guard with `store`.
    pub fn with_store(self, store: Arc<dyn DuplicateStore>) -> Self {
        self.with_guard(HashGuard::with_store(store))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn guard(&self) -> &HashGuard {
        &self.guard
    }

    /// Verify three documents given in role order.
    pub fn verify_bundle(
        &self,
        invoice: &[u8],
        po: &[u8],
        pod: &[u8],
        wallet_address: &str,
        skip_duplicate_check: bool,
    ) -> Result<VerificationResult> {
        let request = VerificationRequest::from_documents(invoice, po, pod, wallet_address)
            .with_skip_duplicate_check(skip_duplicate_check);
        self.verify(&request)
    }

    /// Run the full pipeline.
    ///
    /// Returns an error only for a malformed bundle or, with a duplicate
    /// store configured, an invoice that was already claimed. Every other
    /// problem is reported inside the result.
    pub fn verify(&self, request: &VerificationRequest) -> Result<VerificationResult> {
        let start = Instant::now();
        let [invoice, po, pod] = request.validate()?;
        let hashes = BundleHashes::compute(invoice, po, pod);
        let status = VerificationStatus::Pending;

        info!(
            "Verifying bundle {} (invoice {}) for wallet {}",
            short_hash(&hashes.bundle_hash),
            short_hash(&hashes.invoice_hash),
            request.wallet_address
        );

        if !request.skip_duplicate_check && self.guard.is_duplicate(&hashes.invoice_hash) {
            warn!("Rejecting duplicate invoice {}", short_hash(&hashes.invoice_hash));
            return Err(DuplicateDetected {
                invoice_hash: hashes.invoice_hash,
            }
            .into());
        }

        let status = status.advance(VerificationStatus::Processing)?;
        debug!("Status -> {}", status);

        let bundle = self.normalize_bundle([invoice, po, pod], &hashes);
        let parallel = self.config.pipeline.parallel_normalization;
        let outcomes = self.rules.evaluate(&bundle, parallel);
        let history = self.guard.prior_submissions(&request.wallet_address);
        let anomalies = self.detector.detect(&bundle, &history);
        let verdict = self.aggregator.aggregate(&bundle, &outcomes, &anomalies);

        let status = status.advance(verdict.status)?;
        info!(
            "Bundle {} {}: {}/{} checks passed, {} anomalies, {} review flags in {} ms",
            short_hash(&hashes.bundle_hash),
            status,
            outcomes.iter().filter(|o| o.check.passed).count(),
            outcomes.len(),
            anomalies.len(),
            verdict.review_flags.len(),
            start.elapsed().as_millis()
        );

        Ok(VerificationResult {
            verification_id: Uuid::new_v4().to_string(),
            status,
            checks: outcomes.into_iter().map(|o| o.check).collect(),
            anomalies,
            review_flags: verdict.review_flags,
            extracted_data: extracted_data(&bundle),
            invoice_hash: hashes.invoice_hash,
            po_hash: hashes.po_hash,
            pod_hash: hashes.pod_hash,
            bundle_hash: hashes.bundle_hash,
            created_at: Utc::now(),
        })
    }

    /// Claim the invoice hash of a verified bundle and append it to the
    /// wallet's history. Returns `false` if the invoice was claimed before.
    pub fn record_submission(&self, wallet_address: &str, result: &VerificationResult) -> bool {
        if !self.guard.claim(&result.invoice_hash) {
            warn!("Invoice {} was already claimed", short_hash(&result.invoice_hash));
            return false;
        }
        let hashes = BundleHashes {
            invoice_hash: result.invoice_hash.clone(),
            po_hash: result.po_hash.clone(),
            pod_hash: result.pod_hash.clone(),
            bundle_hash: result.bundle_hash.clone(),
        };
        let data = &result.extracted_data;
        let total = data
            .total_amount
            .as_deref()
            .zip(data.currency.as_deref())
            .and_then(|(amount, code)| {
                let amount: Decimal = amount.parse().ok()?;
                Money::from_decimal(amount, Currency::from_code(code)?).map(|(m, _)| m)
            });
        self.guard
            .record_submission(wallet_address, SubmissionRecord::new(&hashes, total));
        true
    }

    /// Extract and normalize the three documents, concurrently when the
    /// pipeline allows it.
    fn normalize_bundle(&self, contents: [&[u8]; 3], hashes: &BundleHashes) -> DocumentBundle {
        let content_hashes = [&hashes.invoice_hash, &hashes.po_hash, &hashes.pod_hash];
        let jobs: Vec<(DocumentRole, &[u8], &str)> = DocumentRole::ALL
            .into_iter()
            .zip(contents)
            .zip(content_hashes)
            .map(|((role, content), hash)| (role, content, hash.as_str()))
            .collect();

        let mut records: Vec<DocumentRecord> = if self.config.pipeline.parallel_normalization {
            std::thread::scope(|scope| {
                let handles: Vec<_> = jobs
                    .iter()
                    .map(|(role, content, hash)| {
                        scope.spawn(move || self.process_document(*role, content, hash))
                    })
                    .collect();
                handles
                    .into_iter()
                    .zip(&jobs)
                    .map(|(handle, (role, _, hash))| {
                        handle.join().unwrap_or_else(|_| {
                            warn!("Normalization of {} document panicked", role);
                            DocumentRecord::new(*role, *hash)
                        })
                    })
                    .collect()
            })
        } else {
            jobs.iter()
                .map(|(role, content, hash)| self.process_document(*role, content, hash))
                .collect()
        };

        let proof_of_delivery = records.pop().unwrap_or_else(|| {
            DocumentRecord::new(DocumentRole::ProofOfDelivery, hashes.pod_hash.clone())
        });
        let purchase_order = records.pop().unwrap_or_else(|| {
            DocumentRecord::new(DocumentRole::PurchaseOrder, hashes.po_hash.clone())
        });
        let invoice = records
            .pop()
            .unwrap_or_else(|| DocumentRecord::new(DocumentRole::Invoice, hashes.invoice_hash.clone()));

        DocumentBundle {
            invoice,
            purchase_order,
            proof_of_delivery,
            bundle_hash: hashes.bundle_hash.clone(),
        }
    }

    /// Extractor failures are logged and yield an empty record; the missing
    /// fields then surface as review flags and failed checks.
    fn process_document(&self, role: DocumentRole, content: &[u8], hash: &str) -> DocumentRecord {
        let raw = match self.extractor.extract(role, content) {
            Ok(fields) => fields,
            Err(e) => {
                warn!("{} extractor failed on {} document: {}", self.extractor.name(), role, e);
                Vec::new()
            }
        };
        let record = self.normalizer.normalize_document(role, hash, &raw);
        info!(
            "Normalized {} document: {} fields, {} line items",
            role,
            record.fields.len(),
            record.line_items.len()
        );
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TmatchError;
    use crate::extract::FixedFieldExtractor;
    use crate::hashing::InMemoryDuplicateStore;

    fn engine() -> VerificationEngine {
        VerificationEngine::new(EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_validate_rejects_malformed_bundles() {
        let two = VerificationRequest::new("w")
            .with_document(DocumentRole::Invoice, "a")
            .with_document(DocumentRole::PurchaseOrder, "b");
        assert_eq!(two.validate().unwrap_err(), BundleError::WrongDocumentCount(2));

        let repeated = two.clone().with_document(DocumentRole::Invoice, "c");
        assert_eq!(
            repeated.validate().unwrap_err(),
            BundleError::DuplicateRole(DocumentRole::Invoice)
        );

        let empty = two.with_document(DocumentRole::ProofOfDelivery, " \n");
        assert_eq!(
            empty.validate().unwrap_err(),
            BundleError::EmptyDocument(DocumentRole::ProofOfDelivery)
        );
    }

    #[test]
    fn test_validate_orders_by_role() {
        let request = VerificationRequest::new("w")
            .with_document(DocumentRole::ProofOfDelivery, "pod")
            .with_document(DocumentRole::Invoice, "inv")
            .with_document(DocumentRole::PurchaseOrder, "po");
        let [invoice, po, pod] = request.validate().unwrap();
        assert_eq!((invoice, po, pod), (&b"inv"[..], &b"po"[..], &b"pod"[..]));
    }

    #[test]
    fn test_short_hash() {
        assert_eq!(short_hash("sha256:0123456789abcdef"), "0123456789ab");
        assert_eq!(short_hash("abc"), "abc");
    }

    #[test]
    fn test_unreadable_documents_fail_closed() {
        let result = engine()
            .with_extractor(FixedFieldExtractor::new())
            .verify_bundle(b"x", b"y", b"z", "0xabc", false)
            .unwrap();
        assert_eq!(result.status, VerificationStatus::Failed);
        assert_eq!(result.checks.len(), 4);
        assert!(result.review_flags.contains(&"invoice.total_amount".to_string()));
    }

    #[test]
    fn test_record_submission_claims_once() {
        let store = Arc::new(InMemoryDuplicateStore::new());
        let engine = engine()
            .with_extractor(FixedFieldExtractor::new().with_values(
                DocumentRole::Invoice,
                &[("total_amount", "S$1,000.00")],
                0.95,
            ))
            .with_store(store.clone());

        let result = engine.verify_bundle(b"inv", b"po", b"pod", "0xabc", false).unwrap();
        assert!(engine.record_submission("0xabc", &result));
        assert!(!engine.record_submission("0xabc", &result));

        let history = store.prior_submissions("0xabc");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].total.as_ref().map(|m| m.minor_units()), Some(100_000));

        let err = engine
            .verify_bundle(b"inv", b"po", b"pod", "0xabc", false)
            .unwrap_err();
        assert!(matches!(err, TmatchError::Duplicate(_)));

        let rerun = engine.verify_bundle(b"inv", b"po", b"pod", "0xabc", true).unwrap();
        assert!(rerun.anomaly(crate::anomaly::DUPLICATE_BUNDLE).is_some());
    }
}
