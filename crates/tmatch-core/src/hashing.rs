//! Content hashing and the duplicate-financing guard.
//!
//! Document hashes are SHA-256 over the document's raw bytes, never over
//! extracted text, so OCR nondeterminism cannot change them. The bundle hash
//! is SHA-256 over the three 32-byte document digests in the fixed order
//! Invoice, PO, POD.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::value::Money;

/// Prefix of every rendered hash.
pub const HASH_PREFIX: &str = "sha256:";

/// SHA-256 digest of `content`.
pub fn digest(content: &[u8]) -> [u8; 32] {
    Sha256::digest(content).into()
}

/// Render a digest as `sha256:<hex>`.
pub fn render(digest: &[u8; 32]) -> String {
    format!("{}{}", HASH_PREFIX, hex::encode(digest))
}

/// Content hash of a document's raw bytes, e.g. `sha256:9f86d0...`.
pub fn content_hash(content: &[u8]) -> String {
    render(&digest(content))
}

/// Bundle digest from the three document digests in fixed role order.
pub fn bundle_digest(invoice: &[u8; 32], po: &[u8; 32], pod: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(invoice);
    hasher.update(po);
    hasher.update(pod);
    hasher.finalize().into()
}

/// Check `content` against an expected hash. The `sha256:` prefix is
/// optional and hex case is ignored.
pub fn verify_hash(content: &[u8], expected: &str) -> bool {
    let expected = expected.trim();
    let expected = expected.strip_prefix(HASH_PREFIX).unwrap_or(expected);
    hex::encode(digest(content)).eq_ignore_ascii_case(expected)
}

/// Hashes of one bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleHashes {
    pub invoice_hash: String,
    pub po_hash: String,
    pub pod_hash: String,
    pub bundle_hash: String,
}

impl BundleHashes {
    /// Hash the three documents, each passed in its role.
    pub fn compute(invoice: &[u8], po: &[u8], pod: &[u8]) -> Self {
        let (i, p, d) = (digest(invoice), digest(po), digest(pod));
        Self {
            invoice_hash: render(&i),
            po_hash: render(&p),
            pod_hash: render(&d),
            bundle_hash: render(&bundle_digest(&i, &p, &d)),
        }
    }

    /// Number of document hashes shared with `other`.
    pub fn shared_documents(&self, other: &SubmissionRecord) -> usize {
        [
            self.invoice_hash == other.invoice_hash,
            self.po_hash == other.po_hash,
            self.pod_hash == other.pod_hash,
        ]
        .into_iter()
        .filter(|same| *same)
        .count()
    }
}

/// A bundle previously submitted from a wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub bundle_hash: String,
    pub invoice_hash: String,
    pub po_hash: String,
    pub pod_hash: String,
    /// Invoice total, when it could be read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<Money>,
    pub recorded_at: DateTime<Utc>,
}

impl SubmissionRecord {
    pub fn new(hashes: &BundleHashes, total: Option<Money>) -> Self {
        Self {
            bundle_hash: hashes.bundle_hash.clone(),
            invoice_hash: hashes.invoice_hash.clone(),
            po_hash: hashes.po_hash.clone(),
            pod_hash: hashes.pod_hash.clone(),
            total,
            recorded_at: Utc::now(),
        }
    }
}

/// Index of invoice hashes already financed, plus optional per-wallet
/// submission history.
///
/// Implementations must give `claim` at-most-once semantics per hash under
/// concurrent callers.
pub trait DuplicateStore: Send + Sync {
    /// Whether `invoice_hash` was claimed before.
    fn is_duplicate(&self, invoice_hash: &str) -> bool;

    /// Claim `invoice_hash`. Returns `false` if it was already claimed.
    fn claim(&self, invoice_hash: &str) -> bool;

    /// Prior submissions from `wallet`, oldest first.
    fn prior_submissions(&self, _wallet: &str) -> Vec<SubmissionRecord> {
        Vec::new()
    }

    /// Append a submission to `wallet`'s history.
    fn record_submission(&self, _wallet: &str, _submission: SubmissionRecord) {}
}

/// [`DuplicateStore`] held in memory behind mutexes.
#[derive(Debug, Default)]
pub struct InMemoryDuplicateStore {
    hashes: Mutex<HashSet<String>>,
    submissions: Mutex<HashMap<String, Vec<SubmissionRecord>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl InMemoryDuplicateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-loaded with claimed hashes.
    pub fn with_hashes<I, S>(hashes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hashes: Mutex::new(hashes.into_iter().map(Into::into).collect()),
            submissions: Mutex::default(),
        }
    }

    /// Claimed hashes, sorted.
    pub fn hashes(&self) -> Vec<String> {
        let mut hashes: Vec<String> = lock(&self.hashes).iter().cloned().collect();
        hashes.sort();
        hashes
    }

    pub fn len(&self) -> usize {
        lock(&self.hashes).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DuplicateStore for InMemoryDuplicateStore {
    fn is_duplicate(&self, invoice_hash: &str) -> bool {
        lock(&self.hashes).contains(invoice_hash)
    }

    fn claim(&self, invoice_hash: &str) -> bool {
        lock(&self.hashes).insert(invoice_hash.to_string())
    }

    fn prior_submissions(&self, wallet: &str) -> Vec<SubmissionRecord> {
        lock(&self.submissions)
            .get(wallet)
            .cloned()
            .unwrap_or_default()
    }

    fn record_submission(&self, wallet: &str, submission: SubmissionRecord) {
        lock(&self.submissions)
            .entry(wallet.to_string())
            .or_default()
            .push(submission);
    }
}

/// Query hook over an optional [`DuplicateStore`].
///
/// Without a store every hash is new and there is no history. The guard only
/// reads during verification; persisting a hash is the caller's decision.
#[derive(Clone, Default)]
pub struct HashGuard {
    store: Option<Arc<dyn DuplicateStore>>,
}

impl std::fmt::Debug for HashGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashGuard")
            .field("store", &self.store.is_some())
            .finish()
    }
}

impl HashGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(store: Arc<dyn DuplicateStore>) -> Self {
        Self { store: Some(store) }
    }

    /// Always `false` when no store is configured.
    pub fn is_duplicate(&self, invoice_hash: &str) -> bool {
        self.store
            .as_ref()
            .is_some_and(|store| store.is_duplicate(invoice_hash))
    }

    /// Claim a hash in the store. Always succeeds without a store.
    pub fn claim(&self, invoice_hash: &str) -> bool {
        self.store
            .as_ref()
            .is_none_or(|store| store.claim(invoice_hash))
    }

    pub fn prior_submissions(&self, wallet: &str) -> Vec<SubmissionRecord> {
        self.store
            .as_ref()
            .map(|store| store.prior_submissions(wallet))
            .unwrap_or_default()
    }

    pub fn record_submission(&self, wallet: &str, submission: SubmissionRecord) {
        if let Some(store) = &self.store {
            store.record_submission(wallet, submission);
        }
    }
}
