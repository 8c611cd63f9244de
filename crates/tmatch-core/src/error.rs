//! Error types for the tmatch-core library.

use thiserror::Error;

use crate::models::document::DocumentRole;
use crate::models::verification::InvalidTransition;

/// Main error type for the tmatch library.
///
/// Only conditions that prevent a verification from starting (or an
/// administrative rejection) are errors. Anything that goes wrong inside the
/// pipeline is recorded as data on the result instead.
#[derive(Error, Debug)]
pub enum TmatchError {
    /// The submitted bundle is malformed.
    #[error("invalid bundle: {0}")]
    Bundle(#[from] BundleError),

    /// Field extraction error outside the pipeline.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// The invoice was already submitted for financing.
    #[error("duplicate invoice: {0}")]
    Duplicate(#[from] DuplicateDetected),

    /// Status lifecycle violation.
    #[error("lifecycle error: {0}")]
    Lifecycle(#[from] InvalidTransition),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Malformed bundle input, rejected before any verification is created.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BundleError {
    /// A bundle holds exactly three documents.
    #[error("expected 3 documents, got {0}")]
    WrongDocumentCount(usize),

    /// No document was submitted for a role.
    #[error("missing {0} document")]
    MissingDocument(DocumentRole),

    /// Two documents were submitted for the same role.
    #[error("more than one {0} document")]
    DuplicateRole(DocumentRole),

    /// A document has no content.
    #[error("{0} document is empty")]
    EmptyDocument(DocumentRole),
}

/// Errors raised by field extractors.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// The document content could not be read at all.
    #[error("unreadable {role} document: {reason}")]
    Unreadable { role: DocumentRole, reason: String },

    /// The document was readable but not in the expected format.
    #[error("unexpected {role} document format: {reason}")]
    Format { role: DocumentRole, reason: String },

    /// JSON payload error.
    #[error("invalid extraction payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// A previously seen invoice hash.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invoice {invoice_hash} has already been submitted")]
pub struct DuplicateDetected {
    /// Content hash of the rejected invoice.
    pub invoice_hash: String,
}

/// Result type for the tmatch library.
pub type Result<T> = std::result::Result<T, TmatchError>;
