//! Core library for 3-way match verification of trade documents.
//!
//! This crate provides:
//! - Field extraction adapters (labelled text, JSON extraction payloads)
//! - Normalization of amounts, dates, quantities and identifiers
//! - The 3-way match rules across Invoice, Purchase Order and Proof of Delivery
//! - Anomaly detection and confidence-based review flagging
//! - Content hashing and a duplicate-financing guard

pub mod anomaly;
pub mod engine;
pub mod error;
pub mod extract;
pub mod hashing;
pub mod models;
pub mod normalize;
pub mod rules;
pub mod verdict;

pub use anomaly::AnomalyDetector;
pub use engine::{VerificationEngine, VerificationRequest};
pub use error::{BundleError, DuplicateDetected, ExtractionError, Result, TmatchError};
pub use extract::{AutoFieldExtractor, FieldExtractor, FixedFieldExtractor, JsonFieldExtractor, TextFieldExtractor};
pub use hashing::{BundleHashes, DuplicateStore, HashGuard, InMemoryDuplicateStore, SubmissionRecord};
pub use models::config::EngineConfig;
pub use models::document::{DocumentRole, RawField};
pub use models::value::{Currency, FieldValue, Money, NormalizedField};
pub use models::verification::{
    Anomaly, CheckResult, ExtractedData, Severity, VerificationResult, VerificationStatus,
};
pub use normalize::Normalizer;
pub use rules::RuleEngine;
pub use verdict::VerdictAggregator;
