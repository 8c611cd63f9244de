//! Verification output: checks, anomalies, status and the final result.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outcome of one named rule. Produced once per rule per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub rule_name: String,
    pub passed: bool,
    pub message: String,
    #[serde(default)]
    pub details: BTreeMap<String, serde_json::Value>,
}

impl CheckResult {
    pub fn pass(rule_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule_name: rule_name.into(),
            passed: true,
            message: message.into(),
            details: BTreeMap::new(),
        }
    }

    pub fn fail(rule_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule_name: rule_name.into(),
            passed: false,
            message: message.into(),
            details: BTreeMap::new(),
        }
    }

    /// Add a detail entry.
    pub fn detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

/// Anomaly severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// A signal that warrants scrutiny. Does not fail a verification by itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anomaly {
    pub code: String,
    pub message: String,
    pub severity: Severity,
    pub field_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_value: Option<String>,
}

impl Anomaly {
    pub fn warning(code: &str, message: impl Into<String>, field_path: impl Into<String>) -> Self {
        Self::new(code, message, Severity::Warning, field_path)
    }

    pub fn error(code: &str, message: impl Into<String>, field_path: impl Into<String>) -> Self {
        Self::new(code, message, Severity::Error, field_path)
    }

    fn new(
        code: &str,
        message: impl Into<String>,
        severity: Severity,
        field_path: impl Into<String>,
    ) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            severity,
            field_path: field_path.into(),
            expected_value: None,
            actual_value: None,
        }
    }

    pub fn with_values(mut self, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        self.expected_value = Some(expected.into());
        self.actual_value = Some(actual.into());
        self
    }
}

/// Lifecycle of a verification.
///
/// `Pending -> Processing -> {Passed | Failed | RequiresReview}`. Terminal
/// states never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Processing,
    Passed,
    Failed,
    RequiresReview,
}

/// Attempted move between two statuses that the lifecycle does not allow.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid status transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: VerificationStatus,
    pub to: VerificationStatus,
}

impl VerificationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            VerificationStatus::Passed | VerificationStatus::Failed | VerificationStatus::RequiresReview
        )
    }

    /// Move to `next` if the lifecycle allows it.
    pub fn advance(self, next: VerificationStatus) -> Result<VerificationStatus, InvalidTransition> {
        let allowed = match (self, next) {
            (VerificationStatus::Pending, VerificationStatus::Processing) => true,
            (VerificationStatus::Processing, n) => n.is_terminal(),
            _ => false,
        };
        if allowed {
            Ok(next)
        } else {
            Err(InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Processing => "processing",
            VerificationStatus::Passed => "passed",
            VerificationStatus::Failed => "failed",
            VerificationStatus::RequiresReview => "requires_review",
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display summary of the extracted header fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedData {
    pub invoice_number: Option<String>,
    pub total_amount: Option<String>,
    pub currency: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub payee_name: Option<String>,
    pub payer_name: Option<String>,
    pub po_number: Option<String>,
    pub pod_reference: Option<String>,
}

/// Complete result of one verification request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub verification_id: String,
    pub status: VerificationStatus,
    pub checks: Vec<CheckResult>,
    pub anomalies: Vec<Anomaly>,
    pub review_flags: Vec<String>,
    pub extracted_data: ExtractedData,
    pub invoice_hash: String,
    pub po_hash: String,
    pub pod_hash: String,
    pub bundle_hash: String,
    pub created_at: DateTime<Utc>,
}

impl VerificationResult {
    pub fn all_checks_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn has_error_anomalies(&self) -> bool {
        self.anomalies.iter().any(|a| a.severity == Severity::Error)
    }

    pub fn check(&self, rule_name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.rule_name == rule_name)
    }

    pub fn anomaly(&self, code: &str) -> Option<&Anomaly> {
        self.anomalies.iter().find(|a| a.code == code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_lifecycle() {
        let s = VerificationStatus::Pending;
        let s = s.advance(VerificationStatus::Processing).unwrap();
        let s = s.advance(VerificationStatus::RequiresReview).unwrap();
        assert!(s.is_terminal());
        assert!(s.advance(VerificationStatus::Passed).is_err());
    }

    #[test]
    fn test_status_cannot_skip_processing() {
        let err = VerificationStatus::Pending
            .advance(VerificationStatus::Passed)
            .unwrap_err();
        assert_eq!(err.from, VerificationStatus::Pending);
        assert_eq!(err.to, VerificationStatus::Passed);
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&VerificationStatus::RequiresReview).unwrap();
        assert_eq!(json, "\"requires_review\"");
    }

    #[test]
    fn test_check_details() {
        let check = CheckResult::fail("amount_authorization", "over")
            .detail("excess", "2000.00")
            .detail("currency", "SGD");
        assert!(!check.passed);
        assert_eq!(check.details["excess"], "2000.00");
    }
}
