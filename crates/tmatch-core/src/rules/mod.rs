//! Named 3-way match checks.
//!
//! Each rule reads the fully normalized [`DocumentBundle`] and produces one
//! [`CheckResult`]. Rules never fail with an error: missing or unparseable
//! inputs make the check fail with a message naming the missing fields.

pub mod amount;
pub mod dates;
pub mod pairing;
pub mod quantity;
pub mod reference;

use chrono::NaiveDate;
use tracing::debug;

use crate::models::document::DocumentRole;
use crate::models::record::DocumentBundle;
use crate::models::value::{Money, NormalizedField};
use crate::models::verification::CheckResult;

pub use amount::AmountAuthorizationRule;
pub use dates::DateSequenceRule;
pub use quantity::QuantityMatchRule;
pub use reference::PoReferenceRule;

pub const QUANTITY_MATCH: &str = "quantity_match";
pub const AMOUNT_AUTHORIZATION: &str = "amount_authorization";
pub const DATE_SEQUENCE: &str = "date_sequence";
pub const PO_REFERENCE: &str = "po_reference";

/// Order in which check results are reported.
pub const RULE_ORDER: [&str; 4] = [QUANTITY_MATCH, AMOUNT_AUTHORIZATION, DATE_SEQUENCE, PO_REFERENCE];

/// A normalized field a check read, with its confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumedField {
    pub path: String,
    pub confidence: f32,
}

/// Result of one rule: the check plus what it read.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    pub check: CheckResult,
    /// Fields the rule read. Only meaningful for confidence gating when the
    /// check passed.
    pub consumed: Vec<ConsumedField>,
    /// Advisory review flags raised by the rule itself.
    pub review_flags: Vec<String>,
}

impl RuleOutcome {
    pub fn new(check: CheckResult, consumed: Vec<ConsumedField>) -> Self {
        Self {
            check,
            consumed,
            review_flags: Vec::new(),
        }
    }

    pub fn with_review_flag(mut self, path: impl Into<String>) -> Self {
        self.review_flags.push(path.into());
        self
    }
}

/// A named check over a bundle.
pub trait Rule: Send + Sync {
    /// Name reported in [`CheckResult::rule_name`].
    fn name(&self) -> &'static str;

    /// Evaluate the rule. Must not panic on malformed input.
    fn evaluate(&self, bundle: &DocumentBundle) -> RuleOutcome;
}

/// Collects rule inputs, recording what was read and what was missing.
pub(crate) struct Inputs<'a> {
    bundle: &'a DocumentBundle,
    consumed: Vec<ConsumedField>,
    missing: Vec<String>,
}

impl<'a> Inputs<'a> {
    pub fn new(bundle: &'a DocumentBundle) -> Self {
        Self {
            bundle,
            consumed: Vec::new(),
            missing: Vec::new(),
        }
    }

    /// Record a parsed field as consumed, or its path as missing. Each path
    /// is recorded once.
    pub fn take(&mut self, path: String, field: Option<&'a NormalizedField>) -> Option<&'a NormalizedField> {
        match field {
            Some(f) if f.is_parsed() => {
                if !self.consumed.iter().any(|c| c.path == path) {
                    self.consumed.push(ConsumedField {
                        path,
                        confidence: f.confidence,
                    });
                }
                Some(f)
            }
            _ => {
                if !self.missing.contains(&path) {
                    self.missing.push(path);
                }
                None
            }
        }
    }

    fn header(&mut self, role: DocumentRole, name: &str) -> Option<&'a NormalizedField> {
        let record = self.bundle.get(role);
        self.take(record.path(name), record.field(name))
    }

    pub fn money(&mut self, role: DocumentRole, name: &str) -> Option<&'a Money> {
        self.header(role, name)?.value.as_ref()?.as_money()
    }

    pub fn date(&mut self, role: DocumentRole, name: &str) -> Option<NaiveDate> {
        self.header(role, name)?.value.as_ref()?.as_date()
    }

    pub fn quantity(&mut self, role: DocumentRole, name: &str) -> Option<i64> {
        self.header(role, name)?.value.as_ref()?.as_quantity()
    }

    pub fn identifier(&mut self, role: DocumentRole, name: &str) -> Option<&'a str> {
        self.header(role, name)?.value.as_ref()?.as_text()
    }

    pub fn has_missing(&self) -> bool {
        !self.missing.is_empty()
    }

    /// Failed outcome naming every missing input.
    pub fn fail_missing(self, rule_name: &str) -> RuleOutcome {
        let message = format!(
            "Cannot evaluate {}: missing or unreadable {}",
            rule_name,
            self.missing.join(", ")
        );
        let check =
            CheckResult::fail(rule_name, message).detail("missing_fields", self.missing.clone());
        RuleOutcome::new(check, self.consumed)
    }

    pub fn finish(self, check: CheckResult) -> RuleOutcome {
        RuleOutcome::new(check, self.consumed)
    }
}

/// Runs the standard rules and reports them in [`RULE_ORDER`].
pub struct RuleEngine {
    rules: Vec<Box<dyn Rule>>,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleEngine {
    /// Engine with the four standard checks.
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(QuantityMatchRule),
                Box::new(AmountAuthorizationRule),
                Box::new(DateSequenceRule),
                Box::new(PoReferenceRule),
            ],
        }
    }

    /// Evaluate every rule. With `parallel` set each rule runs on its own
    /// scoped thread; the output order is the same either way.
    pub fn evaluate(&self, bundle: &DocumentBundle, parallel: bool) -> Vec<RuleOutcome> {
        let mut outcomes: Vec<RuleOutcome> = if parallel {
            std::thread::scope(|scope| {
                let handles: Vec<_> = self
                    .rules
                    .iter()
                    .map(|rule| scope.spawn(move || rule.evaluate(bundle)))
                    .collect();
                handles
                    .into_iter()
                    .zip(self.rules.iter())
                    .map(|(handle, rule)| {
                        handle.join().unwrap_or_else(|_| {
                            let check = CheckResult::fail(
                                rule.name(),
                                format!("{} could not be evaluated", rule.name()),
                            );
                            RuleOutcome::new(check, Vec::new())
                        })
                    })
                    .collect()
            })
        } else {
            self.rules.iter().map(|rule| rule.evaluate(bundle)).collect()
        };

        outcomes.sort_by_key(|o| rule_rank(&o.check.rule_name));
        for outcome in &outcomes {
            debug!(
                "Rule {}: {} ({})",
                outcome.check.rule_name,
                if outcome.check.passed { "passed" } else { "failed" },
                outcome.check.message
            );
        }
        outcomes
    }
}

fn rule_rank(name: &str) -> usize {
    RULE_ORDER
        .iter()
        .position(|n| *n == name)
        .unwrap_or(RULE_ORDER.len())
}

#[cfg(test)]
pub(crate) mod testing {
    //! Bundle builders shared by rule tests.

    use crate::models::document::{DocumentRole, RawField};
    use crate::models::config::NormalizationConfig;
    use crate::models::record::DocumentBundle;
    use crate::normalize::Normalizer;

    pub fn bundle(
        invoice: &[(&str, &str)],
        po: &[(&str, &str)],
        pod: &[(&str, &str)],
    ) -> DocumentBundle {
        bundle_with_confidence(invoice, po, pod, 0.95)
    }

    pub fn bundle_with_confidence(
        invoice: &[(&str, &str)],
        po: &[(&str, &str)],
        pod: &[(&str, &str)],
        confidence: f32,
    ) -> DocumentBundle {
        let normalizer = Normalizer::new(&NormalizationConfig::default()).unwrap();
        let record = |role: DocumentRole, values: &[(&str, &str)]| {
            let raw: Vec<RawField> = values
                .iter()
                .map(|(name, value)| RawField::new(*name, *value, confidence, role))
                .collect();
            normalizer.normalize_document(role, "sha256:test", &raw)
        };
        DocumentBundle {
            invoice: record(DocumentRole::Invoice, invoice),
            purchase_order: record(DocumentRole::PurchaseOrder, po),
            proof_of_delivery: record(DocumentRole::ProofOfDelivery, pod),
            bundle_hash: "sha256:bundle".to_string(),
        }
    }
}
