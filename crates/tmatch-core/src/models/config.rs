//! Configuration structures for the verification pipeline.

use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::TmatchError;

/// Main configuration for the tmatch engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Field normalization configuration.
    pub normalization: NormalizationConfig,

    /// Confidence thresholds for manual review.
    pub review: ReviewConfig,

    /// Anomaly detection configuration.
    pub anomaly: AnomalyConfig,

    /// Pipeline scheduling configuration.
    pub pipeline: PipelineConfig,
}

/// Order of day and month in purely numeric dates such as `01/04/2023`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateOrder {
    #[default]
    DayFirst,
    MonthFirst,
}

/// Field normalization configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    /// Currency assumed for a bare `$` when the document states no currency.
    pub default_currency: String,

    /// How to read numeric dates.
    pub date_order: DateOrder,

    /// Repair common OCR letter/digit confusions inside numbers.
    pub repair_ocr_digits: bool,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            default_currency: "USD".to_string(),
            date_order: DateOrder::DayFirst,
            repair_ocr_digits: true,
        }
    }
}

/// Confidence thresholds (0.0 - 1.0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Fields consumed by a passing check below this force `requires_review`.
    pub hard_threshold: f32,

    /// Fields below this are listed as advisory review flags.
    pub advisory_threshold: f32,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            hard_threshold: 0.75,
            advisory_threshold: 0.9,
        }
    }
}

/// Anomaly detection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Invoice totals at or above this (in major units) are checked for roundness.
    pub round_amount_threshold: Decimal,

    /// A total that is a multiple of this (in major units) counts as round.
    pub round_amount_unit: Decimal,

    /// Allowed skew between line-item sums and stated totals (major units).
    pub reconciliation_tolerance: Decimal,

    /// Quantities above this are outliers.
    pub max_plausible_quantity: i64,

    /// Payment terms longer than this many days are flagged.
    pub long_payment_term_days: i64,

    /// Fraction of the PO amount below which an invoice counts as under-billed.
    pub underbilling_variance: Decimal,

    /// Ratio to the historical average above which a total is a spike.
    pub amount_spike_multiplier: Decimal,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            round_amount_threshold: Decimal::new(10_000, 0),
            round_amount_unit: Decimal::new(1_000, 0),
            reconciliation_tolerance: Decimal::new(1, 2),
            max_plausible_quantity: 1_000_000,
            long_payment_term_days: 180,
            underbilling_variance: Decimal::new(20, 2),
            amount_spike_multiplier: Decimal::new(5, 0),
        }
    }
}

/// Pipeline scheduling configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Extract and normalize the three documents on separate threads.
    pub parallel_normalization: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            parallel_normalization: true,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, TmatchError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            serde_json::from_str(&content).map_err(|e| TmatchError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), TmatchError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| TmatchError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<(), TmatchError> {
        let review = &self.review;
        for (name, value) in [
            ("review.hard_threshold", review.hard_threshold),
            ("review.advisory_threshold", review.advisory_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(TmatchError::Config(format!(
                    "{} must be within 0..1, got {}",
                    name, value
                )));
            }
        }
        if review.advisory_threshold < review.hard_threshold {
            return Err(TmatchError::Config(
                "review.advisory_threshold must not be below review.hard_threshold".to_string(),
            ));
        }
        if crate::models::value::Currency::from_code(&self.normalization.default_currency)
            .is_none()
        {
            return Err(TmatchError::Config(format!(
                "normalization.default_currency is not an ISO currency code: {}",
                self.normalization.default_currency
            )));
        }
        if self.anomaly.round_amount_unit <= Decimal::ZERO {
            return Err(TmatchError::Config(
                "anomaly.round_amount_unit must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.review.hard_threshold, 0.75);
        assert_eq!(config.review.advisory_threshold, 0.9);
        assert_eq!(config.normalization.default_currency, "USD");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"review": {"hard_threshold": 0.6}}"#).unwrap();
        assert_eq!(config.review.hard_threshold, 0.6);
        assert_eq!(config.review.advisory_threshold, 0.9);
        assert_eq!(config.anomaly.long_payment_term_days, 180);
    }

    #[test]
    fn test_validate_rejects_inverted_thresholds() {
        let mut config = EngineConfig::default();
        config.review.advisory_threshold = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_currency() {
        let mut config = EngineConfig::default();
        config.normalization.default_currency = "$".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = EngineConfig::default();
        config.pipeline.parallel_normalization = false;
        config.anomaly.long_payment_term_days = 90;
        config.save(&path).unwrap();

        assert_eq!(EngineConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_from_file_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"review": {"hard_threshold": 1.5}}"#).unwrap();

        assert!(matches!(
            EngineConfig::from_file(&path),
            Err(TmatchError::Config(_))
        ));
    }
}
