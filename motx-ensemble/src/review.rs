//! Manual-review policy
//!
//! Review is required when ANY of:
//! 1. consensus left a required field unfilled
//! 2. mean consensus confidence is below the threshold
//! 3. the registry cross-check failed
//!
//! Individual validator failures are not triggers on their own; they reach
//! this gate only through the confidence cap applied during finalisation.

use serde::{Deserialize, Serialize};

use crate::registry::RegistryResult;
use crate::types::{ConfidenceScores, Field};

/// Default mean-confidence threshold
pub const DEFAULT_REVIEW_THRESHOLD: f64 = 0.85;

/// Why a result was sent for review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ReviewReason {
    MissingRequiredFields { fields: Vec<Field> },
    LowConfidence { mean_confidence: f64, threshold: f64 },
    RegistryCheckFailed { message: String },
}

impl std::fmt::Display for ReviewReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewReason::MissingRequiredFields { fields } => {
                let names: Vec<&str> = fields.iter().map(|field| field.as_str()).collect();
                write!(f, "Required fields not found: {}", names.join(", "))
            }
            ReviewReason::LowConfidence {
                mean_confidence,
                threshold,
            } => write!(
                f,
                "Mean confidence {:.2} below threshold {:.2}",
                mean_confidence, threshold
            ),
            ReviewReason::RegistryCheckFailed { message } => {
                write!(f, "Registry check failed: {}", message)
            }
        }
    }
}

/// Review verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewDecision {
    pub required: bool,
    pub mean_confidence: f64,
    pub reasons: Vec<ReviewReason>,
}

/// Mean over all seven fields (a missing entry counts as 0.0)
pub fn mean_confidence(scores: &ConfidenceScores) -> f64 {
    let total: f64 = Field::ALL
        .iter()
        .map(|field| scores.get(field).copied().unwrap_or(0.0))
        .sum();
    total / Field::ALL.len() as f64
}

/// Combine the three aggregate signals
pub fn decide(
    missing_required: &[Field],
    confidences: &ConfidenceScores,
    registry: Option<&RegistryResult>,
    threshold: f64,
) -> ReviewDecision {
    let mean = mean_confidence(confidences);
    let mut reasons = Vec::new();

    if !missing_required.is_empty() {
        reasons.push(ReviewReason::MissingRequiredFields {
            fields: missing_required.to_vec(),
        });
    }

    if mean < threshold {
        reasons.push(ReviewReason::LowConfidence {
            mean_confidence: mean,
            threshold,
        });
    }

    if let Some(check) = registry.filter(|check| check.failed()) {
        let message = check
            .error_message
            .clone()
            .unwrap_or_else(|| "Registration does not match registry record".to_string());
        reasons.push(ReviewReason::RegistryCheckFailed { message });
    }

    ReviewDecision {
        required: !reasons.is_empty(),
        mean_confidence: mean,
        reasons,
    }
}
