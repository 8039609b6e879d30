// Fusion Module - Ensemble Consensus Engine
//
// Architecture: backend results → per-field grouping/scoring (fuse)
//             → validators + registry + review gate (finalize)

pub mod agreement;
pub mod consensus;
pub mod grouping;

pub use consensus::{ConflictReport, FieldConsensus};
pub use grouping::{Occurrence, ValueGroup, DEFAULT_CONFIDENCE_FLOOR};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::error::EnsembleError;
use crate::registry::RegistryResult;
use crate::review::{self, ReviewReason, DEFAULT_REVIEW_THRESHOLD};
use crate::types::{
    ConfidenceScores, ExtractionResult, Field, ENSEMBLE_RAW_RESPONSE, ENSEMBLE_SOURCE,
};
use crate::validators::{
    DateValidationResult, DateValidator, RegistrationValidationResult, RegistrationValidator,
};

/// Weight applied to backends missing from the weight table
pub const DEFAULT_MODEL_WEIGHT: f64 = 0.1;

/// Fields whose absence flags the result for review
pub const DEFAULT_REQUIRED_FIELDS: [Field; 2] = [Field::Registration, Field::MotExpiry];

/// Strategy label reported by the models endpoint
pub const STRATEGY_NAME: &str = "weighted_consensus_with_agreement_bonus";

// ============================================================================
// Model weights
// ============================================================================

/// Backend name → weight table, fixed at engine construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelWeights {
    weights: BTreeMap<String, f64>,
    default_weight: f64,
}

impl Default for ModelWeights {
    fn default() -> Self {
        Self::new(
            [
                ("claude-3-5-sonnet-20241022", 0.35),
                ("gpt-4o", 0.25),
                ("gemini-1.5-pro", 0.20),
                ("florence-2", 0.20),
            ]
            .into_iter()
            .map(|(name, weight)| (name.to_string(), weight))
            .collect(),
        )
    }
}

impl ModelWeights {
    pub fn new(weights: BTreeMap<String, f64>) -> Self {
        Self {
            weights,
            default_weight: DEFAULT_MODEL_WEIGHT,
        }
    }

    pub fn with_default_weight(mut self, default_weight: f64) -> Self {
        self.default_weight = default_weight;
        self
    }

    /// Weight for a backend (default weight when unknown)
    pub fn weight(&self, model_name: &str) -> f64 {
        self.weights
            .get(model_name)
            .copied()
            .unwrap_or(self.default_weight)
    }

    pub fn entries(&self) -> &BTreeMap<String, f64> {
        &self.weights
    }

    pub fn default_weight(&self) -> f64 {
        self.default_weight
    }
}

// ============================================================================
// Results
// ============================================================================

/// Output of the selection stage, before validation and review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusOutcome {
    /// Fused result (model name `ENSEMBLE`)
    pub consensus: ExtractionResult,
    pub fields: BTreeMap<Field, FieldConsensus>,
    pub individual_results: Vec<ExtractionResult>,
    /// Raw unweighted mean confidence per field
    pub consensus_scores: ConfidenceScores,
    pub agreement_level: f64,
    pub models_used: Vec<String>,
    /// Required fields left `NOT_FOUND`
    pub missing_required: Vec<Field>,
}

impl ConsensusOutcome {
    /// Consensus-level review flag
    pub fn requires_review(&self) -> bool {
        !self.missing_required.is_empty()
    }
}

/// Final ensemble output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleResult {
    pub final_extraction: ExtractionResult,
    pub individual_results: Vec<ExtractionResult>,
    pub consensus_scores: ConfidenceScores,
    pub agreement_level: f64,
    /// Wall-clock seconds
    pub processing_time: f64,
    pub models_used: Vec<String>,
    pub validation_results: BTreeMap<String, bool>,
    pub requires_manual_review: bool,
    pub review_reasons: Vec<ReviewReason>,
    /// Mean of the (capped) consensus confidences
    pub mean_confidence: f64,
    pub registration_validation: RegistrationValidationResult,
    pub date_validation: DateValidationResult,
    pub registry_validation: Option<RegistryResult>,
    pub field_details: BTreeMap<Field, FieldConsensus>,
}

// ============================================================================
// Engine
// ============================================================================

/// Weighted-consensus engine
///
/// Holds no per-request state; one instance is shared across requests.
#[derive(Debug, Clone)]
pub struct ConsensusEngine {
    weights: ModelWeights,
    confidence_floor: f64,
    required_fields: Vec<Field>,
    review_threshold: f64,
    registration_validator: RegistrationValidator,
    date_validator: DateValidator,
    fixed_date: Option<NaiveDate>,
}

impl Default for ConsensusEngine {
    fn default() -> Self {
        Self::new(ModelWeights::default())
    }
}

impl ConsensusEngine {
    pub fn new(weights: ModelWeights) -> Self {
        Self {
            weights,
            confidence_floor: DEFAULT_CONFIDENCE_FLOOR,
            required_fields: DEFAULT_REQUIRED_FIELDS.to_vec(),
            review_threshold: DEFAULT_REVIEW_THRESHOLD,
            registration_validator: RegistrationValidator::default(),
            date_validator: DateValidator::default(),
            fixed_date: None,
        }
    }

    pub fn with_confidence_floor(mut self, confidence_floor: f64) -> Self {
        self.confidence_floor = confidence_floor;
        self
    }

    pub fn with_required_fields(mut self, required_fields: Vec<Field>) -> Self {
        self.required_fields = required_fields;
        self
    }

    pub fn with_review_threshold(mut self, review_threshold: f64) -> Self {
        self.review_threshold = review_threshold;
        self
    }

    /// Pin "today" for the validators
    pub fn with_fixed_date(mut self, today: NaiveDate) -> Self {
        self.fixed_date = Some(today);
        self
    }

    pub fn weights(&self) -> &ModelWeights {
        &self.weights
    }

    pub fn review_threshold(&self) -> f64 {
        self.review_threshold
    }

    pub fn required_fields(&self) -> &[Field] {
        &self.required_fields
    }

    fn today(&self) -> NaiveDate {
        self.fixed_date
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    /// Select a consensus value for every field
    ///
    /// Results are taken in the order given; that order decides ties.
    pub fn fuse(&self, results: Vec<ExtractionResult>) -> Result<ConsensusOutcome, EnsembleError> {
        if results.is_empty() {
            return Err(EnsembleError::NoSuccessfulExtractions);
        }

        let mut consensus = ExtractionResult::not_found(ENSEMBLE_SOURCE);
        let mut fields = BTreeMap::new();

        for field in Field::ALL {
            let occurrences: Vec<Occurrence<'_>> = results
                .iter()
                .map(|result| Occurrence {
                    value: result.value(field),
                    confidence: result.confidence(field),
                    weight: self.weights.weight(&result.model_name),
                    source: &result.model_name,
                })
                .collect();

            let detail = consensus::select_field(field, &occurrences, self.confidence_floor);
            debug!(
                field = %field,
                value = %detail.value,
                confidence = detail.confidence,
                supporting = detail.supporting,
                contributing = detail.contributing,
                "Field consensus"
            );

            consensus.set_value(field, detail.value.clone());
            consensus.confidence_scores.insert(field, detail.confidence);
            fields.insert(field, detail);
        }

        consensus.software_detected = agreement::software_consensus(&results);
        consensus.raw_response = ENSEMBLE_RAW_RESPONSE.to_string();
        consensus.processing_time = results.iter().map(|r| r.processing_time).sum();

        let missing_required = self
            .required_fields
            .iter()
            .copied()
            .filter(|field| consensus.is_not_found(*field))
            .collect();

        Ok(ConsensusOutcome {
            agreement_level: agreement::agreement_level(&fields),
            consensus_scores: agreement::mean_confidence_scores(&results),
            models_used: results.iter().map(|r| r.model_name.clone()).collect(),
            consensus,
            fields,
            individual_results: results,
            missing_required,
        })
    }

    /// Validate, apply validator feedback, cross-check and run the review gate
    pub fn finalize(
        &self,
        outcome: ConsensusOutcome,
        registry_check: Option<RegistryResult>,
        threshold: f64,
        elapsed: Duration,
    ) -> EnsembleResult {
        let today = self.today();
        let ConsensusOutcome {
            mut consensus,
            mut fields,
            individual_results,
            consensus_scores,
            agreement_level,
            models_used,
            missing_required,
        } = outcome;

        let registration_validation = self
            .registration_validator
            .validate_on(&consensus.registration, today);
        let date_validation = self.date_validator.validate_on(&consensus.mot_expiry, today);

        cap_confidence(
            &mut consensus,
            &mut fields,
            Field::Registration,
            registration_validation.confidence_score,
        );
        cap_confidence(
            &mut consensus,
            &mut fields,
            Field::MotExpiry,
            date_validation.confidence_score,
        );

        let mut validation_results = BTreeMap::new();
        validation_results.insert(
            "registration_format".to_string(),
            registration_validation.is_valid,
        );
        validation_results.insert("date_format".to_string(), date_validation.is_valid);
        if let Some(check) = &registry_check {
            validation_results.insert("registry_match".to_string(), !check.failed());
            for (field, matched) in &check.field_matches {
                validation_results.insert(format!("registry_{}", field), *matched);
            }
        }

        let decision = review::decide(
            &missing_required,
            &consensus.confidence_scores,
            registry_check.as_ref(),
            threshold,
        );

        info!(
            models = models_used.len(),
            agreement_level,
            mean_confidence = decision.mean_confidence,
            requires_manual_review = decision.required,
            "Ensemble consensus complete"
        );

        EnsembleResult {
            final_extraction: consensus,
            individual_results,
            consensus_scores,
            agreement_level,
            processing_time: elapsed.as_secs_f64(),
            models_used,
            validation_results,
            requires_manual_review: decision.required,
            review_reasons: decision.reasons,
            mean_confidence: decision.mean_confidence,
            registration_validation,
            date_validation,
            registry_validation: registry_check,
            field_details: fields,
        }
    }

    /// `process(results, registry_check)` with the configured threshold
    pub fn process(
        &self,
        results: Vec<ExtractionResult>,
        registry_check: Option<RegistryResult>,
    ) -> Result<EnsembleResult, EnsembleError> {
        self.process_with_threshold(results, registry_check, self.review_threshold)
    }

    pub fn process_with_threshold(
        &self,
        results: Vec<ExtractionResult>,
        registry_check: Option<RegistryResult>,
        threshold: f64,
    ) -> Result<EnsembleResult, EnsembleError> {
        let started = Instant::now();
        let outcome = self.fuse(results)?;
        Ok(self.finalize(outcome, registry_check, threshold, started.elapsed()))
    }
}

/// Cap a consensus confidence at the validator's confidence
fn cap_confidence(
    consensus: &mut ExtractionResult,
    fields: &mut BTreeMap<Field, FieldConsensus>,
    field: Field,
    validator_confidence: f64,
) {
    if consensus.is_not_found(field) {
        return;
    }
    let capped = consensus.confidence(field).min(validator_confidence);
    consensus.confidence_scores.insert(field, capped);
    if let Some(detail) = fields.get_mut(&field) {
        detail.confidence = capped;
    }
}
