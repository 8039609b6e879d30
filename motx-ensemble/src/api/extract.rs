//! Screenshot extraction endpoint
//!
//! POST /extract runs the full pipeline on one base64-encoded screenshot.

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::fusion::EnsembleResult;
use crate::pipeline::ProcessOptions;
use crate::registry::RegistryResult;
use crate::review::ReviewReason;
use crate::types::{ConfidenceScores, Field, ImageInput};
use crate::AppState;

fn default_true() -> bool {
    true
}

/// POST /extract request
#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    /// Base64 image, optionally as a `data:` URL
    pub image_base64: String,
    #[serde(default = "default_true")]
    pub validate_with_registry: bool,
    /// Review threshold override
    pub confidence_threshold: Option<f64>,
}

/// POST /extract response
#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub request_id: Uuid,
    pub success: bool,
    pub processing_time: f64,
    pub extracted_data: BTreeMap<Field, String>,
    pub confidence_scores: ConfidenceScores,
    pub software_detected: String,
    pub models_used: Vec<String>,
    pub agreement_level: f64,
    pub mean_confidence: f64,
    pub validation_results: BTreeMap<String, bool>,
    pub registry_validation: Option<RegistryResult>,
    pub requires_manual_review: bool,
    pub review_reasons: Vec<ReviewReason>,
}

impl ExtractResponse {
    fn from_result(request_id: Uuid, result: EnsembleResult) -> Self {
        Self {
            request_id,
            success: true,
            processing_time: result.processing_time,
            extracted_data: result.final_extraction.field_values(),
            confidence_scores: result.final_extraction.confidence_scores,
            software_detected: result.final_extraction.software_detected,
            models_used: result.models_used,
            agreement_level: result.agreement_level,
            mean_confidence: result.mean_confidence,
            validation_results: result.validation_results,
            registry_validation: result.registry_validation,
            requires_manual_review: result.requires_manual_review,
            review_reasons: result.review_reasons,
        }
    }
}

/// Decode a base64 payload and enforce the size limit
///
/// Accepts bare base64 or a `data:<type>;base64,` URL.
pub fn decode_image(payload: &str, max_bytes: usize) -> ApiResult<ImageInput> {
    let encoded = match payload.split_once("base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => payload,
    };
    let encoded: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();

    let data = base64::engine::general_purpose::STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| ApiError::BadRequest(format!("Invalid base64 image: {}", e)))?;

    if data.len() > max_bytes {
        return Err(ApiError::BadRequest(format!(
            "Image too large: {} bytes (max {})",
            data.len(),
            max_bytes
        )));
    }

    Ok(ImageInput::from_bytes(data)?)
}

/// POST /extract
pub async fn extract_image(
    State(state): State<AppState>,
    payload: Result<Json<ExtractRequest>, JsonRejection>,
) -> ApiResult<Json<ExtractResponse>> {
    let Json(request) = payload?;
    let request_id = Uuid::new_v4();
    let image = decode_image(&request.image_base64, state.config.limits.max_image_bytes)?;

    info!(
        request_id = %request_id,
        media_type = %image.media_type,
        bytes = image.data.len(),
        "Extraction request"
    );

    let options = ProcessOptions {
        validate_with_registry: request.validate_with_registry,
        confidence_threshold: request.confidence_threshold,
    };
    let result = state.pipeline.process_image(image, &options).await?;

    Ok(Json(ExtractResponse::from_result(request_id, result)))
}

/// Build extraction routes
pub fn extract_routes() -> Router<AppState> {
    Router::new().route("/extract", post(extract_image))
}
