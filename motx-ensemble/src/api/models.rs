//! Backend and consensus configuration endpoint

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::extractors::BackendInfo;
use crate::fusion::STRATEGY_NAME;
use crate::types::Field;
use crate::AppState;

/// GET /models/info response
#[derive(Debug, Serialize)]
pub struct ModelsInfoResponse {
    pub backends: Vec<BackendInfo>,
    pub model_weights: BTreeMap<String, f64>,
    pub default_weight: f64,
    pub consensus_strategy: String,
    pub review_threshold: f64,
    pub required_fields: Vec<Field>,
    pub model_timeout_secs: f64,
}

/// GET /models/info
pub async fn models_info(State(state): State<AppState>) -> Json<ModelsInfoResponse> {
    let extractor = state.pipeline.extractor();
    let engine = state.pipeline.engine();

    Json(ModelsInfoResponse {
        backends: extractor.backends().iter().map(|b| b.info()).collect(),
        model_weights: engine.weights().entries().clone(),
        default_weight: engine.weights().default_weight(),
        consensus_strategy: STRATEGY_NAME.to_string(),
        review_threshold: engine.review_threshold(),
        required_fields: engine.required_fields().to_vec(),
        model_timeout_secs: extractor.timeout().as_secs_f64(),
    })
}

/// Build models info routes
pub fn models_routes() -> Router<AppState> {
    Router::new().route("/models/info", get(models_info))
}
