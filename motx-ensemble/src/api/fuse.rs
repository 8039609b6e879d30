//! Consensus over caller-supplied backend results
//!
//! POST /fuse exposes `ConsensusEngine::process` directly: no backends are
//! called and the registry result, if any, is taken as given.

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::fusion::EnsembleResult;
use crate::registry::RegistryResult;
use crate::types::ExtractionResult;
use crate::AppState;

/// POST /fuse request
#[derive(Debug, Deserialize)]
pub struct FuseRequest {
    pub results: Vec<ExtractionResult>,
    #[serde(default)]
    pub registry_check: Option<RegistryResult>,
    pub confidence_threshold: Option<f64>,
}

/// POST /fuse
pub async fn fuse_results(
    State(state): State<AppState>,
    payload: Result<Json<FuseRequest>, JsonRejection>,
) -> ApiResult<Json<EnsembleResult>> {
    let Json(request) = payload?;
    if request.results.is_empty() {
        return Err(ApiError::BadRequest("results must not be empty".to_string()));
    }

    let engine = state.pipeline.engine();
    let threshold = request
        .confidence_threshold
        .unwrap_or_else(|| engine.review_threshold());

    info!(results = request.results.len(), threshold, "Fuse request");

    let result = engine.process_with_threshold(request.results, request.registry_check, threshold)?;
    Ok(Json(result))
}

/// Build fuse routes
pub fn fuse_routes() -> Router<AppState> {
    Router::new().route("/fuse", post(fuse_results))
}
