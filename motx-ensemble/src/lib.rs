//! motx-ensemble library interface
//!
//! Multi-backend VLM extraction of MOT reminder fields from garage software
//! screenshots, fused by weighted consensus and gated for manual review.

pub mod api;
pub mod config;
pub mod error;
pub mod extractors;
pub mod fusion;
pub mod pipeline;
pub mod registry;
pub mod review;
pub mod types;
pub mod validators;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServiceConfig;
use crate::pipeline::EnsemblePipeline;

/// JSON framing headroom on top of the encoded image
const BODY_LIMIT_OVERHEAD: usize = 64 * 1024;

/// Request body limit for a given decoded image limit
///
/// Twice the base64 size of the largest accepted image, so a moderately
/// oversized image still reaches the decoder and gets its size reported.
/// Anything larger is rejected by the body limit and mapped to the same 400.
pub fn body_limit(max_image_bytes: usize) -> usize {
    (max_image_bytes / 3)
        .saturating_add(1)
        .saturating_mul(8)
        .saturating_add(BODY_LIMIT_OVERHEAD)
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<EnsemblePipeline>,
    pub config: Arc<ServiceConfig>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(pipeline: EnsemblePipeline, config: ServiceConfig) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            config: Arc::new(config),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = body_limit(state.config.limits.max_image_bytes);

    Router::new()
        .merge(api::health_routes())
        .merge(api::extract_routes())
        .merge(api::fuse_routes())
        .merge(api::validate_routes())
        .merge(api::models_routes())
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_limit_covers_encoded_image() {
        let max = 100_000;
        assert!(body_limit(max) >= max / 3 * 4 * 2 + BODY_LIMIT_OVERHEAD);
    }

    #[test]
    fn test_body_limit_saturates() {
        assert_eq!(body_limit(usize::MAX), usize::MAX);
    }
}
