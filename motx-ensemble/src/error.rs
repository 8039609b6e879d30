//! Error types for motx-ensemble

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::types::ExtractionError;

/// Hard failures of an ensemble request
#[derive(Debug, Error)]
pub enum EnsembleError {
    /// Every backend failed or no results were supplied
    #[error("No successful extractions")]
    NoSuccessfulExtractions,

    /// No backend is available to run
    #[error("No vision backends configured")]
    NoBackendsConfigured,

    /// Joint backend wait exceeded the deadline
    #[error("Model processing timeout exceeded ({0:?})")]
    Timeout(Duration),
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Ensemble(#[from] EnsembleError),
}

/// Malformed or oversized request bodies share the JSON 400 shape
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<ExtractionError> for ApiError {
    fn from(err: ExtractionError) -> Self {
        match err {
            ExtractionError::InvalidImage(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Ensemble(ref err) => {
                let (status, code) = match err {
                    EnsembleError::NoSuccessfulExtractions => {
                        (StatusCode::BAD_GATEWAY, "NO_SUCCESSFUL_EXTRACTIONS")
                    }
                    EnsembleError::NoBackendsConfigured => {
                        (StatusCode::SERVICE_UNAVAILABLE, "NO_BACKENDS")
                    }
                    EnsembleError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT"),
                };
                (status, code, err.to_string())
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
