//! Stand-alone field validation endpoints

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ApiResult;
use crate::registry::{normalize_registration, VehicleRecord};
use crate::validators::{
    DateValidationResult, DateValidator, RegistrationValidationResult, RegistrationValidator,
};
use crate::AppState;

fn default_true() -> bool {
    true
}

/// POST /validate/registration request
#[derive(Debug, Deserialize)]
pub struct RegistrationRequest {
    pub registration: String,
    /// Also look the vehicle up when a registry is configured
    #[serde(default = "default_true")]
    pub check_registry: bool,
}

/// Registry lookup summary
#[derive(Debug, Serialize)]
pub struct RegistryLookupSummary {
    pub found: bool,
    pub vehicle: Option<VehicleRecord>,
    pub error_message: Option<String>,
}

/// POST /validate/registration response
#[derive(Debug, Serialize)]
pub struct RegistrationResponse {
    pub registration: String,
    pub validation: RegistrationValidationResult,
    /// Absent when no registry is configured or the lookup was not requested
    pub registry: Option<RegistryLookupSummary>,
}

/// POST /validate/registration
pub async fn validate_registration(
    State(state): State<AppState>,
    Json(request): Json<RegistrationRequest>,
) -> ApiResult<Json<RegistrationResponse>> {
    let validation = RegistrationValidator::default().validate(&request.registration);
    debug!(
        registration = %request.registration,
        is_valid = validation.is_valid,
        format = validation.format_type.as_str(),
        "Registration validated"
    );

    let query = normalize_registration(&request.registration);
    let registry = match (state.pipeline.registry(), request.check_registry) {
        (Some(registry), true) if !query.is_empty() => {
            let summary = match registry.lookup(&query).await {
                Ok(vehicle) => RegistryLookupSummary {
                    found: vehicle.is_some(),
                    vehicle,
                    error_message: None,
                },
                Err(e) => {
                    warn!(error = %e, "Registry lookup failed");
                    RegistryLookupSummary {
                        found: false,
                        vehicle: None,
                        error_message: Some(e.to_string()),
                    }
                }
            };
            Some(summary)
        }
        _ => None,
    };

    Ok(Json(RegistrationResponse {
        registration: request.registration,
        validation,
        registry,
    }))
}

/// POST /validate/date request
#[derive(Debug, Deserialize)]
pub struct DateRequest {
    pub date: String,
}

/// POST /validate/date response
#[derive(Debug, Serialize)]
pub struct DateResponse {
    pub date: String,
    pub validation: DateValidationResult,
    pub expiry_summary: Option<String>,
}

/// POST /validate/date
pub async fn validate_date(Json(request): Json<DateRequest>) -> ApiResult<Json<DateResponse>> {
    let validation = DateValidator::default().validate(&request.date);
    let expiry_summary = validation.expiry_summary();

    Ok(Json(DateResponse {
        date: request.date,
        validation,
        expiry_summary,
    }))
}

/// Build validation routes
pub fn validate_routes() -> Router<AppState> {
    Router::new()
        .route("/validate/registration", post(validate_registration))
        .route("/validate/date", post(validate_date))
}
