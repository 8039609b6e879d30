//! External vehicle registry cross-check
//!
//! The consensus registration is looked up once per request (only when it is
//! not `NOT_FOUND` and a registry is configured). The returned record is
//! compared field by field against the consensus values; the comparison feeds
//! the manual-review gate and the `registry_*` validation results.

pub mod dvla_client;

pub use dvla_client::DvlaClient;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::{is_not_found, ExtractionResult, Field};
use crate::validators::DateValidator;

/// Registry lookup failure
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Registry network error: {0}")]
    Network(String),

    #[error("Registry API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Registry not configured: {0}")]
    NotConfigured(String),
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RegistryError::Network("Registry request timed out".to_string())
        } else {
            RegistryError::Network(err.to_string())
        }
    }
}

/// Vehicle record returned by the registry
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VehicleRecord {
    pub registration_number: String,
    pub make: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub colour: String,
    #[serde(default)]
    pub fuel_type: String,
    pub engine_capacity: Option<u32>,
    pub year_of_manufacture: Option<i32>,
    pub date_of_first_registration: Option<NaiveDate>,
    pub mot_status: Option<String>,
    pub mot_expiry_date: Option<NaiveDate>,
    pub tax_status: Option<String>,
    pub tax_due_date: Option<NaiveDate>,
}

/// Outcome of a registry cross-check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryResult {
    /// Lookup succeeded and the vehicle exists
    pub is_valid: bool,
    /// Compared field → values agree
    pub field_matches: BTreeMap<Field, bool>,
    pub vehicle: Option<VehicleRecord>,
    pub error_message: Option<String>,
}

impl RegistryResult {
    /// Result for a lookup that produced no record
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            field_matches: BTreeMap::new(),
            vehicle: None,
            error_message: Some(message.into()),
        }
    }

    /// True when the check should force manual review
    ///
    /// A registry that could not confirm the vehicle, or confirms a different
    /// registration, fails. Make/model/expiry mismatches are reported only,
    /// and a registration that was not compared is not a mismatch.
    pub fn failed(&self) -> bool {
        !self.is_valid || self.field_matches.get(&Field::Registration) == Some(&false)
    }
}

/// Registry collaborator
#[async_trait]
pub trait RegistryLookup: Send + Sync {
    /// Registry name for logging
    fn name(&self) -> &str;

    /// Look up a vehicle (`Ok(None)` when the registry has no such vehicle)
    async fn lookup(&self, registration: &str) -> Result<Option<VehicleRecord>, RegistryError>;
}

/// Uppercase, alphanumeric-only form used for registry queries and comparison
pub fn normalize_registration(registration: &str) -> String {
    registration
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Look up the consensus registration and compare the record
pub async fn verify(registry: &dyn RegistryLookup, consensus: &ExtractionResult) -> RegistryResult {
    if is_not_found(&consensus.registration) || consensus.registration.trim().is_empty() {
        return RegistryResult::unavailable("Invalid registration number");
    }

    debug!(
        registry = registry.name(),
        registration = %consensus.registration,
        "Registry lookup"
    );
    let outcome = registry.lookup(&consensus.registration).await;
    cross_check(consensus, outcome)
}

/// Compare a lookup outcome against the consensus values
pub fn cross_check(
    consensus: &ExtractionResult,
    outcome: Result<Option<VehicleRecord>, RegistryError>,
) -> RegistryResult {
    let vehicle = match outcome {
        Ok(Some(vehicle)) => vehicle,
        Ok(None) => return RegistryResult::unavailable("Vehicle not found in registry"),
        Err(e) => {
            warn!(error = %e, "Registry lookup failed");
            return RegistryResult::unavailable(e.to_string());
        }
    };

    let mut field_matches = BTreeMap::new();
    field_matches.insert(
        Field::Registration,
        normalize_registration(&consensus.registration)
            == normalize_registration(&vehicle.registration_number),
    );
    field_matches.insert(Field::Make, loosely_matches(&consensus.make, &vehicle.make));
    field_matches.insert(Field::Model, loosely_matches(&consensus.model, &vehicle.model));

    let extracted_expiry = DateValidator::default().parse(&consensus.mot_expiry);
    field_matches.insert(
        Field::MotExpiry,
        matches!((extracted_expiry, vehicle.mot_expiry_date), (Some(a), Some(b)) if a == b),
    );

    debug!(?field_matches, "Registry cross-check complete");

    RegistryResult {
        is_valid: true,
        field_matches,
        vehicle: Some(vehicle),
        error_message: None,
    }
}

/// Case-insensitive match with containment either way
fn loosely_matches(extracted: &str, registry: &str) -> bool {
    if is_not_found(extracted) {
        return false;
    }
    let extracted = extracted.trim().to_uppercase();
    let registry = registry.trim().to_uppercase();
    if extracted.is_empty() || registry.is_empty() {
        return false;
    }
    extracted.contains(&registry) || registry.contains(&extracted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn consensus() -> ExtractionResult {
        let mut result = ExtractionResult::not_found("ENSEMBLE");
        result.registration = "AB12 CDE".to_string();
        result.make = "Ford".to_string();
        result.model = "Focus".to_string();
        result.mot_expiry = "15/03/2025".to_string();
        result
    }

    fn record() -> VehicleRecord {
        VehicleRecord {
            registration_number: "AB12CDE".to_string(),
            make: "FORD".to_string(),
            model: "FOCUS ZETEC".to_string(),
            mot_expiry_date: NaiveDate::from_ymd_opt(2025, 3, 15),
            ..Default::default()
        }
    }

    #[test]
    fn test_full_match() {
        let result = cross_check(&consensus(), Ok(Some(record())));
        assert!(result.is_valid);
        assert!(!result.failed());
        assert!(result.field_matches.values().all(|m| *m));
    }

    #[test]
    fn test_make_mismatch_does_not_fail() {
        let mut vehicle = record();
        vehicle.make = "VAUXHALL".to_string();
        let result = cross_check(&consensus(), Ok(Some(vehicle)));
        assert!(!result.field_matches[&Field::Make]);
        assert!(!result.failed());
    }

    #[test]
    fn test_registration_mismatch_fails() {
        let mut vehicle = record();
        vehicle.registration_number = "XY99ZZZ".to_string();
        let result = cross_check(&consensus(), Ok(Some(vehicle)));
        assert!(result.is_valid);
        assert!(result.failed());
    }

    #[test]
    fn test_uncompared_registration_does_not_fail() {
        let result = RegistryResult {
            is_valid: true,
            field_matches: BTreeMap::new(),
            vehicle: None,
            error_message: None,
        };
        assert!(!result.failed());
    }

    #[test]
    fn test_not_found_and_error_fail() {
        let result = cross_check(&consensus(), Ok(None));
        assert!(result.failed());
        assert!(result.vehicle.is_none());

        let result = cross_check(
            &consensus(),
            Err(RegistryError::Api {
                status: 500,
                message: "boom".to_string(),
            }),
        );
        assert!(result.failed());
        assert!(result.error_message.unwrap().contains("500"));
    }

    #[test]
    fn test_expiry_compared_as_dates() {
        let mut extracted = consensus();
        extracted.mot_expiry = "2025-03-15".to_string();
        let result = cross_check(&extracted, Ok(Some(record())));
        assert!(result.field_matches[&Field::MotExpiry]);

        extracted.mot_expiry = "NOT_FOUND".to_string();
        let result = cross_check(&extracted, Ok(Some(record())));
        assert!(!result.field_matches[&Field::MotExpiry]);
    }

    #[test]
    fn test_normalize_registration() {
        assert_eq!(normalize_registration("ab12 cde"), "AB12CDE");
        assert_eq!(normalize_registration("AB-12.CDE"), "AB12CDE");
    }
}
