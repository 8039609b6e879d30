// DVLA Vehicle Enquiry Service client
//
// POST {registrationNumber} with x-api-key header
// 200 → vehicle record, 404 → not found, other → API error
//
// API Documentation: https://developer-portal.driver-vehicle-licensing.api.gov.uk/

use super::{normalize_registration, RegistryError, RegistryLookup, VehicleRecord};
use async_trait::async_trait;
use chrono::NaiveDate;
use governor::{Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

/// Production endpoint
pub const DVLA_API_URL: &str =
    "https://driver-vehicle-licensing.api.gov.uk/vehicle-enquiry/v1/vehicles";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REQUESTS_PER_SECOND: u32 = 5;

/// DVLA response body (camelCase, most fields optional)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DvlaVehicle {
    registration_number: Option<String>,
    #[serde(default)]
    make: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    colour: String,
    #[serde(default)]
    fuel_type: String,
    engine_capacity: Option<u32>,
    year_of_manufacture: Option<i32>,
    date_of_first_registration: Option<String>,
    mot_status: Option<String>,
    mot_expiry_date: Option<String>,
    tax_status: Option<String>,
    tax_due_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DvlaErrorBody {
    message: Option<String>,
}

/// DVLA vehicle enquiry client
///
/// Requests are rate limited with a token bucket; callers wait for a permit.
pub struct DvlaClient {
    client: Client,
    api_url: String,
    api_key: String,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl DvlaClient {
    pub fn new(api_key: String) -> Result<Self, RegistryError> {
        Self::with_options(
            api_key,
            DVLA_API_URL.to_string(),
            DEFAULT_TIMEOUT,
            DEFAULT_REQUESTS_PER_SECOND,
        )
    }

    /// Client with explicit endpoint, timeout and rate limit
    pub fn with_options(
        api_key: String,
        api_url: String,
        timeout: Duration,
        requests_per_second: u32,
    ) -> Result<Self, RegistryError> {
        if api_key.trim().is_empty() {
            return Err(RegistryError::NotConfigured(
                "DVLA API key is empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| RegistryError::Network(format!("Failed to build HTTP client: {}", e)))?;

        let per_second = NonZeroU32::new(requests_per_second)
            .unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client,
            api_url,
            api_key,
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }
}

#[async_trait]
impl RegistryLookup for DvlaClient {
    fn name(&self) -> &str {
        "dvla"
    }

    async fn lookup(&self, registration: &str) -> Result<Option<VehicleRecord>, RegistryError> {
        let normalized = normalize_registration(registration);

        self.rate_limiter.until_ready().await;

        debug!(registration = %normalized, "Querying DVLA vehicle enquiry");

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .json(&serde_json::json!({ "registrationNumber": normalized }))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(registration = %normalized, "Vehicle not found in DVLA database");
            return Ok(None);
        }
        if !status.is_success() {
            let message = response
                .json::<DvlaErrorBody>()
                .await
                .ok()
                .and_then(|body| body.message)
                .unwrap_or_else(|| status.to_string());
            return Err(RegistryError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let vehicle: DvlaVehicle = response.json().await.map_err(|e| RegistryError::Api {
            status: status.as_u16(),
            message: format!("Failed to parse DVLA response: {}", e),
        })?;

        Ok(Some(into_record(vehicle, normalized)))
    }
}

fn into_record(vehicle: DvlaVehicle, registration: String) -> VehicleRecord {
    VehicleRecord {
        registration_number: vehicle.registration_number.unwrap_or(registration),
        make: vehicle.make,
        model: vehicle.model,
        colour: vehicle.colour,
        fuel_type: vehicle.fuel_type,
        engine_capacity: vehicle.engine_capacity,
        year_of_manufacture: vehicle.year_of_manufacture,
        date_of_first_registration: parse_iso_date(vehicle.date_of_first_registration.as_deref()),
        mot_status: vehicle.mot_status,
        mot_expiry_date: parse_iso_date(vehicle.mot_expiry_date.as_deref()),
        tax_status: vehicle.tax_status,
        tax_due_date: parse_iso_date(vehicle.tax_due_date.as_deref()),
    }
}

fn parse_iso_date(value: Option<&str>) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value?, "%Y-%m-%d").ok()
}
