//! Shared test helpers: mock backends, mock registry, canned results

#![allow(dead_code)]

use async_trait::async_trait;
use base64::Engine;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use motx_ensemble::config::ServiceConfig;
use motx_ensemble::extractors::{ParallelExtractor, VisionBackend};
use motx_ensemble::fusion::ConsensusEngine;
use motx_ensemble::pipeline::EnsemblePipeline;
use motx_ensemble::registry::{RegistryError, RegistryLookup, VehicleRecord};
use motx_ensemble::types::{ExtractionError, ExtractionResult, Field, ImageInput};
use motx_ensemble::AppState;

pub const CLAUDE: &str = "claude-3-5-sonnet-20241022";
pub const GPT: &str = "gpt-4o";
pub const GEMINI: &str = "gemini-1.5-pro";

/// Minimal PNG signature (enough for media type sniffing)
pub const PNG_BYTES: [u8; 12] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

pub fn png_base64() -> String {
    base64::engine::general_purpose::STANDARD.encode(PNG_BYTES)
}

pub fn png_image() -> ImageInput {
    ImageInput {
        data: PNG_BYTES.to_vec(),
        media_type: "image/png".to_string(),
    }
}

/// Pinned "today" for validator-dependent assertions
pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
}

pub fn engine() -> ConsensusEngine {
    ConsensusEngine::default().with_fixed_date(today())
}

/// Result carrying only the given fields
pub fn result_with(model_name: &str, fields: &[(Field, &str, f64)]) -> ExtractionResult {
    let mut result = ExtractionResult::not_found(model_name);
    for (field, value, confidence) in fields {
        result.set_value(*field, *value);
        result.confidence_scores.insert(*field, *confidence);
    }
    result.processing_time = 1.0;
    result
}

/// Result with every field populated for the same vehicle
pub fn full_result(model_name: &str, confidence: f64) -> ExtractionResult {
    let mut result = result_with(
        model_name,
        &[
            (Field::Registration, "AB12 CDE", confidence),
            (Field::MotExpiry, "15/03/2025", confidence),
            (Field::Make, "FORD", confidence),
            (Field::Model, "FOCUS", confidence),
            (Field::CustomerName, "John Smith", confidence),
            (Field::CustomerPhone, "07700 900123", confidence),
            (Field::CustomerEmail, "john.smith@example.com", confidence),
        ],
    );
    result.software_detected = "GarageHive".to_string();
    result
}

pub fn matching_vehicle() -> VehicleRecord {
    VehicleRecord {
        registration_number: "AB12CDE".to_string(),
        make: "FORD".to_string(),
        model: "FOCUS".to_string(),
        mot_expiry_date: NaiveDate::from_ymd_opt(2025, 3, 15),
        ..Default::default()
    }
}

// ============================================================================
// Mock backend
// ============================================================================

pub struct MockBackend {
    name: String,
    result: Option<ExtractionResult>,
    delay: Duration,
}

impl MockBackend {
    pub fn returning(result: ExtractionResult) -> Self {
        Self {
            name: result.model_name.clone(),
            result: Some(result),
            delay: Duration::ZERO,
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            result: None,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn shared(self) -> Arc<dyn VisionBackend> {
        Arc::new(self)
    }
}

#[async_trait]
impl VisionBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn provider(&self) -> &str {
        "mock"
    }

    async fn extract(&self, _image: &ImageInput) -> Result<ExtractionResult, ExtractionError> {
        tokio::time::sleep(self.delay).await;
        self.result.clone().ok_or_else(|| ExtractionError::Api {
            status: 503,
            message: "mock backend unavailable".to_string(),
        })
    }
}

// ============================================================================
// Mock registry
// ============================================================================

pub enum RegistryBehaviour {
    Found(VehicleRecord),
    NotFound,
    Error,
}

pub struct MockRegistry {
    behaviour: RegistryBehaviour,
    calls: AtomicUsize,
}

impl MockRegistry {
    pub fn new(behaviour: RegistryBehaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Upcast for pipeline construction
pub fn lookup(registry: &Arc<MockRegistry>) -> Option<Arc<dyn RegistryLookup>> {
    let shared: Arc<dyn RegistryLookup> = registry.clone();
    Some(shared)
}

#[async_trait]
impl RegistryLookup for MockRegistry {
    fn name(&self) -> &str {
        "mock-registry"
    }

    async fn lookup(&self, _registration: &str) -> Result<Option<VehicleRecord>, RegistryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behaviour {
            RegistryBehaviour::Found(record) => Ok(Some(record.clone())),
            RegistryBehaviour::NotFound => Ok(None),
            RegistryBehaviour::Error => Err(RegistryError::Api {
                status: 500,
                message: "registry down".to_string(),
            }),
        }
    }
}

// ============================================================================
// Pipeline / app state
// ============================================================================

pub fn pipeline(
    backends: Vec<Arc<dyn VisionBackend>>,
    registry: Option<Arc<dyn RegistryLookup>>,
    timeout: Duration,
) -> EnsemblePipeline {
    EnsemblePipeline::new(ParallelExtractor::new(backends, timeout), engine(), registry)
}

pub fn app_state(
    backends: Vec<Arc<dyn VisionBackend>>,
    registry: Option<Arc<dyn RegistryLookup>>,
) -> AppState {
    app_state_with_config(backends, registry, ServiceConfig::default())
}

pub fn app_state_with_config(
    backends: Vec<Arc<dyn VisionBackend>>,
    registry: Option<Arc<dyn RegistryLookup>>,
    config: ServiceConfig,
) -> AppState {
    AppState::new(pipeline(backends, registry, Duration::from_secs(5)), config)
}

/// Base64 PNG of `len` bytes (signature followed by zero padding)
pub fn png_base64_of_len(len: usize) -> String {
    let mut data = PNG_BYTES.to_vec();
    data.resize(len.max(PNG_BYTES.len()), 0);
    base64::engine::general_purpose::STANDARD.encode(data)
}

/// Three agreeing backends at the given confidence
pub fn agreeing_backends(confidence: f64) -> Vec<Arc<dyn VisionBackend>> {
    [CLAUDE, GPT, GEMINI]
        .into_iter()
        .map(|name| MockBackend::returning(full_result(name, confidence)).shared())
        .collect()
}
