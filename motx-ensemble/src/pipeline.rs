//! End-to-end ensemble pipeline
//!
//! ```text
//! image → ParallelExtractor (all backends, joint deadline)
//!       → ConsensusEngine::fuse
//!       → registry lookup (optional)
//!       → ConsensusEngine::finalize (validators + review gate)
//! ```

use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::config::RegistryConfig;
use crate::error::EnsembleError;
use crate::extractors::ParallelExtractor;
use crate::fusion::{ConsensusEngine, EnsembleResult};
use crate::registry::{self, DvlaClient, RegistryLookup};
use crate::types::{Field, ImageInput};

/// Per-request options
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOptions {
    pub validate_with_registry: bool,
    /// Review threshold override (engine default when `None`)
    pub confidence_threshold: Option<f64>,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            validate_with_registry: true,
            confidence_threshold: None,
        }
    }
}

/// Extraction, consensus and cross-check for one screenshot at a time
///
/// Shared across requests; holds no per-request state.
pub struct EnsemblePipeline {
    extractor: ParallelExtractor,
    engine: ConsensusEngine,
    registry: Option<Arc<dyn RegistryLookup>>,
}

impl EnsemblePipeline {
    pub fn new(
        extractor: ParallelExtractor,
        engine: ConsensusEngine,
        registry: Option<Arc<dyn RegistryLookup>>,
    ) -> Self {
        Self {
            extractor,
            engine,
            registry,
        }
    }

    pub fn extractor(&self) -> &ParallelExtractor {
        &self.extractor
    }

    pub fn engine(&self) -> &ConsensusEngine {
        &self.engine
    }

    pub fn registry(&self) -> Option<&Arc<dyn RegistryLookup>> {
        self.registry.as_ref()
    }

    /// Run the whole ensemble on one image
    ///
    /// # Errors
    /// - `NoBackendsConfigured` / `Timeout` from the extractor
    /// - `NoSuccessfulExtractions` when every backend failed
    pub async fn process_image(
        &self,
        image: ImageInput,
        options: &ProcessOptions,
    ) -> Result<EnsembleResult, EnsembleError> {
        let started = Instant::now();

        let results = self.extractor.extract_all(Arc::new(image)).await?;
        let outcome = self.engine.fuse(results)?;

        let registry_check = match (&self.registry, options.validate_with_registry) {
            (Some(lookup), true) if !outcome.consensus.is_not_found(Field::Registration) => {
                Some(registry::verify(lookup.as_ref(), &outcome.consensus).await)
            }
            _ => None,
        };

        let threshold = options
            .confidence_threshold
            .unwrap_or_else(|| self.engine.review_threshold());
        let result = self
            .engine
            .finalize(outcome, registry_check, threshold, started.elapsed());

        info!(
            processing_time = result.processing_time,
            models_used = result.models_used.len(),
            requires_manual_review = result.requires_manual_review,
            "Image processed"
        );
        Ok(result)
    }
}

/// Build the registry client when enabled and keyed
pub fn registry_from_config(config: &RegistryConfig) -> Option<Arc<dyn RegistryLookup>> {
    if !config.enabled {
        info!("Registry cross-check disabled");
        return None;
    }

    let api_key = match config.api_key() {
        Some(key) => key,
        None => {
            warn!("DVLA API key not configured, registry cross-check disabled");
            return None;
        }
    };

    match DvlaClient::with_options(
        api_key,
        config.api_url.clone(),
        config.timeout(),
        config.requests_per_second,
    ) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            warn!(error = %e, "Registry client unavailable");
            None
        }
    }
}
