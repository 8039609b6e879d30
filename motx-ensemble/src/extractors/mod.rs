//! Vision backends
//!
//! Each backend implements [`VisionBackend`] and turns one screenshot into one
//! [`ExtractionResult`]. Backends are black boxes to the consensus engine.
//!
//! # Backends
//! 1. **anthropic** - Claude Messages API
//! 2. **openai** - Chat Completions with an image data URL
//! 3. **gemini** - Google `generateContent`
//!
//! # Parallel Execution
//! All backends run concurrently under one joint deadline. A failing backend
//! is logged and excluded; exceeding the deadline fails the whole request.

pub mod anthropic;
pub mod gemini;
pub mod openai;
pub mod prompt;
pub mod response_parser;

pub use prompt::EXTRACTION_PROMPT;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::BackendsConfig;
use crate::error::EnsembleError;
use crate::types::{ExtractionError, ExtractionResult, ImageInput};

/// Descriptive metadata for the models endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendInfo {
    /// Identifier used for weight lookup
    pub name: String,
    pub provider: String,
    pub model_id: String,
    pub available: bool,
    pub capabilities: Vec<String>,
    pub max_image_bytes: usize,
    pub supported_formats: Vec<String>,
}

/// Vision-language model backend
#[async_trait]
pub trait VisionBackend: Send + Sync {
    /// Model identifier (weight table key, `model_name` of results)
    fn name(&self) -> &str;

    fn provider(&self) -> &str;

    fn is_available(&self) -> bool {
        true
    }

    fn info(&self) -> BackendInfo {
        BackendInfo {
            name: self.name().to_string(),
            provider: self.provider().to_string(),
            model_id: self.name().to_string(),
            available: self.is_available(),
            capabilities: vec!["structured_extraction".to_string()],
            max_image_bytes: 0,
            supported_formats: ImageInput::supported_media_types()
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Extract the seven fields from one screenshot
    ///
    /// Malformed model output is recovered into a zero-confidence result;
    /// only transport and API failures return `Err`.
    async fn extract(&self, image: &ImageInput) -> Result<ExtractionResult, ExtractionError>;
}

/// Concurrent backend executor
///
/// Results keep backend registration order regardless of completion order.
pub struct ParallelExtractor {
    backends: Vec<Arc<dyn VisionBackend>>,
    timeout: Duration,
}

impl ParallelExtractor {
    pub fn new(backends: Vec<Arc<dyn VisionBackend>>, timeout: Duration) -> Self {
        Self { backends, timeout }
    }

    /// Run every backend under the joint deadline
    ///
    /// # Errors
    /// - `NoBackendsConfigured` when the executor is empty
    /// - `Timeout` when the joint wait exceeds the deadline (outstanding tasks are aborted)
    pub async fn extract_all(
        &self,
        image: Arc<ImageInput>,
    ) -> Result<Vec<ExtractionResult>, EnsembleError> {
        if self.backends.is_empty() {
            return Err(EnsembleError::NoBackendsConfigured);
        }

        let handles: Vec<_> = self
            .backends
            .iter()
            .map(|backend| {
                let backend = Arc::clone(backend);
                let image = Arc::clone(&image);
                tokio::spawn(async move {
                    let outcome = backend.extract(&image).await;
                    (backend.name().to_string(), outcome)
                })
            })
            .collect();
        let abort_handles: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();

        let joined = match tokio::time::timeout(self.timeout, join_all(handles)).await {
            Ok(joined) => joined,
            Err(_) => {
                for handle in &abort_handles {
                    handle.abort();
                }
                warn!(
                    timeout_secs = self.timeout.as_secs_f64(),
                    backends = self.backends.len(),
                    "Backend extraction timed out"
                );
                return Err(EnsembleError::Timeout(self.timeout));
            }
        };

        let mut results = Vec::with_capacity(joined.len());
        for outcome in joined {
            match outcome {
                Ok((name, Ok(result))) => {
                    debug!(
                        backend = %name,
                        processing_time = result.processing_time,
                        "Extraction successful"
                    );
                    results.push(result);
                }
                Ok((name, Err(e))) => {
                    warn!(backend = %name, error = %e, "Extraction failed, excluding backend");
                }
                Err(e) => {
                    warn!(error = %e, "Backend task panicked, excluding backend");
                }
            }
        }

        info!(
            succeeded = results.len(),
            attempted = self.backends.len(),
            "Parallel extraction complete"
        );
        Ok(results)
    }

    pub fn count(&self) -> usize {
        self.backends.len()
    }

    pub fn backends(&self) -> &[Arc<dyn VisionBackend>] {
        &self.backends
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Build the configured backends in registration order
///
/// Disabled backends and backends without an API key are skipped.
pub fn backends_from_config(config: &BackendsConfig) -> Vec<Arc<dyn VisionBackend>> {
    let mut backends: Vec<Arc<dyn VisionBackend>> = Vec::new();

    if config.anthropic.enabled {
        match config.anthropic_api_key() {
            Some(key) => match anthropic::AnthropicBackend::new(key, &config.anthropic) {
                Ok(backend) => backends.push(Arc::new(backend)),
                Err(e) => warn!(error = %e, "Anthropic backend unavailable"),
            },
            None => warn!("Anthropic API key not configured, backend disabled"),
        }
    }

    if config.openai.enabled {
        match config.openai_api_key() {
            Some(key) => match openai::OpenAiBackend::new(key, &config.openai) {
                Ok(backend) => backends.push(Arc::new(backend)),
                Err(e) => warn!(error = %e, "OpenAI backend unavailable"),
            },
            None => warn!("OpenAI API key not configured, backend disabled"),
        }
    }

    if config.gemini.enabled {
        match config.gemini_api_key() {
            Some(key) => match gemini::GeminiBackend::new(key, &config.gemini) {
                Ok(backend) => backends.push(Arc::new(backend)),
                Err(e) => warn!(error = %e, "Gemini backend unavailable"),
            },
            None => warn!("Google API key not configured, backend disabled"),
        }
    }

    info!(count = backends.len(), "Vision backends initialised");
    backends
}

/// Map a non-success HTTP reply to `ExtractionError::Api`
pub(crate) async fn api_error(response: reqwest::Response) -> ExtractionError {
    let status = response.status().as_u16();
    let message = response
        .text()
        .await
        .unwrap_or_else(|e| format!("<unreadable body: {}>", e));
    ExtractionError::Api { status, message }
}

// ============================================================================
// Mock Backend for Testing
// ============================================================================

#[cfg(test)]
pub mod mock {
    use super::*;

    /// Mock backend returning a canned result after an optional delay
    pub struct MockBackend {
        pub name: &'static str,
        pub result: Option<ExtractionResult>,
        pub delay: Duration,
    }

    impl MockBackend {
        pub fn new(name: &'static str, result: ExtractionResult) -> Self {
            Self {
                name,
                result: Some(result),
                delay: Duration::ZERO,
            }
        }

        pub fn failing(name: &'static str) -> Self {
            Self {
                name,
                result: None,
                delay: Duration::ZERO,
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl VisionBackend for MockBackend {
        fn name(&self) -> &str {
            self.name
        }

        fn provider(&self) -> &str {
            "mock"
        }

        async fn extract(&self, _image: &ImageInput) -> Result<ExtractionResult, ExtractionError> {
            tokio::time::sleep(self.delay).await;
            self.result.clone().ok_or(ExtractionError::Api {
                status: 500,
                message: "Mock failure".to_string(),
            })
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
