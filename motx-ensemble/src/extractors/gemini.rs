//! Google Gemini backend
//!
//! # API Reference
//! - Endpoint: https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent
//! - Image sent as `inline_data` alongside the prompt text part

use super::{api_error, response_parser, BackendInfo, VisionBackend, EXTRACTION_PROMPT};
use crate::config::BackendConfig;
use crate::types::{ExtractionError, ExtractionResult, ImageInput};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Instant;
use tracing::debug;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Default model identifier
pub const DEFAULT_MODEL: &str = "gemini-1.5-pro";

const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

/// Gemini vision backend
pub struct GeminiBackend {
    http_client: Client,
    api_key: String,
    api_base: String,
    model: String,
    max_tokens: u32,
}

impl GeminiBackend {
    pub fn new(api_key: String, config: &BackendConfig) -> Result<Self, ExtractionError> {
        let http_client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ExtractionError::NotAvailable(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_key,
            api_base: config
                .base_url
                .clone()
                .unwrap_or_else(|| GEMINI_API_BASE.to_string()),
            model: config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: config.max_tokens,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", self.api_base, self.model)
    }

    fn request_body(&self, image: &ImageInput) -> serde_json::Value {
        json!({
            "contents": [{
                "parts": [
                    { "text": EXTRACTION_PROMPT },
                    {
                        "inline_data": {
                            "mime_type": image.media_type,
                            "data": image.to_base64(),
                        }
                    }
                ]
            }],
            "generationConfig": {
                "temperature": 0.1,
                "maxOutputTokens": self.max_tokens,
            }
        })
    }
}

#[async_trait]
impl VisionBackend for GeminiBackend {
    fn name(&self) -> &str {
        &self.model
    }

    fn provider(&self) -> &str {
        "Google"
    }

    fn info(&self) -> BackendInfo {
        BackendInfo {
            name: self.name().to_string(),
            provider: self.provider().to_string(),
            model_id: self.model.clone(),
            available: self.is_available(),
            capabilities: vec![
                "multimodal_understanding".to_string(),
                "structured_extraction".to_string(),
                "confidence_scoring".to_string(),
            ],
            max_image_bytes: MAX_IMAGE_BYTES,
            supported_formats: ImageInput::supported_media_types()
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    async fn extract(&self, image: &ImageInput) -> Result<ExtractionResult, ExtractionError> {
        let started = Instant::now();
        debug!(backend = %self.model, "Sending Gemini request");

        let response = self
            .http_client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(image))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let body: GenerateResponse = response.json().await?;
        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();

        Ok(response_parser::parse_model_reply(
            &self.model,
            &text,
            started.elapsed(),
        ))
    }
}
