//! Anthropic Claude backend
//!
//! # API Reference
//! - Endpoint: https://api.anthropic.com/v1/messages
//! - Image sent as a base64 `image` content block ahead of the prompt

use super::{api_error, response_parser, BackendInfo, VisionBackend, EXTRACTION_PROMPT};
use crate::config::BackendConfig;
use crate::types::{ExtractionError, ExtractionResult, ImageInput};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Instant;
use tracing::debug;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default model identifier
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

const SUPPORTED_FORMATS: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];
const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// Claude vision backend
pub struct AnthropicBackend {
    http_client: Client,
    api_key: String,
    api_url: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicBackend {
    pub fn new(api_key: String, config: &BackendConfig) -> Result<Self, ExtractionError> {
        let http_client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ExtractionError::NotAvailable(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_key,
            api_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| ANTHROPIC_API_URL.to_string()),
            model: config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: config.max_tokens,
        })
    }

    fn request_body(&self, image: &ImageInput) -> serde_json::Value {
        json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": 0.1,
            "messages": [{
                "role": "user",
                "content": [
                    {
                        "type": "image",
                        "source": {
                            "type": "base64",
                            "media_type": image.media_type,
                            "data": image.to_base64(),
                        }
                    },
                    { "type": "text", "text": EXTRACTION_PROMPT }
                ]
            }]
        })
    }
}

#[async_trait]
impl VisionBackend for AnthropicBackend {
    fn name(&self) -> &str {
        &self.model
    }

    fn provider(&self) -> &str {
        "Anthropic"
    }

    fn info(&self) -> BackendInfo {
        BackendInfo {
            name: self.name().to_string(),
            provider: self.provider().to_string(),
            model_id: self.model.clone(),
            available: self.is_available(),
            capabilities: vec![
                "high_accuracy_ocr".to_string(),
                "context_understanding".to_string(),
                "structured_extraction".to_string(),
                "confidence_scoring".to_string(),
            ],
            max_image_bytes: MAX_IMAGE_BYTES,
            supported_formats: SUPPORTED_FORMATS.iter().map(|s| s.to_string()).collect(),
        }
    }

    async fn extract(&self, image: &ImageInput) -> Result<ExtractionResult, ExtractionError> {
        if !SUPPORTED_FORMATS.contains(&image.media_type.as_str()) {
            return Err(ExtractionError::InvalidImage(format!(
                "{} not accepted by Anthropic",
                image.media_type
            )));
        }

        let started = Instant::now();
        debug!(backend = %self.model, "Sending Anthropic request");

        let response = self
            .http_client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.request_body(image))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let body: MessagesResponse = response.json().await?;
        let text: String = body
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n");

        Ok(response_parser::parse_model_reply(
            &self.model,
            &text,
            started.elapsed(),
        ))
    }
}
