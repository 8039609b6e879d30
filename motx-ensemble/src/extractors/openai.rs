//! OpenAI GPT-4o backend
//!
//! # API Reference
//! - Endpoint: https://api.openai.com/v1/chat/completions
//! - Image sent as a `data:` URL in an `image_url` content part

use super::{api_error, response_parser, BackendInfo, VisionBackend, EXTRACTION_PROMPT};
use crate::config::BackendConfig;
use crate::types::{ExtractionError, ExtractionResult, ImageInput};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Instant;
use tracing::debug;

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Default model identifier
pub const DEFAULT_MODEL: &str = "gpt-4o";

const SUPPORTED_FORMATS: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];
const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// GPT-4o vision backend
pub struct OpenAiBackend {
    http_client: Client,
    api_key: String,
    api_url: String,
    model: String,
    max_tokens: u32,
}

impl OpenAiBackend {
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
                .unwrap_or_else(|| OPENAI_API_URL.to_string()),
            model: config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: config.max_tokens,
        })
    }

    fn request_body(&self, image: &ImageInput) -> serde_json::Value {
        let data_url = format!("data:{};base64,{}", image.media_type, image.to_base64());
        json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": 0.1,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": EXTRACTION_PROMPT },
                    {
                        "type": "image_url",
                        "image_url": { "url": data_url, "detail": "high" }
                    }
                ]
            }]
        })
    }
}

#[async_trait]
impl VisionBackend for OpenAiBackend {
    fn name(&self) -> &str {
        &self.model
    }

    fn provider(&self) -> &str {
        "OpenAI"
    }

    fn info(&self) -> BackendInfo {
        BackendInfo {
            name: self.name().to_string(),
            provider: self.provider().to_string(),
            model_id: self.model.clone(),
            available: self.is_available(),
            capabilities: vec![
                "general_vision".to_string(),
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
                "{} not accepted by OpenAI",
                image.media_type
            )));
        }

        let started = Instant::now();
        debug!(backend = %self.model, "Sending OpenAI request");

        let response = self
            .http_client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(image))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let body: ChatResponse = response.json().await?;
        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        Ok(response_parser::parse_model_reply(
            &self.model,
            &text,
            started.elapsed(),
        ))
    }
}
