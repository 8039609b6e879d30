//! Configuration for motx-ensemble
//!
//! TOML sections: `[logging]`, `[server]`, `[ensemble]`, `[backends.*]`,
//! `[registry]`, `[limits]`. Every field has a compiled default so a missing
//! file or a partial file both load.
//!
//! API keys resolve ENV → TOML (see [`motx_common::config::resolve_secret`]).

use motx_common::config::{
    load_toml_config, resolve_config_path, resolve_secret, LoggingConfig, ServerConfig,
    CONFIG_ENV_VAR,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::fusion::{
    ConsensusEngine, ModelWeights, DEFAULT_CONFIDENCE_FLOOR, DEFAULT_MODEL_WEIGHT,
    DEFAULT_REQUIRED_FIELDS,
};
use crate::registry::dvla_client::DVLA_API_URL;
use crate::review::DEFAULT_REVIEW_THRESHOLD;
use crate::types::Field;

pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const GOOGLE_API_KEY_ENV: &str = "GOOGLE_API_KEY";
pub const DVLA_API_KEY_ENV: &str = "DVLA_API_KEY";

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    pub ensemble: EnsembleSettings,
    pub backends: BackendsConfig,
    pub registry: RegistryConfig,
    pub limits: LimitsConfig,
}

impl ServiceConfig {
    /// Resolve the config path (CLI → `MOTX_CONFIG` → user → system) and load it
    pub fn load(cli_path: Option<&Path>) -> motx_common::Result<Self> {
        let path = resolve_config_path(cli_path, CONFIG_ENV_VAR);
        load_toml_config(path.as_deref())
    }
}

/// `[ensemble]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EnsembleSettings {
    /// Joint deadline for all backends (seconds)
    pub model_timeout_secs: u64,
    pub review_threshold: f64,
    pub confidence_floor: f64,
    pub required_fields: Vec<Field>,
    pub default_weight: f64,
    pub model_weights: BTreeMap<String, f64>,
}

impl Default for EnsembleSettings {
    fn default() -> Self {
        Self {
            model_timeout_secs: 60,
            review_threshold: DEFAULT_REVIEW_THRESHOLD,
            confidence_floor: DEFAULT_CONFIDENCE_FLOOR,
            required_fields: DEFAULT_REQUIRED_FIELDS.to_vec(),
            default_weight: DEFAULT_MODEL_WEIGHT,
            model_weights: ModelWeights::default().entries().clone(),
        }
    }
}

impl EnsembleSettings {
    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }

    /// Consensus engine configured from this section
    pub fn engine(&self) -> ConsensusEngine {
        let weights =
            ModelWeights::new(self.model_weights.clone()).with_default_weight(self.default_weight);
        ConsensusEngine::new(weights)
            .with_confidence_floor(self.confidence_floor)
            .with_required_fields(self.required_fields.clone())
            .with_review_threshold(self.review_threshold)
    }
}

/// `[backends.<provider>]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    pub enabled: bool,
    pub api_key: Option<String>,
    /// Model identifier (provider default when unset)
    pub model: Option<String>,
    /// Override of the provider endpoint
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            model: None,
            base_url: None,
            max_tokens: 1000,
            timeout_secs: 30,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// `[backends]` section, in registration order
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendsConfig {
    pub anthropic: BackendConfig,
    pub openai: BackendConfig,
    pub gemini: BackendConfig,
}

impl BackendsConfig {
    pub fn anthropic_api_key(&self) -> Option<String> {
        resolve_secret(
            ANTHROPIC_API_KEY_ENV,
            self.anthropic.api_key.as_deref(),
            "Anthropic API key",
        )
    }

    pub fn openai_api_key(&self) -> Option<String> {
        resolve_secret(OPENAI_API_KEY_ENV, self.openai.api_key.as_deref(), "OpenAI API key")
    }

    pub fn gemini_api_key(&self) -> Option<String> {
        resolve_secret(GOOGLE_API_KEY_ENV, self.gemini.api_key.as_deref(), "Google API key")
    }
}

/// `[registry]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RegistryConfig {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub api_url: String,
    pub timeout_secs: u64,
    pub requests_per_second: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            api_url: DVLA_API_URL.to_string(),
            timeout_secs: 10,
            requests_per_second: 5,
        }
    }
}

impl RegistryConfig {
    pub fn api_key(&self) -> Option<String> {
        resolve_secret(DVLA_API_KEY_ENV, self.api_key.as_deref(), "DVLA API key")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// `[limits]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest accepted decoded image
    pub max_image_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_image_bytes: 10 * 1024 * 1024,
        }
    }
}
