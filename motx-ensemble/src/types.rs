//! Core data contracts shared by backends, the consensus engine and the API
//!
//! Every backend produces one [`ExtractionResult`] per image. Results are
//! immutable once produced and live only for the duration of one request.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Reserved value meaning "field absent or unreadable" (distinct from empty string)
pub const NOT_FOUND: &str = "NOT_FOUND";

/// Software label reported when the garage software could not be identified
pub const UNKNOWN_SOFTWARE: &str = "UNKNOWN";

/// Source name carried by the fused result
pub const ENSEMBLE_SOURCE: &str = "ENSEMBLE";

/// Raw-response marker carried by the fused result
pub const ENSEMBLE_RAW_RESPONSE: &str = "ENSEMBLE_CONSENSUS";

/// Per-field confidence map (0.0-1.0)
pub type ConfidenceScores = BTreeMap<Field, f64>;

// ============================================================================
// Fields
// ============================================================================

/// The seven semantic fields extracted from a screenshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Registration,
    MotExpiry,
    Make,
    Model,
    CustomerName,
    CustomerPhone,
    CustomerEmail,
}

impl Field {
    /// All fields in canonical order
    pub const ALL: [Field; 7] = [
        Field::Registration,
        Field::MotExpiry,
        Field::Make,
        Field::Model,
        Field::CustomerName,
        Field::CustomerPhone,
        Field::CustomerEmail,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::Registration => "registration",
            Field::MotExpiry => "mot_expiry",
            Field::Make => "make",
            Field::Model => "model",
            Field::CustomerName => "customer_name",
            Field::CustomerPhone => "customer_phone",
            Field::CustomerEmail => "customer_email",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| format!("Unknown field: {}", s))
    }
}

// ============================================================================
// Extraction result
// ============================================================================

/// Output of one backend for one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub registration: String,
    pub mot_expiry: String,
    pub make: String,
    pub model: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: String,

    /// Field → confidence (0.0-1.0). Missing entries read as 0.0.
    #[serde(default)]
    pub confidence_scores: ConfidenceScores,

    /// Detected garage software label, or `UNKNOWN`
    #[serde(default = "unknown_software")]
    pub software_detected: String,

    /// Raw backend reply, kept for audit
    #[serde(default)]
    pub raw_response: String,

    /// Processing latency in seconds
    #[serde(default)]
    pub processing_time: f64,

    /// Backend identifier (used for weight lookup)
    pub model_name: String,
}

fn unknown_software() -> String {
    UNKNOWN_SOFTWARE.to_string()
}

impl ExtractionResult {
    /// Result with every field `NOT_FOUND` and zero confidence
    pub fn not_found(model_name: impl Into<String>) -> Self {
        Self {
            registration: NOT_FOUND.to_string(),
            mot_expiry: NOT_FOUND.to_string(),
            make: NOT_FOUND.to_string(),
            model: NOT_FOUND.to_string(),
            customer_name: NOT_FOUND.to_string(),
            customer_phone: NOT_FOUND.to_string(),
            customer_email: NOT_FOUND.to_string(),
            confidence_scores: Field::ALL.into_iter().map(|f| (f, 0.0)).collect(),
            software_detected: unknown_software(),
            raw_response: String::new(),
            processing_time: 0.0,
            model_name: model_name.into(),
        }
    }

    /// Value of a field
    pub fn value(&self, field: Field) -> &str {
        match field {
            Field::Registration => &self.registration,
            Field::MotExpiry => &self.mot_expiry,
            Field::Make => &self.make,
            Field::Model => &self.model,
            Field::CustomerName => &self.customer_name,
            Field::CustomerPhone => &self.customer_phone,
            Field::CustomerEmail => &self.customer_email,
        }
    }

    /// Replace the value of a field
    pub fn set_value(&mut self, field: Field, value: impl Into<String>) {
        let value = value.into();
        match field {
            Field::Registration => self.registration = value,
            Field::MotExpiry => self.mot_expiry = value,
            Field::Make => self.make = value,
            Field::Model => self.model = value,
            Field::CustomerName => self.customer_name = value,
            Field::CustomerPhone => self.customer_phone = value,
            Field::CustomerEmail => self.customer_email = value,
        }
    }

    /// Confidence of a field (0.0 when the backend did not report one)
    pub fn confidence(&self, field: Field) -> f64 {
        self.confidence_scores.get(&field).copied().unwrap_or(0.0)
    }

    /// True when the field holds the not-found sentinel
    pub fn is_not_found(&self, field: Field) -> bool {
        is_not_found(self.value(field))
    }

    /// Field → value map in canonical order
    pub fn field_values(&self) -> BTreeMap<Field, String> {
        Field::ALL
            .into_iter()
            .map(|field| (field, self.value(field).to_string()))
            .collect()
    }
}

/// True when a raw value is the not-found sentinel
pub fn is_not_found(value: &str) -> bool {
    value.trim() == NOT_FOUND
}

// ============================================================================
// Image input
// ============================================================================

/// Media types accepted from callers
const SUPPORTED_MEDIA_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/bmp",
    "image/tiff",
    "image/webp",
    "image/gif",
];

/// Screenshot bytes handed to every backend
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub data: Vec<u8>,
    pub media_type: String,
}

impl ImageInput {
    /// Wrap raw bytes, sniffing the media type from magic bytes
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, ExtractionError> {
        if data.is_empty() {
            return Err(ExtractionError::InvalidImage("Image is empty".to_string()));
        }

        let media_type = infer::get(&data)
            .map(|kind| kind.mime_type())
            .ok_or_else(|| ExtractionError::InvalidImage("Unrecognised image format".to_string()))?;

        if !SUPPORTED_MEDIA_TYPES.contains(&media_type) {
            return Err(ExtractionError::InvalidImage(format!(
                "Unsupported image type: {}",
                media_type
            )));
        }

        Ok(Self {
            data,
            media_type: media_type.to_string(),
        })
    }

    /// Base64 (standard alphabet, padded) encoding of the image bytes
    pub fn to_base64(&self) -> String {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }

    /// Supported media types
    pub fn supported_media_types() -> &'static [&'static str] {
        SUPPORTED_MEDIA_TYPES
    }
}

// ============================================================================
// Backend errors
// ============================================================================

/// Transport-tier backend failure
///
/// Malformed model replies are NOT errors: backends recover them into a
/// zero-confidence result (see `extractors::response_parser`).
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Network communication error
    #[error("Network error: {0}")]
    Network(String),

    /// Backend API returned a non-success status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Backend did not answer in time
    #[error("Backend request timed out")]
    Timeout,

    /// Image could not be prepared for the backend
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// Backend not configured (missing API key etc.)
    #[error("Backend not available: {0}")]
    NotAvailable(String),
}

impl From<reqwest::Error> for ExtractionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExtractionError::Timeout
        } else {
            ExtractionError::Network(err.to_string())
        }
    }
}
