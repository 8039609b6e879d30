//! Model reply parsing
//!
//! Replies are free text that should contain one JSON object. Anything that
//! cannot be read is recovered into a zero-confidence, all-`NOT_FOUND` result
//! rather than an error; only transport failures are errors.

use serde_json::Value;
use std::time::Duration;
use tracing::warn;

use crate::types::{ExtractionResult, Field, NOT_FOUND, UNKNOWN_SOFTWARE};

/// Build an `ExtractionResult` from a raw model reply
pub fn parse_model_reply(model_name: &str, raw: &str, elapsed: Duration) -> ExtractionResult {
    let mut result = match extract_json_object(raw) {
        Some(Value::Object(map)) => {
            let mut result = ExtractionResult::not_found(model_name);
            for field in Field::ALL {
                result.set_value(field, string_field(map.get(field.as_str())));
            }

            let scores = map.get("confidence_scores").and_then(Value::as_object);
            for field in Field::ALL {
                let confidence = scores
                    .and_then(|s| s.get(field.as_str()))
                    .and_then(Value::as_f64)
                    .map(|c| c.clamp(0.0, 1.0))
                    .unwrap_or(0.0);
                result.confidence_scores.insert(field, confidence);
            }

            result.software_detected = map
                .get("software_detected")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(UNKNOWN_SOFTWARE)
                .to_string();
            result
        }
        _ => {
            warn!(
                backend = model_name,
                reply_len = raw.len(),
                "Model reply is not a JSON object, recovering as NOT_FOUND"
            );
            ExtractionResult::not_found(model_name)
        }
    };

    result.raw_response = raw.to_string();
    result.processing_time = elapsed.as_secs_f64();
    result
}

/// Outermost `{ ... }` span of the reply, parsed
fn extract_json_object(raw: &str) -> Option<Value> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&raw[start..=end]).ok()
}

fn string_field(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => NOT_FOUND.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ELAPSED: Duration = Duration::from_millis(1500);

    #[test]
    fn test_parse_wrapped_json() {
        let raw = r#"Here is the data:
        {
            "registration": "AB12 CDE",
            "mot_expiry": "15/03/2025",
            "make": "FORD",
            "model": "",
            "customer_name": "John Smith",
            "customer_phone": "NOT_FOUND",
            "confidence_scores": {"registration": 0.95, "mot_expiry": 1.4, "make": "high"},
            "software_detected": "GarageHive"
        }
        Thanks"#;
        let result = parse_model_reply("gpt-4o", raw, ELAPSED);

        assert_eq!(result.registration, "AB12 CDE");
        assert_eq!(result.model, NOT_FOUND);
        assert_eq!(result.customer_email, NOT_FOUND);
        assert_eq!(result.confidence(Field::Registration), 0.95);
        assert_eq!(result.confidence(Field::MotExpiry), 1.0);
        assert_eq!(result.confidence(Field::Make), 0.0);
        assert_eq!(result.software_detected, "GarageHive");
        assert_eq!(result.model_name, "gpt-4o");
        assert_eq!(result.processing_time, 1.5);
        assert_eq!(result.raw_response, raw);
    }

    #[test]
    fn test_malformed_reply_recovered() {
        for raw in ["I cannot read this image", "{not json}", "} {", ""] {
            let result = parse_model_reply("gemini-1.5-pro", raw, ELAPSED);
            for field in Field::ALL {
                assert!(result.is_not_found(field));
                assert_eq!(result.confidence(field), 0.0);
            }
            assert_eq!(result.software_detected, UNKNOWN_SOFTWARE);
            assert_eq!(result.raw_response, raw);
        }
    }

    #[test]
    fn test_missing_software_is_unknown() {
        let result = parse_model_reply("m", r#"{"registration": "AB12CDE"}"#, ELAPSED);
        assert_eq!(result.software_detected, UNKNOWN_SOFTWARE);
        assert_eq!(result.registration, "AB12CDE");
    }
}
