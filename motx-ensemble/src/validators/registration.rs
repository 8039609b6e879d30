//! UK vehicle registration validator
//!
//! # Algorithm
//! 1. Normalise: uppercase, strip whitespace, apply OCR substitution
//! 2. Match against the ordered format families (first match wins)
//! 3. Current format: look up the age identifier, flag unknown codes and future years
//! 4. Penalise suspicious local character patterns (0.1 each, floor 0)
//! 5. Valid = no errors AND confidence >= 0.5

use super::OcrSubstitution;
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::is_not_found;

const INVALID_AGE_IDENTIFIER_PENALTY: f64 = 0.3;
const FUTURE_YEAR_PENALTY: f64 = 0.4;
const SUSPICIOUS_PATTERN_PENALTY: f64 = 0.1;
const MIN_VALID_CONFIDENCE: f64 = 0.5;

/// Last year covered by the age identifier table
pub const LATEST_AGE_IDENTIFIER_YEAR: i32 = 2027;

/// Registration format families, in match order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationFormat {
    Current,
    Prefix,
    Suffix,
    Dateless,
    NorthernIreland,
    Unknown,
}

impl RegistrationFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Prefix => "prefix",
            Self::Suffix => "suffix",
            Self::Dateless => "dateless",
            Self::NorthernIreland => "northern_ireland",
            Self::Unknown => "unknown",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Current => "Current format (2001-present): AB12 CDE",
            Self::Prefix => "Prefix format (1983-2001): A123 BCD",
            Self::Suffix => "Suffix format (1963-1983): ABC 123D",
            Self::Dateless => "Dateless format (pre-1963): 1234 AB",
            Self::NorthernIreland => "Northern Ireland format: ABC 1234",
            Self::Unknown => "Unrecognised format",
        }
    }

    pub fn example(self) -> Option<&'static str> {
        match self {
            Self::Current => Some("AB12 CDE"),
            Self::Prefix => Some("A123 BCD"),
            Self::Suffix => Some("ABC 123D"),
            Self::Dateless => Some("1234 AB"),
            Self::NorthernIreland => Some("ABC 1234"),
            Self::Unknown => None,
        }
    }
}

static FORMAT_PATTERNS: Lazy<Vec<(RegistrationFormat, Regex)>> = Lazy::new(|| {
    [
        (RegistrationFormat::Current, r"^[A-Z]{2}[0-9]{2}[A-Z]{3}$"),
        (RegistrationFormat::Prefix, r"^[A-Z][0-9]{1,3}[A-Z]{3}$"),
        (RegistrationFormat::Suffix, r"^[A-Z]{3}[0-9]{1,3}[A-Z]$"),
        (RegistrationFormat::Dateless, r"^[0-9]{1,4}[A-Z]{1,3}$"),
        (RegistrationFormat::NorthernIreland, r"^[A-Z]{1,3}[0-9]{1,4}$"),
    ]
    .into_iter()
    .map(|(format, pattern)| (format, Regex::new(pattern).expect("static registration pattern")))
    .collect()
});

/// Character sequences typical of OCR misreads
static SUSPICIOUS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"[0-9][A-Z][0-9]",
        r"[A-Z][0-9][A-Z][0-9][A-Z]",
        r"[IL1|]{2}",
        r"[O0]{2}",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("static suspicious pattern"))
    .collect()
});

/// Result of registration validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationValidationResult {
    pub is_valid: bool,
    pub format_type: RegistrationFormat,
    pub confidence_score: f64,
    pub normalized_registration: String,
    pub validation_errors: Vec<String>,
    /// Two-digit age identifier (current format only)
    pub age_identifier: Option<String>,
    /// Year derived from the age identifier
    pub estimated_year: Option<i32>,
    /// Memory-tag region of the first letter (current format only)
    pub area_region: Option<String>,
}

impl RegistrationValidationResult {
    fn rejected(normalized: String, error: &str) -> Self {
        Self {
            is_valid: false,
            format_type: RegistrationFormat::Unknown,
            confidence_score: 0.0,
            normalized_registration: normalized,
            validation_errors: vec![error.to_string()],
            age_identifier: None,
            estimated_year: None,
            area_region: None,
        }
    }
}

/// Validator for UK vehicle registration numbers
#[derive(Debug, Clone)]
pub struct RegistrationValidator {
    substitution: OcrSubstitution,
}

impl Default for RegistrationValidator {
    fn default() -> Self {
        Self {
            substitution: OcrSubstitution::registration_default(),
        }
    }
}

impl RegistrationValidator {
    pub fn with_substitution(substitution: OcrSubstitution) -> Self {
        Self { substitution }
    }

    /// Validate against today's date
    pub fn validate(&self, registration: &str) -> RegistrationValidationResult {
        self.validate_on(registration, chrono::Local::now().date_naive())
    }

    /// Validate with an explicit "today" (future-year check)
    pub fn validate_on(&self, registration: &str, today: NaiveDate) -> RegistrationValidationResult {
        if registration.trim().is_empty() || is_not_found(registration) {
            return RegistrationValidationResult::rejected(
                String::new(),
                "Registration is empty or not found",
            );
        }

        let normalized = self.normalize(registration);

        let Some(format_type) = identify_format(&normalized) else {
            debug!(registration = %normalized, "No registration format matched");
            return RegistrationValidationResult::rejected(
                normalized,
                "Does not match any known UK registration format",
            );
        };

        let mut errors = Vec::new();
        let mut confidence = 1.0;
        let mut age_identifier = None;
        let mut estimated_year = None;
        let mut region = None;

        if format_type == RegistrationFormat::Current {
            region = normalized
                .chars()
                .next()
                .and_then(area_region)
                .map(str::to_string);

            let age_code = &normalized[2..4];
            match age_identifier_year(age_code) {
                Some(year) => {
                    age_identifier = Some(age_code.to_string());
                    estimated_year = Some(year);
                }
                None => {
                    errors.push(format!("Invalid age identifier: {}", age_code));
                    confidence -= INVALID_AGE_IDENTIFIER_PENALTY;
                }
            }

            if let Some(year) = estimated_year {
                if year > today.year() + 1 {
                    errors.push(format!(
                        "Registration appears to be from future year: {}",
                        year
                    ));
                    confidence -= FUTURE_YEAR_PENALTY;
                }
            }
        }

        let suspicious = suspicious_pattern_count(&normalized);
        let confidence = (confidence - SUSPICIOUS_PATTERN_PENALTY * suspicious as f64).max(0.0);
        let is_valid = errors.is_empty() && confidence >= MIN_VALID_CONFIDENCE;

        debug!(
            registration = %normalized,
            format = format_type.as_str(),
            confidence,
            suspicious,
            is_valid,
            "Registration validated"
        );

        RegistrationValidationResult {
            is_valid,
            format_type,
            confidence_score: confidence,
            normalized_registration: normalized,
            validation_errors: errors,
            age_identifier,
            estimated_year,
            area_region: region,
        }
    }

    /// Uppercase, strip whitespace, then apply the OCR substitution
    pub fn normalize(&self, registration: &str) -> String {
        let compact: String = registration
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_uppercase)
            .collect();
        self.substitution.apply(&compact)
    }
}

fn identify_format(normalized: &str) -> Option<RegistrationFormat> {
    FORMAT_PATTERNS
        .iter()
        .find(|(_, pattern)| pattern.is_match(normalized))
        .map(|(format, _)| *format)
}

fn suspicious_pattern_count(normalized: &str) -> usize {
    SUSPICIOUS_PATTERNS
        .iter()
        .filter(|pattern| pattern.is_match(normalized))
        .count()
}

/// Age identifier → year
///
/// March codes `01`-`27` and September codes `51`-`77` (2001-2027).
pub fn age_identifier_year(code: &str) -> Option<i32> {
    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let n: i32 = code.parse().ok()?;
    let latest = LATEST_AGE_IDENTIFIER_YEAR - 2000;
    if (1..=latest).contains(&n) {
        Some(2000 + n)
    } else if (51..=50 + latest).contains(&n) {
        Some(1950 + n)
    } else {
        None
    }
}

/// Memory-tag area letter → DVLA region
pub fn area_region(letter: char) -> Option<&'static str> {
    let region = match letter {
        'A' => "Peterborough",
        'B' => "Birmingham",
        'C' => "Cymru (Wales)",
        'D' => "Deeside",
        'E' => "Dudley",
        'F' => "Forest & Fens",
        'G' => "Garden of England",
        'H' => "Hampshire & Dorset",
        'K' => "Luton",
        'L' => "London",
        'M' => "Manchester",
        'N' => "Newcastle",
        'O' => "Oxford",
        'P' => "Preston",
        'R' => "Reading",
        'S' => "Scotland",
        'V' => "Severn Valley",
        'W' => "West of England",
        'Y' => "Yorkshire",
        _ => return None,
    };
    Some(region)
}
