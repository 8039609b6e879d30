//! MOT expiry date validator
//!
//! Fuzzy parser for the date strings VLMs read off garage screens. Label words
//! are stripped, numeric tokens get OCR correction, then an ordered list of
//! patterns is searched (first parseable match wins).

use super::OcrSubstitution;
use chrono::{Datelike, Duration, NaiveDate};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::is_not_found;

/// Output format of `normalized_date`
pub const NORMALIZED_DATE_FORMAT: &str = "%d/%m/%Y";

/// MOT testing began in 1960
const EARLIEST_PLAUSIBLE_YEAR: i32 = 1960;
const PLAUSIBLE_WINDOW_DAYS: i64 = 365 * 2;
const MAX_YEARS_AHEAD: i32 = 5;

const PAST_PENALTY: f64 = 0.3;
const FUTURE_PENALTY: f64 = 0.4;
const IMPOSSIBLE_YEAR_PENALTY: f64 = 0.5;
const MIN_VALID_CONFIDENCE: f64 = 0.5;

const URGENT_DAYS: i64 = 30;
const SOON_DAYS: i64 = 60;

/// Date pattern families, in match order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateFormat {
    #[serde(rename = "DD/MM/YYYY")]
    DayMonthYearSlash,
    #[serde(rename = "DD-MM-YYYY")]
    DayMonthYearDash,
    #[serde(rename = "DD.MM.YYYY")]
    DayMonthYearDot,
    #[serde(rename = "YYYY-MM-DD")]
    Iso,
    #[serde(rename = "DD Mon YYYY")]
    DayAbbreviatedMonthYear,
    #[serde(rename = "DD Month YYYY")]
    DayFullMonthYear,
}

impl DateFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DayMonthYearSlash => "DD/MM/YYYY",
            Self::DayMonthYearDash => "DD-MM-YYYY",
            Self::DayMonthYearDot => "DD.MM.YYYY",
            Self::Iso => "YYYY-MM-DD",
            Self::DayAbbreviatedMonthYear => "DD Mon YYYY",
            Self::DayFullMonthYear => "DD Month YYYY",
        }
    }

    /// Base confidence before reasonableness checks
    ///
    /// Slash-separated day-first is what UK screens show; ISO is atypical.
    pub fn base_confidence(self) -> f64 {
        match self {
            Self::DayMonthYearSlash => 1.0,
            Self::DayMonthYearDash | Self::DayMonthYearDot => 0.9,
            Self::Iso => 0.7,
            Self::DayAbbreviatedMonthYear | Self::DayFullMonthYear => 0.8,
        }
    }

    fn build(self, caps: &Captures<'_>) -> Option<NaiveDate> {
        let num = |i: usize| caps.get(i)?.as_str().parse::<u32>().ok();
        match self {
            Self::DayMonthYearSlash | Self::DayMonthYearDash | Self::DayMonthYearDot => {
                NaiveDate::from_ymd_opt(num(3)? as i32, num(2)?, num(1)?)
            }
            Self::Iso => NaiveDate::from_ymd_opt(num(1)? as i32, num(2)?, num(3)?),
            Self::DayAbbreviatedMonthYear | Self::DayFullMonthYear => {
                let month = month_number(caps.get(2)?.as_str())?;
                NaiveDate::from_ymd_opt(num(3)? as i32, month, num(1)?)
            }
        }
    }
}

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

fn month_number(name: &str) -> Option<u32> {
    let name = name.to_lowercase();
    MONTHS
        .iter()
        .position(|month| *month == name || month[..3] == name)
        .map(|index| index as u32 + 1)
}

static DATE_PATTERNS: Lazy<Vec<(DateFormat, Regex)>> = Lazy::new(|| {
    [
        (DateFormat::DayMonthYearSlash, r"(\d{2})/(\d{2})/(\d{4})"),
        (DateFormat::DayMonthYearDash, r"(\d{2})-(\d{2})-(\d{4})"),
        (DateFormat::DayMonthYearDot, r"(\d{2})\.(\d{2})\.(\d{4})"),
        (DateFormat::Iso, r"(\d{4})-(\d{2})-(\d{2})"),
        (
            DateFormat::DayAbbreviatedMonthYear,
            r"(?i)(\d{1,2})\s+(Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)\s+(\d{4})",
        ),
        (
            DateFormat::DayFullMonthYear,
            r"(?i)(\d{1,2})\s+(January|February|March|April|May|June|July|August|September|October|November|December)\s+(\d{4})",
        ),
    ]
    .into_iter()
    .map(|(format, pattern)| (format, Regex::new(pattern).expect("static date pattern")))
    .collect()
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static pattern"));

static LEADING_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(MOT|Expires?|Due|Until)\s*:?\s*").expect("static pattern"));

static TRAILING_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*(MOT|Expiry|Due)$").expect("static pattern"));

/// Result of date validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateValidationResult {
    pub is_valid: bool,
    pub parsed_date: Option<NaiveDate>,
    /// `DD/MM/YYYY` when parsed, otherwise the cleaned input
    pub normalized_date: String,
    pub confidence_score: f64,
    pub validation_errors: Vec<String>,
    pub is_expired: bool,
    /// Absent once expired
    pub days_until_expiry: Option<i64>,
    /// Days past expiry (expired dates only)
    pub days_since_expiry: Option<i64>,
    /// Pattern family that matched
    pub format: Option<DateFormat>,
}

impl DateValidationResult {
    fn unparsed(normalized: String, error: &str) -> Self {
        Self {
            is_valid: false,
            parsed_date: None,
            normalized_date: normalized,
            confidence_score: 0.0,
            validation_errors: vec![error.to_string()],
            is_expired: false,
            days_until_expiry: None,
            days_since_expiry: None,
            format: None,
        }
    }

    /// Human-readable expiry status, `None` when no date was parsed
    pub fn expiry_summary(&self) -> Option<String> {
        self.parsed_date?;
        if self.is_expired {
            return Some(format!(
                "Expired {} days ago",
                self.days_since_expiry.unwrap_or(0)
            ));
        }
        let days = self.days_until_expiry?;
        let summary = if days <= URGENT_DAYS {
            format!("Expires in {} days (URGENT)", days)
        } else if days <= SOON_DAYS {
            format!("Expires in {} days (SOON)", days)
        } else {
            format!("Expires in {} days", days)
        };
        Some(summary)
    }
}

/// Validator for MOT expiry dates
#[derive(Debug, Clone)]
pub struct DateValidator {
    substitution: OcrSubstitution,
}

impl Default for DateValidator {
    fn default() -> Self {
        Self {
            substitution: OcrSubstitution::date_default(),
        }
    }
}

impl DateValidator {
    pub fn with_substitution(substitution: OcrSubstitution) -> Self {
        Self { substitution }
    }

    /// Validate against today's date
    pub fn validate(&self, date: &str) -> DateValidationResult {
        self.validate_on(date, chrono::Local::now().date_naive())
    }

    /// Validate with an explicit "today"
    pub fn validate_on(&self, date: &str, today: NaiveDate) -> DateValidationResult {
        if date.trim().is_empty() || is_not_found(date) {
            return DateValidationResult::unparsed(String::new(), "Date is empty or not found");
        }

        let cleaned = self.clean(date);
        let Some((parsed, format)) = parse_cleaned(&cleaned) else {
            debug!(date = %cleaned, "Date not parseable");
            return DateValidationResult::unparsed(cleaned, "Could not parse date format");
        };

        let mut errors = Vec::new();
        let confidence = check_reasonableness(parsed, format.base_confidence(), today, &mut errors);

        let days = (parsed - today).num_days();
        let is_expired = days < 0;
        let is_valid = errors.is_empty() && confidence >= MIN_VALID_CONFIDENCE;

        debug!(
            date = %parsed,
            format = format.as_str(),
            confidence,
            days,
            is_valid,
            "Date validated"
        );

        DateValidationResult {
            is_valid,
            parsed_date: Some(parsed),
            normalized_date: parsed.format(NORMALIZED_DATE_FORMAT).to_string(),
            confidence_score: confidence,
            validation_errors: errors,
            is_expired,
            days_until_expiry: (!is_expired).then_some(days),
            days_since_expiry: is_expired.then_some(-days),
            format: Some(format),
        }
    }

    /// Parse without reasonableness checks (used for registry comparison)
    pub fn parse(&self, date: &str) -> Option<NaiveDate> {
        if is_not_found(date) {
            return None;
        }
        parse_cleaned(&self.clean(date)).map(|(parsed, _)| parsed)
    }

    /// Collapse whitespace, strip label words, OCR-correct numeric tokens
    pub fn clean(&self, date: &str) -> String {
        let collapsed = WHITESPACE.replace_all(date.trim(), " ");
        let stripped = LEADING_LABEL.replace(&collapsed, "");
        let stripped = TRAILING_LABEL.replace(&stripped, "");

        stripped
            .trim()
            .split(' ')
            .map(|token| {
                if token.chars().any(|c| c.is_ascii_digit()) {
                    self.substitution.apply(token)
                } else {
                    token.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn parse_cleaned(cleaned: &str) -> Option<(NaiveDate, DateFormat)> {
    DATE_PATTERNS.iter().find_map(|(format, pattern)| {
        let caps = pattern.captures(cleaned)?;
        // Calendar-invalid match (e.g. 32/01) falls through to the next pattern
        format.build(&caps).map(|date| (date, *format))
    })
}

fn check_reasonableness(
    date: NaiveDate,
    base_confidence: f64,
    today: NaiveDate,
    errors: &mut Vec<String>,
) -> f64 {
    let mut confidence = base_confidence;
    let window = Duration::days(PLAUSIBLE_WINDOW_DAYS);

    if date < today - window {
        errors.push("Date is more than 2 years in the past".to_string());
        confidence -= PAST_PENALTY;
    }
    if date > today + window {
        errors.push("Date is more than 2 years in the future".to_string());
        confidence -= FUTURE_PENALTY;
    }
    if date.year() < EARLIEST_PLAUSIBLE_YEAR {
        errors.push("Date is before MOT testing began".to_string());
        confidence -= IMPOSSIBLE_YEAR_PENALTY;
    }
    if date.year() > today.year() + MAX_YEARS_AHEAD {
        errors.push("Date is unreasonably far in the future".to_string());
        confidence -= IMPOSSIBLE_YEAR_PENALTY;
    }

    confidence.max(0.0)
}
