//! Field Validators
//!
//! Two independent, stateless validators score the consensus registration and
//! MOT expiry strings. Both are pure functions of their input plus a "today"
//! date, never fail on malformed input, and are safe to call concurrently.
//!
//! # Validators
//! 1. **registration** - UK registration format families, age identifier, OCR suspicion
//! 2. **date** - Fuzzy expiry-date parsing and reasonableness checks

pub mod date;
pub mod registration;

pub use date::{DateFormat, DateValidationResult, DateValidator};
pub use registration::{RegistrationFormat, RegistrationValidationResult, RegistrationValidator};

/// One-directional OCR confusion substitution (glyph → digit)
///
/// Lossy: once a letter is coerced to a digit it is never restored.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrSubstitution {
    pairs: Vec<(char, char)>,
}

impl OcrSubstitution {
    pub fn new(pairs: Vec<(char, char)>) -> Self {
        Self { pairs }
    }

    /// Substitution applied to normalised (uppercase) registrations
    pub fn registration_default() -> Self {
        Self::new(vec![('O', '0'), ('I', '1'), ('S', '5')])
    }

    /// Substitution applied to numeric date tokens
    pub fn date_default() -> Self {
        Self::new(vec![
            ('O', '0'),
            ('o', '0'),
            ('I', '1'),
            ('l', '1'),
            ('S', '5'),
            ('s', '5'),
            ('G', '6'),
            ('B', '8'),
            ('Z', '2'),
            ('z', '2'),
        ])
    }

    pub fn apply(&self, input: &str) -> String {
        input.chars().map(|c| self.substitute(c)).collect()
    }

    fn substitute(&self, c: char) -> char {
        self.pairs
            .iter()
            .find(|(from, _)| *from == c)
            .map(|(_, to)| *to)
            .unwrap_or(c)
    }
}
