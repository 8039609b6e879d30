// Cross-field aggregates: agreement level, software label, raw mean scores

use std::collections::BTreeMap;

use super::consensus::FieldConsensus;
use crate::types::{ConfidenceScores, ExtractionResult, Field, UNKNOWN_SOFTWARE};

/// Mean winning-cluster share over fields that have a winner
///
/// Fields where every backend abstained are excluded. 0.0 when no field has
/// a winner.
pub fn agreement_level(fields: &BTreeMap<Field, FieldConsensus>) -> f64 {
    let ratios: Vec<f64> = fields
        .values()
        .filter(|f| f.has_winner())
        .filter_map(FieldConsensus::agreement_ratio)
        .collect();

    if ratios.is_empty() {
        return 0.0;
    }
    ratios.iter().sum::<f64>() / ratios.len() as f64
}

/// Most frequent known software label (ties → first seen)
pub fn software_consensus(results: &[ExtractionResult]) -> String {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for label in results
        .iter()
        .map(|r| r.software_detected.trim())
        .filter(|label| !label.is_empty() && *label != UNKNOWN_SOFTWARE)
    {
        match counts.iter_mut().find(|(l, _)| *l == label) {
            Some((_, count)) => *count += 1,
            None => counts.push((label, 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (label, count) in counts {
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((label, count)),
        }
    }

    best.map(|(label, _)| label.to_string())
        .unwrap_or_else(|| UNKNOWN_SOFTWARE.to_string())
}

/// Unweighted mean of each field's raw backend confidence
pub fn mean_confidence_scores(results: &[ExtractionResult]) -> ConfidenceScores {
    if results.is_empty() {
        return ConfidenceScores::new();
    }
    Field::ALL
        .into_iter()
        .map(|field| {
            let total: f64 = results.iter().map(|r| r.confidence(field)).sum();
            (field, total / results.len() as f64)
        })
        .collect()
}
