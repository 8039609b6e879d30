// Per-Field Weighted Consensus
//
// score = weighted_confidence + min(0.1·n, 0.3)
// Winner = strictly greatest unclamped score (first group wins ties);
// only the winner's score is clamped to [0, 1].

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::grouping::{group_occurrences, is_eligible, Occurrence, ValueGroup};
use crate::types::{Field, NOT_FOUND};

const AGREEMENT_BONUS_STEP: f64 = 0.1;

/// Cap on the agreement bonus
pub const MAX_AGREEMENT_BONUS: f64 = 0.3;

/// Bonus for `count` corroborating backends (monotonic, capped)
pub fn agreement_bonus(count: usize) -> f64 {
    (AGREEMENT_BONUS_STEP * count as f64).min(MAX_AGREEMENT_BONUS)
}

/// Unclamped final score of a group
pub fn group_score(group: &ValueGroup) -> f64 {
    group.weighted_confidence() + agreement_bonus(group.len())
}

/// Index and unclamped score of the winning group
pub fn select_winner(groups: &[ValueGroup]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (index, group) in groups.iter().enumerate() {
        let score = group_score(group);
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((index, score)),
        }
    }
    best
}

/// Losing cluster compared against the winner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictReport {
    pub field: Field,
    pub winning_value: String,
    pub competing_value: String,
    pub competing_sources: Vec<String>,
    pub competing_score: f64,
    /// Normalised Levenshtein similarity of the canonical keys
    pub similarity: f64,
}

/// Consensus detail for one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConsensus {
    pub value: String,
    /// Clamped score, possibly capped by validator feedback
    pub confidence: f64,
    /// Unclamped winning score
    pub raw_score: f64,
    /// Occurrences in the winning group
    pub supporting: usize,
    /// Occurrences that passed the filters
    pub contributing: usize,
    /// Backends in the winning group
    pub sources: Vec<String>,
    pub conflicts: Vec<ConflictReport>,
}

impl FieldConsensus {
    fn not_found() -> Self {
        Self {
            value: NOT_FOUND.to_string(),
            confidence: 0.0,
            raw_score: 0.0,
            supporting: 0,
            contributing: 0,
            sources: Vec::new(),
            conflicts: Vec::new(),
        }
    }

    /// True when some group won (value is not the sentinel)
    pub fn has_winner(&self) -> bool {
        self.supporting > 0
    }

    /// Share of contributing occurrences that landed in the winning group
    pub fn agreement_ratio(&self) -> Option<f64> {
        (self.contributing > 0).then(|| self.supporting as f64 / self.contributing as f64)
    }
}

/// Select the consensus value for one field
pub fn select_field(
    field: Field,
    occurrences: &[Occurrence<'_>],
    confidence_floor: f64,
) -> FieldConsensus {
    let groups = group_occurrences(occurrences, confidence_floor);

    let Some((winner_index, raw_score)) = select_winner(&groups) else {
        debug!(field = %field, "No eligible occurrences");
        return FieldConsensus::not_found();
    };

    let winner = &groups[winner_index];
    let value = winner.representative_value().to_string();

    let conflicts: Vec<ConflictReport> = groups
        .iter()
        .enumerate()
        .filter(|(index, _)| *index != winner_index)
        .map(|(_, group)| ConflictReport {
            field,
            winning_value: value.clone(),
            competing_value: group.representative_value().to_string(),
            competing_sources: group.sources.clone(),
            competing_score: group_score(group),
            similarity: strsim::normalized_levenshtein(&winner.key, &group.key),
        })
        .collect();

    if !conflicts.is_empty() {
        warn!(
            field = %field,
            groups = groups.len(),
            winner = %value,
            "Backends disagree on field value"
        );
    }

    let contributing = occurrences
        .iter()
        .filter(|o| is_eligible(o, confidence_floor))
        .count();

    FieldConsensus {
        value,
        confidence: raw_score.clamp(0.0, 1.0),
        raw_score,
        supporting: winner.len(),
        contributing,
        sources: winner.sources.clone(),
        conflicts,
    }
}
