// Value Grouping - Canonical-Key Clustering
//
// Occurrences of one field are filtered (NOT_FOUND, confidence floor) and
// clustered by canonical key. Strict equality, no edit-distance fuzzing.

use serde::{Deserialize, Serialize};

use crate::types::is_not_found;

/// Occurrences at or below this confidence are discarded
pub const DEFAULT_CONFIDENCE_FLOOR: f64 = 0.3;

/// One backend's value for one field
#[derive(Debug, Clone, Copy)]
pub struct Occurrence<'a> {
    pub value: &'a str,
    pub confidence: f64,
    pub weight: f64,
    pub source: &'a str,
}

/// Raw values that normalise to the same canonical key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueGroup {
    pub key: String,
    /// Original (un-normalised) values, in arrival order
    pub values: Vec<String>,
    pub confidences: Vec<f64>,
    pub weights: Vec<f64>,
    pub sources: Vec<String>,
}

impl ValueGroup {
    fn new(key: String) -> Self {
        Self {
            key,
            values: Vec::new(),
            confidences: Vec::new(),
            weights: Vec::new(),
            sources: Vec::new(),
        }
    }

    fn push(&mut self, occurrence: &Occurrence<'_>) {
        self.values.push(occurrence.value.to_string());
        self.confidences.push(occurrence.confidence);
        self.weights.push(occurrence.weight);
        self.sources.push(occurrence.source.to_string());
    }

    /// Number of occurrences in the group
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Σ(confidence·weight) / Σweight (0.0 when total weight is zero)
    pub fn weighted_confidence(&self) -> f64 {
        let total_weight: f64 = self.weights.iter().sum();
        if total_weight <= 0.0 {
            return 0.0;
        }
        let weighted: f64 = self
            .confidences
            .iter()
            .zip(&self.weights)
            .map(|(c, w)| c * w)
            .sum();
        weighted / total_weight
    }

    /// Most frequent original string (ties → first seen)
    pub fn representative_value(&self) -> &str {
        let mut best: Option<(&str, usize)> = None;
        for value in &self.values {
            let count = self.values.iter().filter(|v| *v == value).count();
            match best {
                Some((_, best_count)) if count <= best_count => {}
                _ => best = Some((value, count)),
            }
        }
        best.map(|(value, _)| value).unwrap_or_default()
    }
}

/// Uppercase with all whitespace removed
pub fn canonical_key(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// True when an occurrence passes the sentinel and confidence filters
pub fn is_eligible(occurrence: &Occurrence<'_>, confidence_floor: f64) -> bool {
    !is_not_found(occurrence.value) && occurrence.confidence > confidence_floor
}

/// Partition eligible occurrences into groups, in first-seen order
pub fn group_occurrences(occurrences: &[Occurrence<'_>], confidence_floor: f64) -> Vec<ValueGroup> {
    let mut groups: Vec<ValueGroup> = Vec::new();

    for occurrence in occurrences
        .iter()
        .filter(|o| is_eligible(o, confidence_floor))
    {
        let key = canonical_key(occurrence.value);
        match groups.iter_mut().find(|g| g.key == key) {
            Some(group) => group.push(occurrence),
            None => {
                let mut group = ValueGroup::new(key);
                group.push(occurrence);
                groups.push(group);
            }
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occ<'a>(value: &'a str, confidence: f64, weight: f64) -> Occurrence<'a> {
        Occurrence {
            value,
            confidence,
            weight,
            source: "test",
        }
    }

    #[test]
    fn test_canonical_key() {
        assert_eq!(canonical_key("ab12 cde"), "AB12CDE");
        assert_eq!(canonical_key(" AB12\tCDE "), "AB12CDE");
    }

    #[test]
    fn test_grouping_by_key() {
        let occurrences = [
            occ("AB12CDE", 0.9, 0.35),
            occ("AB12 CDE", 0.85, 0.25),
            occ("AB12COE", 0.4, 0.20),
        ];
        let groups = group_occurrences(&occurrences, DEFAULT_CONFIDENCE_FLOOR);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, "AB12CDE");
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[1].values, vec!["AB12COE".to_string()]);
    }

    #[test]
    fn test_floor_and_sentinel_filtered() {
        let occurrences = [
            occ("NOT_FOUND", 0.9, 0.35),
            occ("FORD", 0.3, 0.25),
            occ("FORD", 0.29, 0.25),
        ];
        assert!(group_occurrences(&occurrences, DEFAULT_CONFIDENCE_FLOOR).is_empty());
    }

    #[test]
    fn test_groups_partition_eligible_occurrences() {
        let occurrences = [
            occ("Ford", 0.9, 0.3),
            occ("FORD", 0.8, 0.3),
            occ("Vauxhall", 0.7, 0.3),
            occ("ford", 0.2, 0.3),
        ];
        let groups = group_occurrences(&occurrences, DEFAULT_CONFIDENCE_FLOOR);
        let total: usize = groups.iter().map(ValueGroup::len).sum();
        assert_eq!(total, 3);
        for group in &groups {
            assert!(group.values.iter().all(|v| canonical_key(v) == group.key));
        }
    }

    #[test]
    fn test_weighted_confidence() {
        let groups = group_occurrences(
            &[occ("AB12CDE", 0.9, 0.35), occ("AB12 CDE", 0.85, 0.25)],
            DEFAULT_CONFIDENCE_FLOOR,
        );
        let expected = (0.9 * 0.35 + 0.85 * 0.25) / 0.6;
        assert!((groups[0].weighted_confidence() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_zero_weight_group() {
        let groups = group_occurrences(&[occ("X", 0.9, 0.0)], DEFAULT_CONFIDENCE_FLOOR);
        assert_eq!(groups[0].weighted_confidence(), 0.0);
    }

    #[test]
    fn test_representative_value() {
        let groups = group_occurrences(
            &[
                occ("AB12 CDE", 0.9, 0.1),
                occ("AB12CDE", 0.9, 0.1),
                occ("AB12CDE", 0.9, 0.1),
            ],
            DEFAULT_CONFIDENCE_FLOOR,
        );
        assert_eq!(groups[0].representative_value(), "AB12CDE");

        let groups = group_occurrences(
            &[occ("ab12cde", 0.9, 0.1), occ("AB12CDE", 0.9, 0.1)],
            DEFAULT_CONFIDENCE_FLOOR,
        );
        assert_eq!(groups[0].representative_value(), "ab12cde");
    }
}
