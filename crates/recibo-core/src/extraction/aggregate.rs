//! Weighted overall confidence and the accept/reject decision.

use std::collections::BTreeMap;

use crate::models::config::FieldWeights;
use crate::models::receipt::{FieldCandidate, FieldId};

/// Combines per-field confidences into one score.
#[derive(Debug, Clone)]
pub struct ConfidenceAggregator {
    weights: FieldWeights,
    acceptance_threshold: u32,
}

impl ConfidenceAggregator {
    pub fn new(weights: FieldWeights, acceptance_threshold: u32) -> Self {
        Self {
            weights,
            acceptance_threshold,
        }
    }

    /// Weighted average over fields with a value, rounded; 0 when none has one.
    ///
    /// Empty fields carry no weight rather than a zero score.
    pub fn overall(&self, chosen: &BTreeMap<FieldId, FieldCandidate>) -> u32 {
        let (weighted, weight_sum) = chosen
            .iter()
            .filter(|(_, candidate)| !candidate.is_empty())
            .fold((0.0_f64, 0_u32), |(weighted, sum), (field, candidate)| {
                let weight = self.weights.weight(*field);
                (weighted + f64::from(candidate.confidence) * f64::from(weight), sum + weight)
            });

        if weight_sum == 0 {
            return 0;
        }

        (weighted / f64::from(weight_sum)).round().clamp(0.0, 100.0) as u32
    }

    pub fn is_accepted(&self, overall: u32) -> bool {
        overall >= self.acceptance_threshold
    }

    pub fn acceptance_threshold(&self) -> u32 {
        self.acceptance_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::receipt::ExtractionMethod;

    fn aggregator() -> ConfidenceAggregator {
        ConfidenceAggregator::new(FieldWeights::default(), 60)
    }

    #[test]
    fn test_only_non_empty_fields_count() {
        let mut chosen = BTreeMap::new();
        chosen.insert(
            FieldId::TaxId,
            FieldCandidate::new("CFE370814QI0", 90.0, ExtractionMethod::Pattern),
        );
        chosen.insert(
            FieldId::Total,
            FieldCandidate::new("116.00", 80.0, ExtractionMethod::Context),
        );
        chosen.insert(FieldId::Date, FieldCandidate::empty());
        chosen.insert(FieldId::Tax, FieldCandidate::empty());

        assert_eq!(aggregator().overall(&chosen), 85);
    }

    #[test]
    fn test_nothing_found() {
        let chosen: BTreeMap<FieldId, FieldCandidate> =
            FieldId::ALL.into_iter().map(|f| (f, FieldCandidate::empty())).collect();
        assert_eq!(aggregator().overall(&chosen), 0);
        assert!(!aggregator().is_accepted(0));
    }

    #[test]
    fn test_acceptance_threshold() {
        let aggregator = aggregator();
        assert!(aggregator.is_accepted(60));
        assert!(!aggregator.is_accepted(59));
    }
}
