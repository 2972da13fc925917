//! Per-field candidate arbitration.

use tracing::debug;

use super::rules::{amounts_match, normalize_date, parse_amount};
use super::strategies::{ExtractionStrategy, ReceiptText};
use crate::models::receipt::{FieldCandidate, FieldId};

/// Boost applied when another candidate agrees with the best one.
pub const AGREEMENT_BOOST: f32 = 1.2;

/// Every candidate found for one field and the chosen one.
#[derive(Debug, Clone)]
pub struct FieldExtraction {
    pub candidates: Vec<FieldCandidate>,
    pub chosen: FieldCandidate,
}

/// Runs an ordered list of strategies and picks the best candidate.
pub struct FieldExtractor {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl FieldExtractor {
    pub fn new(strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self { strategies }
    }

    /// Extract one field from prepared text.
    pub fn extract(&self, field: FieldId, text: &ReceiptText) -> FieldExtraction {
        let candidates: Vec<FieldCandidate> = self
            .strategies
            .iter()
            .flat_map(|strategy| strategy.candidates(field, text))
            .filter(|candidate| !candidate.is_empty())
            .collect();

        let chosen = select_best(field, &candidates);
        debug!(
            %field,
            candidates = candidates.len(),
            value = %chosen.value,
            confidence = chosen.confidence,
            method = ?chosen.method,
            "Field extracted"
        );

        FieldExtraction { candidates, chosen }
    }
}

/// Pick the highest-confidence candidate, boosting it when any other candidate agrees.
///
/// Ties keep strategy order. Returns the empty candidate when there is nothing to pick.
pub fn select_best(field: FieldId, candidates: &[FieldCandidate]) -> FieldCandidate {
    let mut ranked: Vec<&FieldCandidate> = candidates.iter().filter(|c| !c.is_empty()).collect();
    ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let Some(top) = ranked.first() else {
        return FieldCandidate::empty();
    };

    let mut best = (*top).clone();
    if ranked[1..]
        .iter()
        .any(|other| values_similar(field, &best.value, &other.value))
    {
        best.boost(AGREEMENT_BOOST);
    }
    best
}

/// Field-aware value equality.
///
/// Tax ids compare case-insensitively, dates after normalization and money
/// within one cent. Anything unparseable falls back to trimmed text equality.
pub fn values_similar(field: FieldId, a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());

    match field {
        FieldId::TaxId => a.eq_ignore_ascii_case(b),
        FieldId::Date => match (normalize_date(a), normalize_date(b)) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
        FieldId::Total | FieldId::Tax | FieldId::Subtotal => {
            match (parse_amount(a), parse_amount(b)) {
                (Some(x), Some(y)) => amounts_match(x, y),
                _ => a == b,
            }
        }
    }
}
