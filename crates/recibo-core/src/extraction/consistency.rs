//! Arithmetic cross-checks between subtotal, tax and total.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::debug;

use super::rules::{parse_amount, within_one_percent};
use crate::models::receipt::{FieldCandidate, FieldId};

/// Boost for all three amounts when subtotal + tax matches total.
pub const SUM_BOOST: f32 = 1.15;

/// Boost for the tax amount when it matches the fixed rate.
pub const TAX_RATE_BOOST: f32 = 1.10;

/// Which cross-checks passed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    pub sum_matches: bool,
    pub tax_rate_matches: bool,
}

/// Boost amount confidences that agree arithmetically.
///
/// Only confidences change; values are left as extracted.
pub fn validate_consistency(
    chosen: &mut BTreeMap<FieldId, FieldCandidate>,
    tax_rate: Decimal,
) -> ConsistencyReport {
    let amount = |field: FieldId| {
        chosen
            .get(&field)
            .filter(|c| !c.is_empty())
            .and_then(|c| parse_amount(&c.value))
    };
    let subtotal = amount(FieldId::Subtotal);
    let tax = amount(FieldId::Tax);
    let total = amount(FieldId::Total);

    let mut report = ConsistencyReport::default();

    if let (Some(subtotal), Some(tax), Some(total)) = (subtotal, tax, total) {
        if total > Decimal::ZERO && within_one_percent(subtotal + tax, total) {
            report.sum_matches = true;
            for field in [FieldId::Subtotal, FieldId::Tax, FieldId::Total] {
                if let Some(candidate) = chosen.get_mut(&field) {
                    candidate.boost(SUM_BOOST);
                }
            }
        }
    }

    if let (Some(subtotal), Some(tax)) = (subtotal, tax) {
        let expected = subtotal * tax_rate;
        if tax > Decimal::ZERO && within_one_percent(tax, expected) {
            report.tax_rate_matches = true;
            if let Some(candidate) = chosen.get_mut(&FieldId::Tax) {
                candidate.boost(TAX_RATE_BOOST);
            }
        }
    }

    debug!(
        sum_matches = report.sum_matches,
        tax_rate_matches = report.tax_rate_matches,
        "Consistency checked"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::receipt::ExtractionMethod;

    fn chosen(
        subtotal: &str,
        tax: &str,
        total: &str,
        confidence: f32,
    ) -> BTreeMap<FieldId, FieldCandidate> {
        [
            (FieldId::Subtotal, subtotal),
            (FieldId::Tax, tax),
            (FieldId::Total, total),
        ]
        .into_iter()
        .map(|(field, value)| {
            (
                field,
                FieldCandidate::new(value, confidence, ExtractionMethod::Pattern),
            )
        })
        .collect()
    }

    fn confidence(chosen: &BTreeMap<FieldId, FieldCandidate>, field: FieldId) -> f32 {
        chosen[&field].confidence
    }

    #[test]
    fn test_consistent_amounts_are_boosted() {
        let mut fields = chosen("100.00", "16.00", "116.00", 60.0);
        let report = validate_consistency(&mut fields, Decimal::new(16, 2));

        assert!(report.sum_matches);
        assert!(report.tax_rate_matches);
        assert!((confidence(&fields, FieldId::Subtotal) - 69.0).abs() < 0.01);
        assert!((confidence(&fields, FieldId::Total) - 69.0).abs() < 0.01);
        assert!((confidence(&fields, FieldId::Tax) - 75.9).abs() < 0.01);
        assert_eq!(fields[&FieldId::Total].value, "116.00");
    }

    #[test]
    fn test_boost_is_capped() {
        let mut fields = chosen("$1,588.00", "254.08", "1,842.08", 95.0);
        validate_consistency(&mut fields, Decimal::new(16, 2));

        for field in [FieldId::Subtotal, FieldId::Tax, FieldId::Total] {
            assert_eq!(confidence(&fields, field), 100.0);
        }
    }

    #[test]
    fn test_inconsistent_amounts_untouched() {
        let mut fields = chosen("100.00", "8.00", "150.00", 60.0);
        let report = validate_consistency(&mut fields, Decimal::new(16, 2));

        assert_eq!(report, ConsistencyReport::default());
        for field in [FieldId::Subtotal, FieldId::Tax, FieldId::Total] {
            assert_eq!(confidence(&fields, field), 60.0);
        }
    }

    #[test]
    fn test_tax_rate_without_total() {
        let mut fields = chosen("100.00", "16.00", "", 60.0);
        let report = validate_consistency(&mut fields, Decimal::new(16, 2));

        assert!(!report.sum_matches);
        assert!(report.tax_rate_matches);
        assert!((confidence(&fields, FieldId::Tax) - 66.0).abs() < 0.01);
        assert_eq!(confidence(&fields, FieldId::Subtotal), 60.0);
    }

    #[test]
    fn test_zero_tax_is_not_rate_consistent() {
        let mut fields = chosen("38.00", "0.00", "38.00", 60.0);
        let report = validate_consistency(&mut fields, Decimal::new(16, 2));

        assert!(report.sum_matches);
        assert!(!report.tax_rate_matches);
    }
}
