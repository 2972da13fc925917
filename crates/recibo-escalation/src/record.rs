//! Structured receipt record produced by every extraction path.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Confidence stamped on records produced by text escalation.
pub const TEXT_ESCALATION_CONFIDENCE: u32 = 95;

/// Confidence stamped on records produced by vision escalation.
pub const VISION_ESCALATION_CONFIDENCE: u32 = 98;

/// Final structured receipt data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptRecord {
    /// Issuer tax id (upper-cased), empty when unknown.
    pub tax_id: String,

    /// Issuer business name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    /// Issue date as `YYYY-MM-DD`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    /// Grand total.
    pub total: Decimal,

    /// Tax amount.
    pub tax: Decimal,

    /// Amount before tax.
    pub subtotal: Decimal,

    /// Overall confidence (0 - 100).
    pub confidence: u32,
}

/// Record as answered by a generative backend, before normalization.
///
/// Amounts arrive as numbers, numeric strings or null depending on the model.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawRecord {
    pub tax_id: Option<String>,
    pub issuer: Option<String>,
    pub date: Option<String>,
    pub total: Value,
    pub tax: Value,
    pub subtotal: Value,
}

impl RawRecord {
    /// Normalize into a [`ReceiptRecord`].
    ///
    /// Returns `None` when the answer carries none of tax id, total or issuer.
    /// Missing amounts are derived from the other two when possible.
    pub fn normalize(self, confidence: u32) -> Option<ReceiptRecord> {
        let tax_id = non_empty(self.tax_id)
            .map(|s| s.to_uppercase())
            .unwrap_or_default();
        let issuer = non_empty(self.issuer);
        let date = non_empty(self.date);

        let mut total = parse_json_amount(&self.total);
        let mut tax = parse_json_amount(&self.tax);
        let mut subtotal = parse_json_amount(&self.subtotal);

        if tax_id.is_empty() && total.is_zero() && issuer.is_none() {
            return None;
        }

        if total > Decimal::ZERO && subtotal > Decimal::ZERO && tax.is_zero() {
            tax = total - subtotal;
        }
        if total > Decimal::ZERO && tax > Decimal::ZERO && subtotal.is_zero() {
            subtotal = total - tax;
        }
        if subtotal > Decimal::ZERO && tax > Decimal::ZERO && total.is_zero() {
            total = subtotal + tax;
        }
        // A bare total means a tax-free ticket.
        if total > Decimal::ZERO && subtotal.is_zero() && tax.is_zero() {
            subtotal = total;
        }

        if total > Decimal::ZERO && subtotal > Decimal::ZERO {
            let diff = (subtotal + tax - total).abs();
            if diff > total * Decimal::new(1, 2) {
                warn!(%subtotal, %tax, %total, "escalated record amounts are inconsistent");
            }
        }

        debug!(tax_id = %tax_id, %total, "normalized escalated record");

        Some(ReceiptRecord {
            tax_id,
            issuer,
            date,
            total,
            tax,
            subtotal,
            confidence,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null"))
}

/// Parse a JSON amount, ignoring signs, currency symbols and separators.
fn parse_json_amount(value: &Value) -> Decimal {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => return Decimal::ZERO,
    };

    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    Decimal::from_str(&cleaned).unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn raw(value: Value) -> RawRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_normalize_derives_missing_tax() {
        let record = raw(json!({
            "tax_id": "cfe370814qi0",
            "issuer": "Comision Federal de Electricidad",
            "date": "2025-09-30",
            "total": 1842.0,
            "tax": null,
            "subtotal": "1,588.00"
        }))
        .normalize(TEXT_ESCALATION_CONFIDENCE)
        .unwrap();

        assert_eq!(record.tax_id, "CFE370814QI0");
        assert_eq!(record.subtotal, Decimal::from_str("1588.00").unwrap());
        assert_eq!(record.tax, Decimal::from_str("254.00").unwrap());
        assert_eq!(record.confidence, 95);
    }

    #[test]
    fn test_normalize_bare_total_is_tax_free() {
        let record = raw(json!({ "issuer": "Helados Dolphy", "total": "-$38" }))
            .normalize(VISION_ESCALATION_CONFIDENCE)
            .unwrap();

        assert_eq!(record.total, Decimal::from(38));
        assert_eq!(record.subtotal, Decimal::from(38));
        assert_eq!(record.tax, Decimal::ZERO);
        assert_eq!(record.tax_id, "");
    }

    #[test]
    fn test_normalize_rejects_empty_answer() {
        let record = raw(json!({ "tax_id": null, "issuer": "", "total": 0 }));
        assert!(record.normalize(95).is_none());
    }

    #[test]
    fn test_normalize_derives_total() {
        let record = raw(json!({ "tax_id": "ABC010101AB1", "tax": 16, "subtotal": 100 }))
            .normalize(95)
            .unwrap();
        assert_eq!(record.total, Decimal::from(116));
    }
}
