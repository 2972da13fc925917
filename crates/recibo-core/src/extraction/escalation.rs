//! Escalation decision from text quality and cheap-path confidence.

use serde::Serialize;

use super::rules::TextQuality;
use crate::models::config::EscalationConfig;
use crate::models::receipt::RecordField;
use recibo_escalation::ReceiptRecord;

/// Steps a document goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationState {
    Start,
    RanCheapExtraction,
    EscalatedVision,
    EscalatedText,
    Accepted,
    Rejected,
}

/// Decides when the costlier extractors run.
#[derive(Debug, Clone)]
pub struct EscalationPolicy {
    threshold: u32,
    critical_fields: Vec<RecordField>,
}

impl EscalationPolicy {
    pub fn new(threshold: u32, critical_fields: Vec<RecordField>) -> Self {
        Self {
            threshold,
            critical_fields,
        }
    }

    pub fn from_config(config: &EscalationConfig) -> Self {
        Self::new(config.threshold, config.critical_fields.clone())
    }

    /// Garbage text goes straight to vision when it can.
    pub fn should_use_vision(
        &self,
        quality: &TextQuality,
        vision_available: bool,
        has_image: bool,
    ) -> bool {
        quality.is_garbage && vision_available && has_image
    }

    /// Low confidence or a missing critical field asks for text escalation.
    pub fn should_use_text(&self, overall: u32, record: &ReceiptRecord) -> bool {
        overall < self.threshold || !self.missing_critical_fields(record).is_empty()
    }

    /// Critical fields the record lacks.
    pub fn missing_critical_fields(&self, record: &ReceiptRecord) -> Vec<RecordField> {
        self.critical_fields
            .iter()
            .copied()
            .filter(|field| field.is_missing(record))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    fn record() -> ReceiptRecord {
        ReceiptRecord {
            tax_id: "CFE370814QI0".to_string(),
            issuer: Some("COMISION FEDERAL DE ELECTRICIDAD".to_string()),
            date: Some("2025-09-30".to_string()),
            total: Decimal::new(11600, 2),
            tax: Decimal::new(1600, 2),
            subtotal: Decimal::new(10000, 2),
            confidence: 90,
        }
    }

    fn quality(is_garbage: bool) -> TextQuality {
        TextQuality {
            garbage_tokens: 0,
            normal_char_ratio: 1.0,
            length: 200,
            is_garbage,
        }
    }

    #[test]
    fn test_vision_requires_garbage_image_and_backend() {
        let policy = EscalationPolicy::from_config(&EscalationConfig::default());
        assert!(policy.should_use_vision(&quality(true), true, true));
        assert!(!policy.should_use_vision(&quality(false), true, true));
        assert!(!policy.should_use_vision(&quality(true), false, true));
        assert!(!policy.should_use_vision(&quality(true), true, false));
    }

    #[test]
    fn test_text_escalation_on_low_confidence() {
        let policy = EscalationPolicy::from_config(&EscalationConfig::default());
        assert!(!policy.should_use_text(90, &record()));
        assert!(policy.should_use_text(74, &record()));
    }

    #[test]
    fn test_text_escalation_on_missing_critical_field() {
        let policy = EscalationPolicy::from_config(&EscalationConfig::default());
        let mut no_issuer = record();
        no_issuer.issuer = None;
        no_issuer.total = Decimal::ZERO;

        assert!(policy.should_use_text(95, &no_issuer));
        assert_eq!(
            policy.missing_critical_fields(&no_issuer),
            vec![RecordField::Issuer, RecordField::Total]
        );
    }

    #[test]
    fn test_configured_critical_fields() {
        let policy = EscalationPolicy::new(75, vec![RecordField::Date]);
        let mut no_issuer = record();
        no_issuer.issuer = None;
        assert!(!policy.should_use_text(95, &no_issuer));

        no_issuer.date = None;
        assert!(policy.should_use_text(95, &no_issuer));
    }
}
