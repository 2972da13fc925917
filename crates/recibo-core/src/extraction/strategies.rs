//! Candidate-producing strategies: stored patterns, keyword context and line position.

use std::collections::HashMap;
use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use tracing::trace;

use super::rules::shape_regex;
use crate::models::receipt::{ExtractionMethod, FieldCandidate, FieldId};
use crate::patterns::PatternStore;

/// Fixed confidence of keyword-context candidates.
pub const CONTEXT_CONFIDENCE: f32 = 75.0;

/// Fixed confidence of line-position candidates.
pub const POSITION_CONFIDENCE: f32 = 65.0;

/// Recognized text prepared once for every strategy.
#[derive(Debug, Clone)]
pub struct ReceiptText {
    /// Text as recognized.
    pub raw: String,
    /// Whitespace collapsed to single spaces, one line.
    pub clean: String,
    /// Non-empty trimmed lines.
    pub lines: Vec<String>,
}

impl ReceiptText {
    pub fn new(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            clean: raw.split_whitespace().collect::<Vec<_>>().join(" "),
            lines: raw
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Trait for one way of locating a field value.
pub trait ExtractionStrategy: Send + Sync {
    /// Method tag stamped on produced candidates.
    fn method(&self) -> ExtractionMethod;

    /// Candidates for `field`; empty when nothing matched.
    fn candidates(&self, field: FieldId, text: &ReceiptText) -> Vec<FieldCandidate>;
}

/// Applies every stored pattern for the field, in priority order.
pub struct PatternStrategy {
    patterns: Arc<PatternStore>,
}

impl PatternStrategy {
    pub fn new(patterns: Arc<PatternStore>) -> Self {
        Self { patterns }
    }
}

impl ExtractionStrategy for PatternStrategy {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Pattern
    }

    fn candidates(&self, field: FieldId, text: &ReceiptText) -> Vec<FieldCandidate> {
        let mut candidates = Vec::new();

        for compiled in self.patterns.patterns_for(field).iter() {
            let Some(value) = compiled.find(&text.clean).map(str::trim) else {
                continue;
            };
            if value.is_empty() {
                continue;
            }

            let confidence = compiled.pattern.base_confidence();
            trace!(%field, pattern_id = compiled.pattern.id, value, confidence, "Pattern matched");
            candidates.push(
                FieldCandidate::new(value, confidence, ExtractionMethod::Pattern)
                    .with_pattern(compiled.pattern.id),
            );
        }

        candidates
    }
}

/// Keywords announcing each field on Mexican tickets.
pub fn context_keywords(field: FieldId) -> &'static [&'static str] {
    match field {
        FieldId::TaxId => &["rfc", "r.f.c", "registro federal"],
        FieldId::Date => &["fecha", "date", "día", "emitida", "emision"],
        FieldId::Total => &[
            "cargo",
            "total",
            "importe total",
            "monto total",
            "total a pagar",
            "tarjeta",
        ],
        FieldId::Tax => &["iva", "i.v.a", "impuesto", "tax"],
        FieldId::Subtotal => &[
            "subtotal",
            "sub total",
            "sub-total",
            "importe",
            "energia",
            "energía",
        ],
    }
}

/// Searches a bounded window after each keyword hit until one holds a value.
pub struct ContextStrategy {
    window: usize,
    keywords: HashMap<FieldId, Vec<(&'static str, Regex)>>,
}

impl ContextStrategy {
    /// Create a strategy searching `window` characters after the keyword.
    pub fn new(window: usize) -> Self {
        let keywords: HashMap<_, _> = FieldId::ALL
            .into_iter()
            .map(|field| {
                let compiled: Vec<_> = context_keywords(field)
                    .iter()
                    .filter_map(|keyword| {
                        RegexBuilder::new(&format!(r"\b{}", regex::escape(keyword)))
                            .case_insensitive(true)
                            .build()
                            .ok()
                            .map(|regex| (*keyword, regex))
                    })
                    .collect();
                (field, compiled)
            })
            .collect();

        Self { window, keywords }
    }
}

impl ExtractionStrategy for ContextStrategy {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Context
    }

    fn candidates(&self, field: FieldId, text: &ReceiptText) -> Vec<FieldCandidate> {
        let Some(keywords) = self.keywords.get(&field) else {
            return Vec::new();
        };

        for (keyword, keyword_regex) in keywords {
            let Some(hit) = keyword_regex.find(&text.raw) else {
                continue;
            };

            let after = &text.raw[hit.start()..];
            let end = after
                .char_indices()
                .nth(self.window)
                .map(|(i, _)| i)
                .unwrap_or(after.len());
            let window = &after[..end];

            // A keyword with nothing field-shaped after it falls through to the next.
            let Some(value) = shape_regex(field)
                .captures(window)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim())
                .filter(|v| !v.is_empty())
            else {
                trace!(%field, %keyword, "Keyword without value");
                continue;
            };

            trace!(%field, %keyword, value, "Context matched");
            return vec![FieldCandidate::new(
                value,
                CONTEXT_CONFIDENCE,
                ExtractionMethod::Context,
            )];
        }

        Vec::new()
    }
}

/// Expected relative line position of each field.
pub fn expected_position(field: FieldId) -> f32 {
    match field {
        FieldId::TaxId => 0.1,
        FieldId::Date => 0.15,
        FieldId::Subtotal => 0.8,
        FieldId::Tax => 0.85,
        FieldId::Total => 0.9,
    }
}

/// Searches the lines around where the field usually sits.
pub struct PositionStrategy;

impl PositionStrategy {
    /// Lines searched before the expected position.
    const LINES_BEFORE: usize = 2;
    /// Lines searched after the expected position.
    const LINES_AFTER: usize = 3;
}

impl ExtractionStrategy for PositionStrategy {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Position
    }

    fn candidates(&self, field: FieldId, text: &ReceiptText) -> Vec<FieldCandidate> {
        if text.lines.is_empty() {
            return Vec::new();
        }

        let index = (text.lines.len() as f32 * expected_position(field)).floor() as usize;
        let start = index.saturating_sub(Self::LINES_BEFORE);
        let end = (index + Self::LINES_AFTER).min(text.lines.len());
        if start >= end {
            return Vec::new();
        }

        let shape = shape_regex(field);
        text.lines[start..end]
            .iter()
            .find_map(|line| {
                shape
                    .captures(line)
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str().trim().to_string())
            })
            .filter(|v| !v.is_empty())
            .map(|value| {
                trace!(%field, line_start = start, %value, "Position matched");
                vec![FieldCandidate::new(value, POSITION_CONFIDENCE, ExtractionMethod::Position)]
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::NewPattern;
    use crate::store::{LocalStore, PatternRepository};
    use pretty_assertions::assert_eq;

    const TICKET: &str = "COMISION FEDERAL DE ELECTRICIDAD
RFC: CFE370814QI0
FECHA 30/09/2025
NO. SERVICIO 123456
PERIODO FACTURADO
LECTURA ACTUAL 4512
LECTURA ANTERIOR 4300
CONSUMO KWH 212
SUBTOTAL $100.00
IVA $16.00
TOTAL $116.00";

    fn values(candidates: &[FieldCandidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.value.as_str()).collect()
    }

    #[test]
    fn test_receipt_text() {
        let text = ReceiptText::new("  RFC:  ABC010101ABC \n\n TOTAL\t$38.00 ");
        assert_eq!(text.clean, "RFC: ABC010101ABC TOTAL $38.00");
        assert_eq!(text.lines, vec!["RFC:  ABC010101ABC", "TOTAL\t$38.00"]);
    }

    #[test]
    fn test_pattern_strategy_confidence() {
        let repository = Arc::new(LocalStore::in_memory());
        for (matcher, weight) in [
            (r"\btotal[:\s]*\$?\s*([\d,]+\.\d{2})", 1.5),
            (r"pagar[:\s]*([\d.]+)", 1.0),
        ] {
            let pattern = NewPattern::new(FieldId::Total, matcher, weight);
            PatternRepository::create(&*repository, pattern).unwrap();
        }
        let strategy = PatternStrategy::new(Arc::new(PatternStore::new(repository)));

        let candidates = strategy.candidates(FieldId::Total, &ReceiptText::new(TICKET));
        assert_eq!(values(&candidates), vec!["116.00"]);
        // Default accuracy 80 x weight 1.5, clamped.
        assert_eq!(candidates[0].confidence, 100.0);
        assert_eq!(candidates[0].method, ExtractionMethod::Pattern);
        assert_eq!(candidates[0].pattern_id, Some(1));
    }

    #[test]
    fn test_context_strategy() {
        let strategy = ContextStrategy::new(80);
        let text = ReceiptText::new(TICKET);

        let tax_id = strategy.candidates(FieldId::TaxId, &text);
        assert_eq!(values(&tax_id), vec!["CFE370814QI0"]);
        assert_eq!(tax_id[0].confidence, CONTEXT_CONFIDENCE);

        assert_eq!(values(&strategy.candidates(FieldId::Date, &text)), vec!["30/09/2025"]);
        assert_eq!(values(&strategy.candidates(FieldId::Tax, &text)), vec!["16.00"]);
        assert_eq!(values(&strategy.candidates(FieldId::Subtotal, &text)), vec!["100.00"]);
        // "total" does not hit inside "SUBTOTAL".
        assert_eq!(values(&strategy.candidates(FieldId::Total, &text)), vec!["116.00"]);
    }

    #[test]
    fn test_context_window_is_bounded() {
        let strategy = ContextStrategy::new(10);
        let text =
            ReceiptText::new("RFC: .................... CFE370814QI0 and more text after it");
        assert!(strategy.candidates(FieldId::TaxId, &text).is_empty());
    }

    #[test]
    fn test_context_falls_through_to_next_keyword() {
        let strategy = ContextStrategy::new(80);
        let text = ReceiptText::new(
            "CARGO FIJO INCLUIDO EN SU FACTURACION MENSUAL PARA EL SERVICIO DOMESTICO \
             DEL USUARIO FINAL\nGRACIAS\nTOTAL $116.00",
        );

        let total = strategy.candidates(FieldId::Total, &text);
        assert_eq!(values(&total), vec!["116.00"]);
        assert_eq!(total[0].confidence, CONTEXT_CONFIDENCE);
    }

    #[test]
    fn test_position_strategy() {
        let text = ReceiptText::new(TICKET);
        let strategy = PositionStrategy;

        assert_eq!(values(&strategy.candidates(FieldId::TaxId, &text)), vec!["CFE370814QI0"]);
        assert_eq!(values(&strategy.candidates(FieldId::Date, &text)), vec!["30/09/2025"]);

        let total = strategy.candidates(FieldId::Total, &text);
        assert_eq!(total[0].confidence, POSITION_CONFIDENCE);
        assert_eq!(total[0].method, ExtractionMethod::Position);
    }

    #[test]
    fn test_position_strategy_empty_text() {
        assert!(PositionStrategy.candidates(FieldId::Total, &ReceiptText::new("  \n ")).is_empty());
    }
}
