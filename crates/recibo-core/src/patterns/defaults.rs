//! Bootstrap patterns for Mexican tickets and invoices.

use crate::models::receipt::FieldId;

/// A canonical pattern seeded into empty stores.
#[derive(Debug, Clone, Copy)]
pub struct DefaultPattern {
    pub field: FieldId,
    pub matcher: &'static str,
    pub weight: f32,
}

const fn seed(field: FieldId, matcher: &'static str, weight: f32) -> DefaultPattern {
    DefaultPattern { field, matcher, weight }
}

pub static DEFAULT_PATTERNS: &[DefaultPattern] = &[
    // RFC
    seed(FieldId::TaxId, r"RFC[:\s]*([A-ZÑ&]{3,4}\d{6}[A-Z0-9]{3})", 1.5),
    seed(FieldId::TaxId, r"([A-ZÑ&]{3,4}\d{6}[A-Z0-9]{3})", 1.0),
    // Fecha
    seed(FieldId::Date, r"fecha[:\s]*(\d{1,2}[-/]\d{1,2}[-/]\d{2,4})", 1.5),
    seed(FieldId::Date, r"fecha[:\s]*(\d{1,2}[-/][A-Z]{3})", 1.4),
    seed(FieldId::Date, r"(\d{1,2}[-/]\d{1,2}[-/]\d{4})", 1.0),
    // Total, card charges first
    seed(FieldId::Total, r"cargo[\s.]+a[\s.]+tarjeta[\s.]*.*?\$?\s*([\d,\s]+\.?\d{1,2})", 2.0),
    seed(FieldId::Total, r"cargo[\s.]+(?:a[\s.]+)?tarjeta[\s.]*.*?([\d,]+\.[0-9])", 1.9),
    seed(FieldId::Total, r"\b(?:gran\s+)?total[:\s]*\$?\s*-?\(?\s*([\d,\s]+\.?\d{0,2})", 1.5),
    seed(FieldId::Total, r"importe\s+total[:\s]*\$?\s*([\d,\s]+\.?\d{0,2})", 1.3),
    // IVA
    seed(FieldId::Tax, r"\bIVA[:\s]*\$?\s*([\d,\s]+\.?\d{0,2})", 1.5),
    seed(FieldId::Tax, r"impuesto[:\s]*\$?\s*([\d,\s]+\.?\d{0,2})", 1.2),
    // Subtotal, utility bills print the energy charge as the base amount
    seed(FieldId::Subtotal, r"energ[ií]a[\s.]*\$?\s*([\d,\s]+\.?\d{0,2})", 1.6),
    seed(FieldId::Subtotal, r"subtotal[:\s]*\$?\s*([\d,\s]+\.?\d{0,2})", 1.5),
    seed(FieldId::Subtotal, r"sub[\s-]?total[:\s]*\$?\s*([\d,\s]+\.?\d{0,2})", 1.3),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::{CompiledPattern, NewPattern};

    #[test]
    fn test_defaults_compile() {
        for (i, d) in DEFAULT_PATTERNS.iter().enumerate() {
            let pattern = NewPattern::new(d.field, d.matcher, d.weight).into_pattern(i as u64);
            let compiled = CompiledPattern::compile(pattern);
            assert!(compiled.is_valid(), "default pattern {} failed to compile", d.matcher);
        }
    }

    #[test]
    fn test_defaults_cover_every_field() {
        for field in FieldId::ALL {
            assert!(DEFAULT_PATTERNS.iter().any(|d| d.field == field), "no default for {field}");
        }
        assert_eq!(DEFAULT_PATTERNS.len(), 14);
    }
}
