//! RFC (Mexican federal taxpayer registration code) validation.

use super::patterns::{TAX_ID, TAX_ID_FULL};

/// Check the full RFC: shape plus an embedded YYMMDD with month 01-12 and day 01-31.
pub fn validate_tax_id(tax_id: &str) -> bool {
    TAX_ID_FULL.is_match(&normalize_tax_id(tax_id))
}

/// Check only length and character classes.
pub fn is_tax_id_shape(tax_id: &str) -> bool {
    let normalized = normalize_tax_id(tax_id);
    TAX_ID
        .find(&normalized)
        .is_some_and(|m| m.start() == 0 && m.end() == normalized.len())
}

/// Upper-case and drop separators OCR tends to insert.
pub fn normalize_tax_id(tax_id: &str) -> String {
    tax_id
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(char::to_uppercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_tax_ids() {
        assert!(validate_tax_id("CFE370814QI0"));
        assert!(validate_tax_id("ABC010101ABC"));
        assert!(validate_tax_id("GOMJ8001319X4"));
        assert!(validate_tax_id("cfe370814qi0"));
    }

    #[test]
    fn test_invalid_date_in_tax_id() {
        // Month 13
        assert!(!validate_tax_id("ABC001301ABC"));
        // Day 32
        assert!(!validate_tax_id("ABC010132ABC"));
        // Month 00
        assert!(!validate_tax_id("ABC010001ABC"));
    }

    #[test]
    fn test_shape_versus_full_validation() {
        assert!(is_tax_id_shape("CFE370814QI0"));
        assert!(is_tax_id_shape("CFE370814010"));
        assert!(is_tax_id_shape("ABC001301ABC"));
        assert!(!is_tax_id_shape("CFE37081QI0"));
        assert!(!is_tax_id_shape("XCFE370814QI0X"));
    }

    #[test]
    fn test_normalize_tax_id() {
        assert_eq!(normalize_tax_id(" cfe-370814 qi0 "), "CFE370814QI0");
    }
}
