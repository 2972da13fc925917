//! Field-typed value shapes and text-quality regexes.

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::receipt::FieldId;

/// RFC shape: 3-4 letters (including Ñ and &), 6 digits, 3 alphanumerics.
pub const TAX_ID_SHAPE: &str = r"([A-ZÑ&]{3,4}\d{6}[A-Z0-9]{3})";

/// Day-month-year with `-` or `/` separators.
pub const DATE_SHAPE: &str = r"(\d{1,2}[-/]\d{1,2}[-/]\d{2,4})";

/// Optional currency, sign or parenthesis, then an amount with optional
/// thousands separators and up to two decimals.
pub const MONEY_SHAPE: &str = r"[$\-(]*\s*(\d{1,3}(?:[, ]\d{3})+(?:\.\d{1,2})?|\d+(?:\.\d{1,2})?)";

/// Shape used to find a raw value for a field after a keyword or near a line.
pub fn shape_pattern(field: FieldId) -> &'static str {
    match field {
        FieldId::TaxId => TAX_ID_SHAPE,
        FieldId::Date => DATE_SHAPE,
        FieldId::Total | FieldId::Tax | FieldId::Subtotal => MONEY_SHAPE,
    }
}

/// Compiled shape for a field.
pub fn shape_regex(field: FieldId) -> &'static Regex {
    match field {
        FieldId::TaxId => &TAX_ID,
        FieldId::Date => &DATE,
        FieldId::Total | FieldId::Tax | FieldId::Subtotal => &MONEY,
    }
}

lazy_static! {
    pub static ref TAX_ID: Regex = Regex::new(TAX_ID_SHAPE).unwrap();

    pub static ref DATE: Regex = Regex::new(DATE_SHAPE).unwrap();

    pub static ref MONEY: Regex = Regex::new(MONEY_SHAPE).unwrap();

    // Full RFC with a valid embedded YYMMDD
    pub static ref TAX_ID_FULL: Regex = Regex::new(
        r"^[A-ZÑ&]{3,4}\d{2}(?:0[1-9]|1[0-2])(?:0[1-9]|[12]\d|3[01])[A-Z0-9]{3}$"
    ).unwrap();

    // D/M/Y, D-M-Y
    pub static ref DATE_NUMERIC: Regex = Regex::new(
        r"^(\d{1,2})[-/.](\d{1,2})[-/.](\d{2}|\d{4})$"
    ).unwrap();

    // Y-M-D
    pub static ref DATE_ISO: Regex = Regex::new(
        r"^(\d{4})[-/](\d{1,2})[-/](\d{1,2})$"
    ).unwrap();

    // 30-SEP-2025, 30/SEP, 30 SEP 25
    pub static ref DATE_MONTH_NAME: Regex = Regex::new(
        r"(?i)^(\d{1,2})[-/\s]+([A-Z]{3})[A-Z]*\.?(?:[-/\s]+(\d{2}|\d{4}))?$"
    ).unwrap();

    // Tokens OCR engines emit when they read noise or shading
    pub static ref GARBAGE_TOKENS: Regex = Regex::new(
        r"\b(?:NN|NON|ANN|NANA|ENE|DNS|CNA|ECO|RCN|NENE|ONU)\b"
    ).unwrap();

    pub static ref GARBAGE_ACCENTS: Regex = Regex::new(r"[ÓÑÜ]{3,}").unwrap();

    pub static ref DIGIT: Regex = Regex::new(r"\d").unwrap();

    pub static ref LABEL: Regex = Regex::new(
        r"(?i)^(?:r\.?f\.?c|fecha|total|subtotal|iva|ticket|factura|folio|cliente|caja|cajero|tel|domicilio|sucursal)\b"
    ).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture<'t>(re: &Regex, text: &'t str) -> Option<&'t str> {
        re.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str())
    }

    #[test]
    fn test_tax_id_shape() {
        assert_eq!(capture(&TAX_ID, "RFC: CFE370814QI0 "), Some("CFE370814QI0"));
        assert_eq!(capture(&TAX_ID, "R.F.C. AB&010101A1B"), Some("AB&010101A1B"));
        assert_eq!(capture(&TAX_ID, "RFC: CF370814QI0"), None);
        // Shape only: an impossible month still has the right shape.
        assert_eq!(capture(&TAX_ID, "ABC001301ABC"), Some("ABC001301ABC"));
    }

    #[test]
    fn test_date_shape() {
        assert_eq!(capture(&DATE, "FECHA 17/10/2025 12:30"), Some("17/10/2025"));
        assert_eq!(capture(&DATE, "1-2-25"), Some("1-2-25"));
        assert_eq!(capture(&DATE, "2025.10.17"), None);
    }

    #[test]
    fn test_money_shape() {
        assert_eq!(capture(&MONEY, "$116.00"), Some("116.00"));
        assert_eq!(capture(&MONEY, "$ 1,588.00 MXN"), Some("1,588.00"));
        assert_eq!(capture(&MONEY, "-(38.5)"), Some("38.5"));
        assert_eq!(capture(&MONEY, "0.50"), Some("0.50"));
    }

    #[test]
    fn test_shape_pattern_matches_regex() {
        for field in FieldId::ALL {
            assert_eq!(shape_regex(field).as_str(), shape_pattern(field));
        }
    }
}
