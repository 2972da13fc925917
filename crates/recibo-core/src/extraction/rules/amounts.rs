//! Money amount parsing and comparison.

use rust_decimal::Decimal;
use std::str::FromStr;

/// Tolerance for treating two amounts as equal.
pub const AMOUNT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Parse a money string, dropping currency symbols, signs, spaces and
/// thousands commas.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    Decimal::from_str(cleaned.trim_end_matches('.')).ok()
}

/// Whether two amounts differ by at most one cent.
pub fn amounts_match(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() <= AMOUNT_TOLERANCE
}

/// Whether `actual` lies within one percent of `expected`.
pub fn within_one_percent(actual: Decimal, expected: Decimal) -> bool {
    (actual - expected).abs() <= expected.abs() * Decimal::new(1, 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("$1,588.00"), Some(dec("1588.00")));
        assert_eq!(parse_amount(" 1 842.5 "), Some(dec("1842.5")));
        assert_eq!(parse_amount("-(38)"), Some(dec("38")));
        assert_eq!(parse_amount("116."), Some(dec("116")));
        assert_eq!(parse_amount("MXN"), None);
        assert_eq!(parse_amount("1.2.3"), None);
    }

    #[test]
    fn test_amounts_match() {
        assert!(amounts_match(dec("116.00"), dec("116.01")));
        assert!(!amounts_match(dec("116.00"), dec("116.02")));
    }

    #[test]
    fn test_within_one_percent() {
        assert!(within_one_percent(dec("116.00"), dec("116.50")));
        assert!(!within_one_percent(dec("110.00"), dec("116.00")));
    }
}
