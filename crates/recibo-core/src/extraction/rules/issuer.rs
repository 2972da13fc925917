//! Issuer name heuristic for the pattern path.

use super::patterns::{DIGIT, LABEL};

/// Leading lines inspected for the issuer name.
const ISSUER_SEARCH_LINES: usize = 5;

/// Guess the issuer name from the top of the ticket.
///
/// Picks the first leading line that is mostly letters, carries no digits
/// and is not a field label.
pub fn guess_issuer<'a>(lines: impl IntoIterator<Item = &'a str>) -> Option<String> {
    lines
        .into_iter()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(ISSUER_SEARCH_LINES)
        .find(|line| looks_like_name(line))
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn looks_like_name(line: &str) -> bool {
    if DIGIT.is_match(line) || LABEL.is_match(line) || line.contains(':') {
        return false;
    }

    let visible: Vec<char> = line.chars().filter(|c| !c.is_whitespace()).collect();
    let letters = visible.iter().filter(|c| c.is_alphabetic()).count();

    letters >= 3 && letters as f32 / visible.len() as f32 >= 0.8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_name_line() {
        let lines = ["", "  COMISION   FEDERAL DE ELECTRICIDAD ", "RFC: CFE370814QI0"];
        assert_eq!(guess_issuer(lines), Some("COMISION FEDERAL DE ELECTRICIDAD".to_string()));
    }

    #[test]
    fn test_skips_labels_and_numbers() {
        let lines = [
            "TICKET DE VENTA",
            "*** 0042 ***",
            "Cadena Comercial OXXO, S.A. de C.V.",
            "TOTAL 38.00",
        ];
        assert_eq!(guess_issuer(lines), Some("Cadena Comercial OXXO, S.A. de C.V.".to_string()));
    }

    #[test]
    fn test_no_candidate() {
        let lines = ["17/10/2025", "RFC: CFE370814QI0", "TOTAL $116.00"];
        assert_eq!(guess_issuer(lines), None);
    }
}
