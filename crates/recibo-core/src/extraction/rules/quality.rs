//! Recognized-text quality heuristic.

use serde::Serialize;

use super::patterns::{GARBAGE_ACCENTS, GARBAGE_TOKENS};
use crate::models::config::EscalationConfig;

/// Quality signals for a recognized text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextQuality {
    /// Known garbage tokens and accent runs found.
    pub garbage_tokens: usize,
    /// Share of ASCII letters, digits and whitespace among all characters.
    pub normal_char_ratio: f32,
    /// Length in characters.
    pub length: usize,
    /// Whether the text is too corrupted for pattern extraction.
    pub is_garbage: bool,
}

/// Classify recognized text as usable or garbage.
pub fn assess_text_quality(text: &str, config: &EscalationConfig) -> TextQuality {
    let garbage_tokens =
        GARBAGE_TOKENS.find_iter(text).count() + GARBAGE_ACCENTS.find_iter(text).count();

    let length = text.chars().count();
    let normal = text
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .count();
    let normal_char_ratio = if length == 0 { 0.0 } else { normal as f32 / length as f32 };

    let is_garbage = garbage_tokens > config.garbage_token_threshold
        || normal_char_ratio < config.min_normal_char_ratio
        || length < config.min_text_length;

    TextQuality {
        garbage_tokens,
        normal_char_ratio,
        length,
        is_garbage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLEAN: &str =
        "COMISION FEDERAL DE ELECTRICIDAD\nRFC: CFE370814QI0\nFECHA 30/09/2025\nTOTAL $1,842.00";

    #[test]
    fn test_clean_text() {
        let quality = assess_text_quality(CLEAN, &EscalationConfig::default());
        assert_eq!(quality.garbage_tokens, 0);
        assert!(quality.normal_char_ratio > 0.9);
        assert!(!quality.is_garbage);
    }

    #[test]
    fn test_garbage_tokens() {
        let text =
            "NN NON ANN NANA ENE DNS CNA ECO RCN NENE ONU NN ticket de compra sin datos legibles";
        let quality = assess_text_quality(text, &EscalationConfig::default());
        assert_eq!(quality.garbage_tokens, 12);
        assert!(quality.is_garbage);
    }

    #[test]
    fn test_symbol_noise() {
        let text = "~~##@@!!**&&^^%%$$~~##@@!!**&&^^%%$$~~##@@!!**&&^^%%$$ TOTAL";
        let quality = assess_text_quality(text, &EscalationConfig::default());
        assert!(quality.normal_char_ratio < 0.5);
        assert!(quality.is_garbage);
    }

    #[test]
    fn test_short_text_is_garbage() {
        let quality = assess_text_quality("TOTAL 38.00", &EscalationConfig::default());
        assert!(quality.is_garbage);
        assert_eq!(quality.length, 11);
    }

    #[test]
    fn test_accent_runs_count() {
        let text = format!("{CLEAN}\nÓÑÜÓ ÜÜÜ");
        let quality = assess_text_quality(&text, &EscalationConfig::default());
        assert_eq!(quality.garbage_tokens, 2);
    }
}
