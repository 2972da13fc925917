//! Configuration structures for the extraction pipeline.

use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::receipt::{FieldId, RecordField};
use crate::error::{ReciboError, Result};

/// Main configuration for the recibo pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReciboConfig {
    /// Cheap extraction and scoring configuration.
    pub extraction: ExtractionConfig,

    /// Escalation policy and backend configuration.
    pub escalation: EscalationConfig,

    /// Local persistence configuration.
    pub store: StoreConfig,
}

/// Field extraction and confidence scoring configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Minimum overall confidence (0 - 100) for accepting a result.
    pub acceptance_threshold: u32,

    /// Fixed tax rate used for the tax/subtotal cross-check.
    pub tax_rate: Decimal,

    /// Relative field weights for the overall score.
    pub weights: FieldWeights,

    /// Characters searched after a context keyword.
    pub context_window: usize,

    /// Below this many stored patterns the defaults are seeded.
    pub min_pattern_count: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: 60,
            tax_rate: Decimal::new(16, 2),
            weights: FieldWeights::default(),
            context_window: 80,
            min_pattern_count: 13,
        }
    }
}

/// Relative weight of each field in the overall confidence. Must sum to 100.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldWeights {
    pub tax_id: u32,
    pub date: u32,
    pub total: u32,
    pub tax: u32,
    pub subtotal: u32,
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self {
            tax_id: 30,
            date: 20,
            total: 25,
            tax: 15,
            subtotal: 10,
        }
    }
}

impl FieldWeights {
    /// Weight of a single field.
    pub fn weight(&self, field: FieldId) -> u32 {
        match field {
            FieldId::TaxId => self.tax_id,
            FieldId::Date => self.date,
            FieldId::Total => self.total,
            FieldId::Tax => self.tax,
            FieldId::Subtotal => self.subtotal,
        }
    }

    pub fn sum(&self) -> u32 {
        FieldId::ALL.iter().map(|f| self.weight(*f)).sum()
    }
}

/// Escalation policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Build escalation backends at startup.
    pub enabled: bool,

    /// Overall confidence below which text escalation is attempted.
    pub threshold: u32,

    /// Fields whose absence forces text escalation.
    pub critical_fields: Vec<RecordField>,

    /// Per-call timeout for escalated extractors.
    pub timeout_ms: u64,

    /// More known garbage tokens than this marks the text as garbage.
    pub garbage_token_threshold: usize,

    /// Minimum share of letters, digits and whitespace in usable text.
    pub min_normal_char_ratio: f32,

    /// Shorter texts are treated as garbage.
    pub min_text_length: usize,

    /// Generative backend settings.
    pub api: EscalationApiConfig,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: 75,
            critical_fields: vec![RecordField::TaxId, RecordField::Issuer, RecordField::Total],
            timeout_ms: 30_000,
            garbage_token_threshold: 10,
            min_normal_char_ratio: 0.5,
            min_text_length: 50,
            api: EscalationApiConfig::default(),
        }
    }
}

/// OpenAI-compatible endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationApiConfig {
    pub base_url: String,
    pub text_model: String,
    pub vision_model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub temperature: f32,
}

impl Default for EscalationApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            text_model: "gpt-4o-mini".to_string(),
            vision_model: "gpt-4o".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.1,
        }
    }
}

/// Local persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON pattern file. Attempts and corrections go to a `.journal.jsonl`
    /// file beside it.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("recibo-store.json"),
        }
    }
}

impl ReciboConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            serde_json::from_str(&content).map_err(|e| ReciboError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ReciboError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check value ranges and weight consistency.
    pub fn validate(&self) -> Result<()> {
        let sum = self.extraction.weights.sum();
        if sum != 100 {
            return Err(ReciboError::Config(format!(
                "field weights must sum to 100, got {sum}"
            )));
        }
        if self.extraction.acceptance_threshold > 100 {
            return Err(ReciboError::Config(
                "extraction.acceptance_threshold must be within 0..=100".to_string(),
            ));
        }
        if self.escalation.threshold > 100 {
            return Err(ReciboError::Config(
                "escalation.threshold must be within 0..=100".to_string(),
            ));
        }
        if self.extraction.tax_rate.is_sign_negative() {
            return Err(ReciboError::Config("extraction.tax_rate must not be negative".to_string()));
        }
        if !(0.0..=1.0).contains(&self.escalation.min_normal_char_ratio) {
            return Err(ReciboError::Config(
                "escalation.min_normal_char_ratio must be within 0..=1".to_string(),
            ));
        }
        Ok(())
    }
}
