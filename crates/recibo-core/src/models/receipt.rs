//! Receipt extraction data model.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ReciboError;
use recibo_escalation::ReceiptRecord;

/// Fields located by the cheap extraction strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldId {
    /// Issuer federal taxpayer registration code (RFC).
    TaxId,
    /// Issue date.
    Date,
    /// Grand total.
    Total,
    /// Tax amount (IVA).
    Tax,
    /// Amount before tax.
    Subtotal,
}

impl FieldId {
    /// Every extracted field, in scoring order.
    pub const ALL: [FieldId; 5] = [
        FieldId::TaxId,
        FieldId::Date,
        FieldId::Total,
        FieldId::Tax,
        FieldId::Subtotal,
    ];

    /// Canonical field name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldId::TaxId => "taxId",
            FieldId::Date => "date",
            FieldId::Total => "total",
            FieldId::Tax => "tax",
            FieldId::Subtotal => "subtotal",
        }
    }

    /// Whether the field holds a money amount.
    pub fn is_amount(&self) -> bool {
        matches!(self, FieldId::Total | FieldId::Tax | FieldId::Subtotal)
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldId {
    type Err = ReciboError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "taxid" | "tax_id" | "rfc" => Ok(FieldId::TaxId),
            "date" | "fecha" => Ok(FieldId::Date),
            "total" | "importetotal" | "importe_total" => Ok(FieldId::Total),
            "tax" | "iva" => Ok(FieldId::Tax),
            "subtotal" => Ok(FieldId::Subtotal),
            _ => Err(ReciboError::UnknownField(s.to_string())),
        }
    }
}

/// Fields of a final [`ReceiptRecord`], used to express critical fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    TaxId,
    Issuer,
    Date,
    Total,
    Tax,
    Subtotal,
}

impl RecordField {
    /// Check whether the record lacks this field (empty text or zero amount).
    pub fn is_missing(&self, record: &ReceiptRecord) -> bool {
        match self {
            RecordField::TaxId => record.tax_id.trim().is_empty(),
            RecordField::Issuer => record.issuer.as_deref().is_none_or(|s| s.trim().is_empty()),
            RecordField::Date => record.date.as_deref().is_none_or(|s| s.trim().is_empty()),
            RecordField::Total => record.total.is_zero(),
            RecordField::Tax => record.tax.is_zero(),
            RecordField::Subtotal => record.subtotal.is_zero(),
        }
    }
}

/// Strategy that produced a field candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Stored extraction pattern.
    Pattern,
    /// Keyword followed by a field-shaped value.
    Context,
    /// Expected relative line position.
    Position,
    /// Nothing found.
    None,
}

/// One guess for a field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCandidate {
    /// Raw matched text.
    pub value: String,
    /// Confidence (0 - 100).
    pub confidence: f32,
    /// Strategy that produced it.
    pub method: ExtractionMethod,
    /// Pattern that matched, for pattern candidates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_id: Option<u64>,
}

impl FieldCandidate {
    pub fn new(value: impl Into<String>, confidence: f32, method: ExtractionMethod) -> Self {
        Self {
            value: value.into(),
            confidence: clamp_confidence(confidence),
            method,
            pattern_id: None,
        }
    }

    pub fn with_pattern(mut self, pattern_id: u64) -> Self {
        self.pattern_id = Some(pattern_id);
        self
    }

    /// Candidate used when no strategy found anything.
    pub fn empty() -> Self {
        Self::new("", 0.0, ExtractionMethod::None)
    }

    pub fn is_empty(&self) -> bool {
        self.value.trim().is_empty()
    }

    /// Multiply the confidence, keeping it within bounds.
    pub fn boost(&mut self, factor: f32) {
        self.confidence = clamp_confidence(self.confidence * factor);
    }
}

/// Clamp a confidence score into `[0, 100]`.
pub fn clamp_confidence(confidence: f32) -> f32 {
    if confidence.is_nan() {
        return 0.0;
    }
    confidence.clamp(0.0, 100.0)
}

/// Value and confidence reported to callers for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    pub value: String,
    pub confidence: f32,
}

/// Path that produced the final result of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionSource {
    /// Pattern, context and position strategies.
    Patterns,
    /// Generative model over the recognized text.
    EscalatedText,
    /// Multimodal model over the image.
    EscalatedVision,
}

/// One run of the extraction pipeline over one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionAttempt {
    /// Assigned by the store.
    pub id: u64,
    /// Caller-supplied document identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_document_id: Option<String>,
    /// Recognized text the attempt ran on.
    pub raw_text: String,
    /// Every candidate produced, per field.
    pub candidates: BTreeMap<FieldId, Vec<FieldCandidate>>,
    /// Winning candidate per field after arbitration.
    pub chosen: BTreeMap<FieldId, FieldCandidate>,
    /// Overall confidence of the final result.
    pub overall_confidence: u32,
    /// Whether the final result was accepted.
    pub accepted: bool,
    /// Path that produced the final result.
    pub method_used: ExtractionSource,
    /// Final record, absent when rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<ReceiptRecord>,
    pub processing_time_ms: u64,
    pub created_at: DateTime<Utc>,
}

/// Human-supplied authoritative value for one field of an attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    /// Assigned by the store.
    pub id: u64,
    pub extraction_id: u64,
    pub field_name: String,
    pub extracted_value: String,
    pub corrected_value: String,
    /// Where the correction came from (manual, api, chat, ...).
    pub source: String,
    pub created_at: DateTime<Utc>,
}
