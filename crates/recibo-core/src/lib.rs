//! Core library for receipt field extraction.
//!
//! This crate provides:
//! - Multi-strategy field extraction (learned patterns, keyword context, line position)
//! - Confidence arbitration, arithmetic consistency checks and acceptance
//! - Escalation to text or vision extractors when the cheap path is not enough
//! - Pattern learning from human corrections
//! - A JSON-file store for patterns, attempts and corrections
//! - PDF text loading

pub mod error;
pub mod extraction;
pub mod learner;
pub mod models;
pub mod patterns;
pub mod pdf;
pub mod store;

pub use error::{PdfError, ReciboError, Result, StoreError};
pub use extraction::{
    CorrectionOutcome, EscalationState, ExtractionOutcome, ProcessedDocument, ReceiptEngine,
};
pub use learner::{CorrectionLearner, LearnOutcome};
pub use models::config::ReciboConfig;
pub use models::document::DocumentInput;
pub use models::receipt::{
    Correction, ExtractionAttempt, ExtractionMethod, ExtractionSource, FieldCandidate, FieldId,
    FieldValue, RecordField,
};
pub use patterns::{ExtractionPattern, NewPattern, PatternStore};
pub use store::{ExtractionRepository, LocalStore, PatternRepository};

/// Re-export escalation types.
pub use recibo_escalation::{EscalationError, ReceiptRecord, TextEscalation, VisionEscalation};

#[cfg(feature = "http")]
pub use recibo_escalation::{OpenAiBackend, OpenAiSettings};
