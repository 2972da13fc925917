//! Escalated extraction layer for recibo.
//!
//! This crate provides a unified interface for the costly extraction
//! strategies the core falls back to when pattern extraction is not good
//! enough:
//! - text escalation: a generative model reads the recognized text
//! - vision escalation: a multimodal model reads the receipt image directly
//!
//! Backends return a fully structured [`ReceiptRecord`] or nothing.

mod backend;
mod error;
mod record;

pub use backend::{TextEscalation, VisionEscalation};
pub use error::EscalationError;
pub use record::{
    RawRecord, ReceiptRecord, TEXT_ESCALATION_CONFIDENCE, VISION_ESCALATION_CONFIDENCE,
};

#[cfg(feature = "http")]
pub use backend::openai::{OpenAiBackend, OpenAiSettings};

/// Result type for escalation operations.
pub type Result<T> = std::result::Result<T, EscalationError>;
