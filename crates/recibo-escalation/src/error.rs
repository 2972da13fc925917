//! Error types for the escalation layer.

use thiserror::Error;

/// Errors that can occur while running an escalated extractor.
#[derive(Error, Debug)]
pub enum EscalationError {
    /// Transport or HTTP status failure.
    #[error("request failed: {0}")]
    Http(String),

    /// The backend did not answer within the allotted time.
    #[error("escalation timed out after {0} ms")]
    Timeout(u64),

    /// The backend answered with something that is not a receipt record.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Backend is missing credentials or endpoint settings.
    #[error("backend not configured: {0}")]
    NotConfigured(String),

    /// Image bytes are not in a format the vision backend accepts.
    #[error("unsupported image format")]
    UnsupportedImage,
}
