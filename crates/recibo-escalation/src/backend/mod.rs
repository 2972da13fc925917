//! Escalation backend implementations.

#[cfg(feature = "http")]
pub mod openai;

use async_trait::async_trait;

use crate::{ReceiptRecord, Result};

/// Extractor that reads recognized receipt text with a generative model.
///
/// Implementations answer `Ok(None)` when the model found nothing usable;
/// errors are reserved for transport and protocol failures.
#[async_trait]
pub trait TextEscalation: Send + Sync {
    /// Short backend name used in logs and extraction records.
    fn name(&self) -> &str;

    /// Extract a structured record from raw recognized text.
    async fn extract_text(&self, raw_text: &str) -> Result<Option<ReceiptRecord>>;
}

/// Extractor that reads the receipt image directly.
#[async_trait]
pub trait VisionEscalation: Send + Sync {
    /// Short backend name used in logs and extraction records.
    fn name(&self) -> &str;

    /// Extract a structured record from encoded image bytes (PNG, JPEG, ...).
    async fn extract_image(&self, image: &[u8]) -> Result<Option<ReceiptRecord>>;
}
