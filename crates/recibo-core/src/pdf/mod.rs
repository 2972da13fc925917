//! PDF text loading using lopdf and pdf-extract.

use lopdf::Document;
use tracing::debug;

use crate::error::PdfError;

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Extract the embedded text of a PDF receipt.
///
/// Documents encrypted with an empty password are decrypted first; any other
/// encryption is rejected.
pub fn extract_text(data: &[u8]) -> Result<String> {
    let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

    let decrypted = if doc.is_encrypted() {
        if doc.decrypt("").is_err() {
            return Err(PdfError::Encrypted);
        }
        debug!("Decrypted PDF with empty password");

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer)
            .map_err(|e| PdfError::Parse(format!("failed to save decrypted PDF: {e}")))?;
        Some(buffer)
    } else {
        None
    };

    let page_count = doc.get_pages().len();
    if page_count == 0 {
        return Err(PdfError::NoPages);
    }

    let text = pdf_extract::extract_text_from_mem(decrypted.as_deref().unwrap_or(data))
        .map_err(|e| PdfError::TextExtraction(e.to_string()))?;

    debug!(page_count, chars = text.len(), "Extracted PDF text");
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_bytes_are_rejected() {
        assert!(matches!(extract_text(b"not a pdf at all"), Err(PdfError::Parse(_))));
    }

    #[test]
    fn test_empty_input_is_rejected() {
        assert!(extract_text(&[]).is_err());
    }
}
