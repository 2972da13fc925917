//! Input handed to the extraction pipeline.

/// One document to process.
#[derive(Debug, Clone, Default)]
pub struct DocumentInput {
    /// Recognized text, possibly empty when only an image is available.
    pub text: String,
    /// Original image bytes, used by vision escalation.
    pub image: Option<Vec<u8>>,
    /// Caller-supplied identifier, e.g. a file name.
    pub source_id: Option<String>,
}

impl DocumentInput {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_image(mut self, image: Vec<u8>) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }
}
