//! OpenAI-compatible chat-completions backend (text and vision).

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::{TextEscalation, VisionEscalation};
use crate::error::EscalationError;
use crate::record::{
    RawRecord, ReceiptRecord, TEXT_ESCALATION_CONFIDENCE, VISION_ESCALATION_CONFIDENCE,
};
use crate::Result;

const SYSTEM_PROMPT: &str = "You extract data from Mexican purchase tickets and invoices. \
Always answer with a single valid JSON object and nothing else.";

const FIELD_INSTRUCTIONS: &str = r#"Extract the following fields:

1. tax_id: the RFC of the ISSUER (the business that printed the ticket), not the customer.
   Format: 3-4 uppercase letters + 6 digits forming a valid YYMMDD date + 3 alphanumeric characters.
   Example: CFE370814QI0. Look near "RFC:", "R.F.C.". OCR often confuses Q/0, I/1, O/0, S/5, B/8.
2. issuer: business name of the issuer, usually at the top of the ticket.
3. date: issue date converted to YYYY-MM-DD (30-SEP-2025 -> 2025-09-30, 17/10/2025 -> 2025-10-17).
4. total: amount paid, look near TOTAL, GRAN TOTAL, IMPORTE TOTAL, CARGO A TARJETA.
5. tax: IVA amount, 0 when the ticket carries no tax.
6. subtotal: amount before tax.

Amounts are positive decimal numbers without currency symbols, signs or parentheses.
IVA in Mexico is usually 16% of the subtotal. Use null for anything you cannot find.

Answer with exactly this structure:
{"tax_id": string|null, "issuer": string|null, "date": string|null, "total": number, "tax": number, "subtotal": number}"#;

/// Connection settings for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    /// Base URL, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// Bearer token.
    pub api_key: String,
    /// Model used for text escalation.
    pub text_model: String,
    /// Multimodal model used for vision escalation.
    pub vision_model: String,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Backend calling an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiBackend {
    client: Client,
    settings: OpenAiSettings,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl OpenAiBackend {
    /// Create a backend from settings.
    pub fn new(settings: OpenAiSettings) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            return Err(EscalationError::NotConfigured("missing API key".to_string()));
        }

        info!(
            url = %settings.base_url,
            text_model = %settings.text_model,
            vision_model = %settings.vision_model,
            "Using OpenAI-compatible escalation backend"
        );

        Ok(Self {
            client: Client::new(),
            settings,
        })
    }

    async fn complete(&self, model: &str, user_content: Value) -> Result<Option<RawRecord>> {
        let url = format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'));

        let body = json!({
            "model": model,
            "temperature": self.settings.temperature,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_content },
            ],
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EscalationError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(EscalationError::Http(format!("{status}: {text}")));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| EscalationError::MalformedResponse(e.to_string()))?;

        let Some(content) = chat.choices.into_iter().next().and_then(|c| c.message.content) else {
            warn!(model, "escalation backend returned no content");
            return Ok(None);
        };

        debug!(model, chars = content.len(), "escalation backend answered");
        parse_answer(&content).map(Some)
    }
}

/// Parse the model answer, tolerating markdown code fences around the JSON.
fn parse_answer(content: &str) -> Result<RawRecord> {
    let trimmed = content.trim();
    let json = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed);

    serde_json::from_str(json.trim()).map_err(|e| EscalationError::MalformedResponse(e.to_string()))
}

#[async_trait]
impl TextEscalation for OpenAiBackend {
    fn name(&self) -> &str {
        &self.settings.text_model
    }

    async fn extract_text(&self, raw_text: &str) -> Result<Option<ReceiptRecord>> {
        let prompt = format!(
            "Analyze this text recognized from a ticket or invoice.\n\nTICKET TEXT:\n\"\"\"\n{raw_text}\n\"\"\"\n\n{FIELD_INSTRUCTIONS}"
        );

        let raw = self.complete(&self.settings.text_model, Value::String(prompt)).await?;
        Ok(raw.and_then(|r| r.normalize(TEXT_ESCALATION_CONFIDENCE)))
    }
}

#[async_trait]
impl VisionEscalation for OpenAiBackend {
    fn name(&self) -> &str {
        &self.settings.vision_model
    }

    async fn extract_image(&self, image: &[u8]) -> Result<Option<ReceiptRecord>> {
        let format = image::guess_format(image).map_err(|_| EscalationError::UnsupportedImage)?;
        let data_url = format!("data:{};base64,{}", format.to_mime_type(), STANDARD.encode(image));

        let content = json!([
            {
                "type": "text",
                "text": format!(
                    "Analyze this image of a ticket or invoice.\n\n{FIELD_INSTRUCTIONS}"
                ),
            },
            {
                "type": "image_url",
                "image_url": { "url": data_url, "detail": "high" },
            },
        ]);

        let raw = self.complete(&self.settings.vision_model, content).await?;
        Ok(raw.and_then(|r| r.normalize(VISION_ESCALATION_CONFIDENCE)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(api_key: &str) -> OpenAiSettings {
        OpenAiSettings {
            base_url: "http://localhost:9".to_string(),
            api_key: api_key.to_string(),
            text_model: "gpt-4o-mini".to_string(),
            vision_model: "gpt-4o".to_string(),
            temperature: 0.1,
        }
    }

    #[test]
    fn test_parse_answer_with_fences() {
        let raw =
            parse_answer("```json\n{\"tax_id\": \"CFE370814QI0\", \"total\": 116}\n```").unwrap();
        assert_eq!(raw.tax_id.as_deref(), Some("CFE370814QI0"));
    }

    #[test]
    fn test_parse_answer_rejects_prose() {
        assert!(matches!(
            parse_answer("I could not read the ticket"),
            Err(EscalationError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_backend_requires_api_key() {
        assert!(matches!(
            OpenAiBackend::new(settings("  ")),
            Err(EscalationError::NotConfigured(_))
        ));
        assert!(OpenAiBackend::new(settings("sk-test")).is_ok());
    }
}
