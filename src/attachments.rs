// ============================================================================
// Attachment Extractor
// ============================================================================
//
// Downloads a message's attachments and turns each one into text through an
// OCR engine. Failures are per attachment: a missing payload, a bad base64
// string or an OCR error drops that attachment and keeps its siblings.
//
// ============================================================================

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use mailhook_error::AppResult;
use std::sync::Arc;

use crate::graph::{Attachment, MailClient, Message};

pub const PLACEHOLDER_OCR_TEXT: &str = "OCR placeholder text for attachment";

/// Converts attachment bytes to text
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, name: &str, content_type: Option<&str>, bytes: &[u8])
    -> AppResult<String>;
}

/// Stand-in engine until a real OCR backend is wired up
pub struct PlaceholderOcr;

#[async_trait]
impl OcrEngine for PlaceholderOcr {
    async fn recognize(
        &self,
        name: &str,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> AppResult<String> {
        tracing::warn!(
            attachment = %name,
            content_type = content_type.unwrap_or("unknown"),
            size = bytes.len(),
            "No OCR backend configured, using placeholder text"
        );
        Ok(PLACEHOLDER_OCR_TEXT.to_string())
    }
}

/// Decode an attachment's base64 `contentBytes`
pub fn decode_content(encoded: &str) -> AppResult<Vec<u8>> {
    Ok(STANDARD.decode(encoded.trim())?)
}

pub struct AttachmentExtractor {
    mail: Arc<dyn MailClient>,
    ocr: Arc<dyn OcrEngine>,
    max_bytes: usize,
}

impl AttachmentExtractor {
    pub fn new(mail: Arc<dyn MailClient>, ocr: Arc<dyn OcrEngine>, max_bytes: usize) -> Self {
        Self {
            mail,
            ocr,
            max_bytes,
        }
    }

    /// Ordered OCR texts for the message's attachments
    ///
    /// Never fails: a collection fetch error yields an empty list.
    pub async fn extract(&self, mailbox: &str, message: &Message) -> Vec<String> {
        if !message.has_attachments {
            return Vec::new();
        }

        let attachments = match self.mail.fetch_attachments(mailbox, &message.id).await {
            Ok(attachments) => attachments,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    message_id = %message.id,
                    "Failed to fetch attachments, continuing without attachment text"
                );
                return Vec::new();
            }
        };

        let mut texts = Vec::with_capacity(attachments.len());
        for attachment in &attachments {
            if let Some(text) = self.extract_one(&message.id, attachment).await {
                texts.push(text);
            }
        }
        texts
    }

    async fn extract_one(&self, message_id: &str, attachment: &Attachment) -> Option<String> {
        let name = attachment.display_name();

        let Some(encoded) = attachment.content_bytes.as_deref() else {
            tracing::warn!(
                attachment = %name,
                message_id = %message_id,
                "Attachment has no contentBytes"
            );
            return None;
        };

        let bytes = match decode_content(encoded) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    error_code = e.error_code(),
                    attachment = %name,
                    message_id = %message_id,
                    "Attachment content is not valid base64"
                );
                return None;
            }
        };

        if bytes.len() > self.max_bytes {
            tracing::warn!(
                attachment = %name,
                message_id = %message_id,
                size = bytes.len(),
                max_bytes = self.max_bytes,
                "Attachment too large, skipping"
            );
            return None;
        }

        match self
            .ocr
            .recognize(name, attachment.content_type.as_deref(), &bytes)
            .await
        {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    attachment = %name,
                    message_id = %message_id,
                    "OCR failed for attachment"
                );
                None
            }
        }
    }
}
