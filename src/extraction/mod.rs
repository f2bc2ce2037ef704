// ============================================================================
// Structured-Data Extractor
// ============================================================================
//
// Builds one instruction prompt from the message body and the attachment
// texts, sends it to a chat-completion model at temperature 0 and
// normalises the reply into a CanonicalRecord.
//
// ============================================================================

pub mod record;

pub use record::{CanonicalRecord, Row};

use async_openai::types::{ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs};
use async_openai::{Client, config::OpenAIConfig};
use async_trait::async_trait;
use mailhook_config::ExtractionConfig;
use mailhook_error::{AppError, AppResult};
use std::time::Duration;

/// Turns free text into a canonical record
#[async_trait]
pub trait StructuredExtractor: Send + Sync {
    async fn extract(&self, body: &str, attachment_texts: &[String]) -> AppResult<CanonicalRecord>;
}

/// Prompt asking for exactly the four record keys
pub fn build_prompt(body: &str, attachment_texts: &[String]) -> String {
    let attachments = serde_json::to_string(attachment_texts).unwrap_or_else(|_| "[]".to_string());
    format!(
        "Eres un parser de emails. Devuelve solo un objeto JSON con exactamente estas cuatro claves:\n\
         - \"nombre\": nombre de la persona (cadena, vacía si no aparece)\n\
         - \"cedula\": número de cédula (cadena, vacía si no aparece)\n\
         - \"texto_original\": el texto completo del email\n\
         - \"adjuntos\": lista de cadenas con el texto OCR de cada adjunto\n\
         No agregues texto fuera del JSON.\n\
         Email completo:\n\"\"\"{}\"\"\"\n\
         Adjuntos OCR:\n\"\"\"{}\"\"\"",
        body, attachments
    )
}

pub struct OpenAiExtractor {
    client: Option<Client<OpenAIConfig>>,
    model: String,
    timeout: Duration,
}

impl OpenAiExtractor {
    /// Without an API key every call fails with a configuration error
    ///
    /// `timeout` bounds the whole completion call, including the client's
    /// own retries on rate limiting.
    pub fn new(http: reqwest::Client, config: &ExtractionConfig, timeout: Duration) -> Self {
        let client = config.api_key.as_deref().map(|api_key| {
            let openai_config = OpenAIConfig::new()
                .with_api_key(api_key)
                .with_api_base(config.api_base.trim_end_matches('/'));
            Client::with_config(openai_config).with_http_client(http)
        });

        Self {
            client,
            model: config.model.clone(),
            timeout,
        }
    }

    async fn complete(&self, prompt: String) -> AppResult<String> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| AppError::config("OPENAI_API_KEY is not set"))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(0.0)
            .messages([ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| AppError::internal(e.to_string()))?
                .into()])
            .build()
            .map_err(|e| AppError::internal(e.to_string()))?;

        let response = tokio::time::timeout(self.timeout, client.chat().create(request))
            .await
            .map_err(|_| {
                AppError::Timeout(format!(
                    "completion request exceeded {}s",
                    self.timeout.as_secs_f32()
                ))
            })?
            .map_err(|e| AppError::extraction(format!("completion request failed: {}", e)))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AppError::extraction("completion response has no content"))
    }
}

#[async_trait]
impl StructuredExtractor for OpenAiExtractor {
    async fn extract(&self, body: &str, attachment_texts: &[String]) -> AppResult<CanonicalRecord> {
        let content = self.complete(build_prompt(body, attachment_texts)).await?;
        CanonicalRecord::from_model_output(&content, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_names_all_four_keys() {
        let prompt = build_prompt("Hola, soy Ana", &["texto escaneado".to_string()]);

        for key in ["\"nombre\"", "\"cedula\"", "\"texto_original\"", "\"adjuntos\""] {
            assert!(prompt.contains(key), "missing {key}");
        }
        assert!(prompt.contains("Hola, soy Ana"));
        assert!(prompt.contains(r#"["texto escaneado"]"#));
    }

    #[test]
    fn test_prompt_with_no_attachments() {
        let prompt = build_prompt("cuerpo", &[]);
        assert!(prompt.contains("\"\"\"[]\"\"\""));
    }

    #[tokio::test]
    async fn test_missing_api_key_is_config_error() {
        let config = ExtractionConfig {
            api_key: None,
            api_base: "http://127.0.0.1:9".into(),
            model: "gpt-4o-mini".into(),
        };
        let extractor =
            OpenAiExtractor::new(reqwest::Client::new(), &config, Duration::from_secs(5));

        let err = extractor.extract("body", &[]).await.unwrap_err();
        assert!(err.is_config());
    }
}
