// ============================================================================
// Extraction Service Configuration
// ============================================================================

use crate::constants::*;
use crate::optional_var;

#[derive(Clone, Debug)]
pub struct ExtractionConfig {
    /// API key for the chat completion service (missing key skips extraction)
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
}

impl ExtractionConfig {
    pub(crate) fn from_env() -> Self {
        Self {
            api_key: optional_var("OPENAI_API_KEY"),
            api_base: std::env::var("OPENAI_API_BASE")
                .unwrap_or_else(|_| DEFAULT_OPENAI_API_BASE.to_string()),
            model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_OPENAI_MODEL.to_string()),
        }
    }
}
