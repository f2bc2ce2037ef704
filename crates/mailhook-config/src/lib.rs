// ============================================================================
// Mailhook Config - Centralized configuration management
// ============================================================================
//
// Configuration is read once from the environment into an immutable struct
// that is shared (behind an Arc) by every component.
//
// ============================================================================

mod constants;
mod extraction;
mod graph;
mod http;
mod logging;
mod sink;
mod subscription;

pub use constants::MAX_SUBSCRIPTION_MINUTES;
pub use extraction::ExtractionConfig;
pub use graph::GraphConfig;
pub use http::{AttachmentConfig, DedupConfig, HttpConfig};
pub use logging::LoggingConfig;
pub use sink::SinkConfig;
pub use subscription::{SubscriptionConfig, clamp_expiration_minutes};

use anyhow::Result;
use constants::*;

/// Main configuration structure for the webhook service and subscription job
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub bind_address: String,
    pub webhook_path: String,
    pub rust_log: String,

    // Sub-configurations
    pub graph: GraphConfig,
    pub extraction: ExtractionConfig,
    pub sink: SinkConfig,
    pub subscription: SubscriptionConfig,
    pub http: HttpConfig,
    pub attachments: AttachmentConfig,
    pub dedup: DedupConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let graph = GraphConfig::from_env();
        let extraction = ExtractionConfig::from_env();
        let sink = SinkConfig::from_env(graph.mailbox.as_deref());
        let subscription = SubscriptionConfig::from_env()?;
        let http = HttpConfig::from_env();
        let attachments = AttachmentConfig::from_env();
        let dedup = DedupConfig::from_env();
        let logging = LoggingConfig::from_env()?;

        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let webhook_path = std::env::var("WEBHOOK_PATH")
            .ok()
            .filter(|p| p.starts_with('/'))
            .unwrap_or_else(|| DEFAULT_WEBHOOK_PATH.to_string());

        Ok(Self {
            port,
            bind_address: std::env::var("BIND_ADDRESS")
                .unwrap_or_else(|_| format!("0.0.0.0:{}", port)),
            webhook_path,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            graph,
            extraction,
            sink,
            subscription,
            http,
            attachments,
            dedup,
            logging,
        })
    }

    /// Log which optional collaborators are not configured yet
    pub fn warn_missing(&self) {
        if !self.graph.has_credentials() {
            tracing::warn!(
                "TENANT_ID, CLIENT_ID or CLIENT_SECRET not set - notifications will be skipped"
            );
        }
        if self.graph.mailbox.is_none() {
            tracing::warn!("TARGET_MAILBOX not set - notification batches will be skipped");
        }
        if self.extraction.api_key.is_none() {
            tracing::warn!("OPENAI_API_KEY not set - extraction will fail for every notification");
        }
    }
}

/// Read an environment variable, treating blank values as absent
pub(crate) fn optional_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn set_required() {
        unsafe {
            std::env::set_var("SUBSCRIPTION_CLIENT_STATE", "state-secret");
            std::env::set_var("LOG_HASH_SALT", "test-salt");
        }
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        set_required();
        unsafe {
            std::env::remove_var("PORT");
            std::env::remove_var("WORKBOOK_OWNER");
            std::env::set_var("TARGET_MAILBOX", "inbox@example.com");
            std::env::set_var("SUBSCRIPTION_EXPIRATION_MINUTES", "not-a-number");
        }

        let config = Config::from_env().unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.webhook_path, "/webhook");
        assert_eq!(config.subscription.client_state, "state-secret");
        assert_eq!(config.subscription.expiration_minutes, MAX_SUBSCRIPTION_MINUTES);
        assert_eq!(
            config.sink.workbook_owner.as_deref(),
            Some("inbox@example.com")
        );
        assert_eq!(config.extraction.model, "gpt-4o-mini");

        unsafe {
            std::env::remove_var("TARGET_MAILBOX");
            std::env::remove_var("SUBSCRIPTION_EXPIRATION_MINUTES");
        }
    }

    #[test]
    #[serial]
    fn test_missing_client_state_is_rejected() {
        set_required();
        unsafe {
            std::env::set_var("SUBSCRIPTION_CLIENT_STATE", "   ");
        }

        assert!(Config::from_env().is_err());
    }

    #[test]
    #[serial]
    fn test_placeholder_salt_is_rejected() {
        set_required();
        unsafe {
            std::env::set_var("LOG_HASH_SALT", "default-salt-please-change");
        }

        assert!(Config::from_env().is_err());
    }

    #[test]
    fn test_clamp_expiration_minutes() {
        assert_eq!(clamp_expiration_minutes(60), 60);
        assert_eq!(clamp_expiration_minutes(10_000), MAX_SUBSCRIPTION_MINUTES);
        assert_eq!(clamp_expiration_minutes(0), MAX_SUBSCRIPTION_MINUTES);
    }
}
