use mailhook_config::{Config, GraphConfig, HttpConfig};
use mailhook_error::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

use crate::attachments::PlaceholderOcr;
use crate::auth::{ClientCredentialsProvider, TokenCache};
use crate::deduplication::InMemoryIdempotencyStore;
use crate::extraction::OpenAiExtractor;
use crate::graph::GraphMailClient;
use crate::pipeline::{Collaborators, NotificationProcessor, ProcessorSettings};
use crate::sink::WorkbookRowSink;

/// Application context containing shared dependencies
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub processor: Arc<NotificationProcessor>,
}

impl AppContext {
    pub fn new(config: Arc<Config>, processor: Arc<NotificationProcessor>) -> Self {
        Self { config, processor }
    }

    /// Wire the production collaborators around one HTTP client and one token cache
    pub fn from_config(config: Arc<Config>) -> AppResult<Self> {
        let http = build_http_client(&config.http)?;
        let tokens = build_token_cache(http.clone(), &config.graph);

        let collaborators = Collaborators {
            mail: Arc::new(GraphMailClient::new(
                http.clone(),
                config.graph.api_base.clone(),
                tokens.clone(),
            )),
            ocr: Arc::new(PlaceholderOcr),
            extractor: Arc::new(OpenAiExtractor::new(
                http.clone(),
                &config.extraction,
                Duration::from_secs(config.http.request_timeout_secs),
            )),
            sink: Arc::new(WorkbookRowSink::new(
                http,
                config.graph.api_base.clone(),
                &config.sink,
                tokens,
            )),
            dedup: Arc::new(InMemoryIdempotencyStore::new(
                Duration::from_secs(config.dedup.ttl_secs),
                config.dedup.max_entries,
            )),
        };

        let processor = NotificationProcessor::new(ProcessorSettings::from_config(&config), collaborators);
        Ok(Self::new(config, Arc::new(processor)))
    }
}

/// Shared outbound client with per-call timeouts
pub fn build_http_client(config: &HttpConfig) -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .build()
        .map_err(|e| AppError::internal(format!("failed to build HTTP client: {}", e)))
}

pub fn build_token_cache(http: reqwest::Client, config: &GraphConfig) -> Arc<TokenCache> {
    let provider = ClientCredentialsProvider::new(http, config);
    Arc::new(TokenCache::new(
        Arc::new(provider),
        config.token_expiry_skew_secs,
    ))
}
