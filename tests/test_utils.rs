#![allow(dead_code)]

use async_trait::async_trait;
use mailhook_config::Config;
use mailhook_error::{AppError, AppResult};
use mailhook_server::{
    attachments::PlaceholderOcr,
    context::AppContext,
    deduplication::InMemoryIdempotencyStore,
    extraction::{CanonicalRecord, Row, StructuredExtractor},
    graph::{Attachment, ItemBody, MailClient, Message},
    pipeline::{Collaborators, NotificationProcessor, ProcessorSettings},
    routes::create_router,
    sink::RowSink,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tokio::net::TcpListener;

pub const CLIENT_STATE: &str = "test-client-state";
pub const MAILBOX: &str = "inbox@example.com";

static ENV: Once = Once::new();

/// Configuration for tests, loaded from the environment with test secrets
pub fn test_config() -> Config {
    ENV.call_once(|| unsafe {
        std::env::set_var("SUBSCRIPTION_CLIENT_STATE", CLIENT_STATE);
        std::env::set_var("LOG_HASH_SALT", "integration-test-salt");
    });

    let mut config = Config::from_env().expect("Failed to read config");
    config.subscription.client_state = CLIENT_STATE.to_string();
    config.graph.mailbox = Some(MAILBOX.to_string());
    config.webhook_path = "/webhook".to_string();
    config
}

// ===== Fake collaborators =====

/// Serves messages from a map; unknown ids fail like a provider 404
#[derive(Default)]
pub struct FakeMailClient {
    messages: Mutex<HashMap<String, Message>>,
    attachments: Mutex<HashMap<String, Vec<Attachment>>>,
    pub message_fetches: AtomicUsize,
}

impl FakeMailClient {
    pub fn with_message(&self, id: &str, body: &str, attachments: Vec<Attachment>) {
        let message = Message {
            id: id.to_string(),
            subject: Some("Solicitud".to_string()),
            body: Some(ItemBody {
                content_type: Some("text".to_string()),
                content: Some(body.to_string()),
            }),
            has_attachments: !attachments.is_empty(),
            from: None,
        };
        self.messages.lock().unwrap().insert(id.to_string(), message);
        self.attachments
            .lock()
            .unwrap()
            .insert(id.to_string(), attachments);
    }

    pub fn fetches(&self) -> usize {
        self.message_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MailClient for FakeMailClient {
    async fn fetch_message(&self, _mailbox: &str, message_id: &str) -> AppResult<Message> {
        self.message_fetches.fetch_add(1, Ordering::SeqCst);
        self.messages
            .lock()
            .unwrap()
            .get(message_id)
            .cloned()
            .ok_or_else(|| AppError::upstream("mail provider", 404, "ErrorItemNotFound"))
    }

    async fn fetch_attachments(
        &self,
        _mailbox: &str,
        message_id: &str,
    ) -> AppResult<Vec<Attachment>> {
        Ok(self
            .attachments
            .lock()
            .unwrap()
            .get(message_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Returns a canned model reply and records what it was asked
pub struct FakeExtractor {
    pub reply: Mutex<String>,
    pub calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeExtractor {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: Mutex::new(reply.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl StructuredExtractor for FakeExtractor {
    async fn extract(&self, body: &str, attachment_texts: &[String]) -> AppResult<CanonicalRecord> {
        self.calls
            .lock()
            .unwrap()
            .push((body.to_string(), attachment_texts.to_vec()));
        let reply = self.reply.lock().unwrap().clone();
        CanonicalRecord::from_model_output(&reply, body)
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub rows: Mutex<Vec<Row>>,
}

impl RecordingSink {
    pub fn rows(&self) -> Vec<Row> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl RowSink for RecordingSink {
    async fn append(&self, row: &Row) -> AppResult<()> {
        self.rows.lock().unwrap().push(row.clone());
        Ok(())
    }
}

// ===== Test server =====

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    pub mail: Arc<FakeMailClient>,
    pub extractor: Arc<FakeExtractor>,
    pub sink: Arc<RecordingSink>,
}

impl TestApp {
    pub fn webhook_url(&self) -> String {
        format!("http://{}/webhook", self.address)
    }

    pub async fn post_webhook(&self, body: &str) -> reqwest::Response {
        self.client
            .post(self.webhook_url())
            .header("Content-Type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .expect("Failed to send request")
    }
}

pub const DEFAULT_REPLY: &str =
    r#"{"nombre":"Ana","cedula":"123","texto_original":"hola","adjuntos":[]}"#;

pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config(), DEFAULT_REPLY).await
}

pub async fn spawn_app_with(config: Config, reply: &str) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let address = format!("127.0.0.1:{}", port);

    let mail = Arc::new(FakeMailClient::default());
    let extractor = Arc::new(FakeExtractor::new(reply));
    let sink = Arc::new(RecordingSink::default());

    let config = Arc::new(config);
    let processor = NotificationProcessor::new(
        ProcessorSettings::from_config(&config),
        Collaborators {
            mail: mail.clone(),
            ocr: Arc::new(PlaceholderOcr),
            extractor: extractor.clone(),
            sink: sink.clone(),
            dedup: Arc::new(InMemoryIdempotencyStore::new(Duration::from_secs(60), 100)),
        },
    );
    let app_context = Arc::new(AppContext::new(config, Arc::new(processor)));

    let app = create_router(app_context);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        client: reqwest::Client::new(),
        mail,
        extractor,
        sink,
    }
}
