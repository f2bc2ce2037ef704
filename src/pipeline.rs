// ============================================================================
// Notification Processor
// ============================================================================
//
// Runs each notification of a batch through:
//
//   clientState -> message id -> claim id -> fetch message
//     -> attachment texts -> structured extraction -> append row
//     -> mark processed (or release the claim on failure)
//
// Notifications are processed one after another. A failing notification is
// logged, counted and skipped; it never aborts the batch. Only configuration
// errors stop the rest of the batch, since they would fail every item alike.
//
// ============================================================================

use mailhook_config::Config;
use mailhook_error::AppError;
use std::fmt;
use std::sync::Arc;

use crate::attachments::{AttachmentExtractor, OcrEngine};
use crate::deduplication::IdempotencyStore;
use crate::extraction::{Row, StructuredExtractor};
use crate::graph::{MailClient, Notification};
use crate::metrics;
use crate::sink::RowSink;
use crate::utils::{log_safe_id, secrets_match};

/// Processing stage at which a notification was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ClientState,
    MissingMessageId,
    Fetch,
    Extraction,
    Sink,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::ClientState => "client_state",
            Stage::MissingMessageId => "missing_message_id",
            Stage::Fetch => "fetch",
            Stage::Extraction => "extraction",
            Stage::Sink => "sink",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of one notification, tagged with its stage
#[derive(Debug, thiserror::Error)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: AppError,
}

impl PipelineError {
    fn new(stage: Stage, source: AppError) -> Self {
        Self { stage, source }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Appended,
    Duplicate,
}

/// Per-batch counters, logged once when the batch is done
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub received: usize,
    pub appended: usize,
    pub duplicates: usize,
    pub skipped: usize,
}

/// Values the processor needs from the configuration
#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    pub client_state: String,
    pub mailbox: Option<String>,
    pub max_attachment_bytes: usize,
    pub hash_salt: String,
}

impl ProcessorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            client_state: config.subscription.client_state.clone(),
            mailbox: config.graph.mailbox.clone(),
            max_attachment_bytes: config.attachments.max_bytes,
            hash_salt: config.logging.hash_salt.clone(),
        }
    }
}

/// External services the pipeline calls
pub struct Collaborators {
    pub mail: Arc<dyn MailClient>,
    pub ocr: Arc<dyn OcrEngine>,
    pub extractor: Arc<dyn StructuredExtractor>,
    pub sink: Arc<dyn RowSink>,
    pub dedup: Arc<dyn IdempotencyStore>,
}

pub struct NotificationProcessor {
    settings: ProcessorSettings,
    mail: Arc<dyn MailClient>,
    attachments: AttachmentExtractor,
    extractor: Arc<dyn StructuredExtractor>,
    sink: Arc<dyn RowSink>,
    dedup: Arc<dyn IdempotencyStore>,
}

impl NotificationProcessor {
    pub fn new(settings: ProcessorSettings, collaborators: Collaborators) -> Self {
        let attachments = AttachmentExtractor::new(
            collaborators.mail.clone(),
            collaborators.ocr,
            settings.max_attachment_bytes,
        );

        Self {
            settings,
            mail: collaborators.mail,
            attachments,
            extractor: collaborators.extractor,
            sink: collaborators.sink,
            dedup: collaborators.dedup,
        }
    }

    pub async fn process_batch(&self, notifications: &[Notification]) -> BatchReport {
        let mut report = BatchReport {
            received: notifications.len(),
            ..Default::default()
        };
        metrics::NOTIFICATIONS_RECEIVED_TOTAL.inc_by(notifications.len() as u64);

        let Some(mailbox) = self.settings.mailbox.as_deref() else {
            tracing::error!(
                count = notifications.len(),
                "TARGET_MAILBOX is not configured, skipping notification batch"
            );
            report.skipped = notifications.len();
            return report;
        };

        for (index, notification) in notifications.iter().enumerate() {
            match self.process_notification(mailbox, notification).await {
                Ok(Outcome::Appended) => report.appended += 1,
                Ok(Outcome::Duplicate) => report.duplicates += 1,
                Err(e) => {
                    report.skipped += 1;
                    metrics::NOTIFICATIONS_SKIPPED_TOTAL
                        .with_label_values(&[e.stage.as_str()])
                        .inc();

                    if e.source.is_config() {
                        let remaining = notifications.len() - index - 1;
                        tracing::error!(
                            error = %e.source,
                            stage = %e.stage,
                            remaining,
                            "Configuration error, skipping the rest of the batch"
                        );
                        report.skipped += remaining;
                        metrics::NOTIFICATIONS_SKIPPED_TOTAL
                            .with_label_values(&[e.stage.as_str()])
                            .inc_by(remaining as u64);
                        break;
                    }
                }
            }
        }

        tracing::info!(
            received = report.received,
            appended = report.appended,
            duplicates = report.duplicates,
            skipped = report.skipped,
            mailbox = %log_safe_id(mailbox, &self.settings.hash_salt),
            "Notification batch processed"
        );
        report
    }

    /// Run one notification through every stage
    ///
    /// Failures are logged here, so callers only need to count them.
    pub async fn process_notification(
        &self,
        mailbox: &str,
        notification: &Notification,
    ) -> Result<Outcome, PipelineError> {
        let result = self.run_stages(mailbox, notification).await;

        if let Err(e) = &result {
            let message_id = notification.message_id().unwrap_or("<none>");
            match e.stage {
                Stage::ClientState | Stage::MissingMessageId => tracing::warn!(
                    error = %e.source,
                    stage = %e.stage,
                    subscription_id = notification.subscription_id.as_deref().unwrap_or("<none>"),
                    "Notification rejected"
                ),
                _ => tracing::error!(
                    error = %e.source,
                    error_code = e.source.error_code(),
                    stage = %e.stage,
                    message_id = %message_id,
                    "Notification skipped"
                ),
            }
        }
        result
    }

    async fn run_stages(
        &self,
        mailbox: &str,
        notification: &Notification,
    ) -> Result<Outcome, PipelineError> {
        self.verify_client_state(notification)?;

        let message_id = notification.message_id().ok_or_else(|| {
            PipelineError::new(
                Stage::MissingMessageId,
                AppError::validation("notification has no resourceData.id"),
            )
        })?;

        // Claimed before fetching, so an overlapping redelivery sees it in flight
        let claimed = match self.dedup.try_claim(message_id).await {
            Ok(true) => true,
            Ok(false) => {
                tracing::info!(
                    message_id = %message_id,
                    "Duplicate notification, row already appended or in progress"
                );
                metrics::DUPLICATES_SUPPRESSED_TOTAL.inc();
                return Ok(Outcome::Duplicate);
            }
            Err(e) => {
                tracing::warn!(error = %e, message_id = %message_id, "Idempotency check failed, processing anyway");
                false
            }
        };

        let result = self.append_row(mailbox, notification, message_id).await;

        let settled = match &result {
            Ok(_) => self.dedup.mark_processed(message_id).await,
            Err(_) if claimed => self.dedup.release(message_id).await,
            Err(_) => Ok(()),
        };
        if let Err(e) = settled {
            tracing::warn!(error = %e, message_id = %message_id, "Failed to update idempotency store");
        }

        result.map(|()| Outcome::Appended)
    }

    async fn append_row(
        &self,
        mailbox: &str,
        notification: &Notification,
        message_id: &str,
    ) -> Result<(), PipelineError> {
        let message = self
            .mail
            .fetch_message(mailbox, message_id)
            .await
            .map_err(|e| PipelineError::new(Stage::Fetch, e))?;

        let attachment_texts = self.attachments.extract(mailbox, &message).await;

        let record = self
            .extractor
            .extract(message.body_text(), &attachment_texts)
            .await
            .map_err(|e| PipelineError::new(Stage::Extraction, e))?;

        let row = Row::from(&record);
        self.sink
            .append(&row)
            .await
            .map_err(|e| PipelineError::new(Stage::Sink, e))?;
        metrics::ROWS_APPENDED_TOTAL.inc();

        tracing::info!(
            message_id = %message_id,
            attachments = attachment_texts.len(),
            sender = %notification
                .sender_address()
                .map(|address| log_safe_id(address, &self.settings.hash_salt))
                .unwrap_or_default(),
            "Row appended"
        );
        Ok(())
    }

    fn verify_client_state(&self, notification: &Notification) -> Result<(), PipelineError> {
        match notification.client_state.as_deref() {
            Some(received) if secrets_match(received, &self.settings.client_state) => Ok(()),
            Some(_) => Err(PipelineError::new(
                Stage::ClientState,
                AppError::validation("clientState does not match"),
            )),
            None => Err(PipelineError::new(
                Stage::ClientState,
                AppError::validation("clientState is missing"),
            )),
        }
    }
}
