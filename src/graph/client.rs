use async_trait::async_trait;
use mailhook_error::AppResult;
use reqwest::StatusCode;
use std::sync::Arc;

use super::types::{Attachment, AttachmentPage, Message};
use super::{decode_response, graph_url};
use crate::auth::TokenCache;

const MESSAGE_SELECT_FIELDS: &str = "id,subject,body,hasAttachments,from";
const SERVICE: &str = "mail provider";

/// Mail provider operations used by the notification pipeline
#[async_trait]
pub trait MailClient: Send + Sync {
    async fn fetch_message(&self, mailbox: &str, message_id: &str) -> AppResult<Message>;

    async fn fetch_attachments(&self, mailbox: &str, message_id: &str)
    -> AppResult<Vec<Attachment>>;
}

/// Graph REST client for one mailbox's messages
pub struct GraphMailClient {
    http: reqwest::Client,
    api_base: String,
    tokens: Arc<TokenCache>,
}

impl GraphMailClient {
    pub fn new(http: reqwest::Client, api_base: impl Into<String>, tokens: Arc<TokenCache>) -> Self {
        Self {
            http,
            api_base: api_base.into(),
            tokens,
        }
    }

    async fn get(&self, url: reqwest::Url) -> AppResult<reqwest::Response> {
        let token = self.tokens.access_token().await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .header("accept", "application/json")
            // Plain text bodies are easier for the extraction prompt than HTML
            .header("Prefer", "outlook.body-content-type=\"text\"")
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate().await;
        }
        Ok(response)
    }
}

#[async_trait]
impl MailClient for GraphMailClient {
    async fn fetch_message(&self, mailbox: &str, message_id: &str) -> AppResult<Message> {
        let mut url = graph_url(&self.api_base, ["users", mailbox, "messages", message_id])?;
        url.query_pairs_mut()
            .append_pair("$select", MESSAGE_SELECT_FIELDS);

        let response = self.get(url).await?;
        decode_response(response, SERVICE).await
    }

    async fn fetch_attachments(
        &self,
        mailbox: &str,
        message_id: &str,
    ) -> AppResult<Vec<Attachment>> {
        let url = graph_url(
            &self.api_base,
            ["users", mailbox, "messages", message_id, "attachments"],
        )?;

        let response = self.get(url).await?;
        let page: AttachmentPage = decode_response(response, SERVICE).await?;
        Ok(page.value)
    }
}
