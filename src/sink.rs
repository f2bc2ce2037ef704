//! Row sink: appends extracted rows to a workbook table

use async_trait::async_trait;
use mailhook_config::SinkConfig;
use mailhook_error::{AppError, AppResult};
use reqwest::StatusCode;
use std::sync::Arc;

use crate::auth::TokenCache;
use crate::extraction::Row;
use crate::graph::{ensure_success, graph_url};

#[async_trait]
pub trait RowSink: Send + Sync {
    async fn append(&self, row: &Row) -> AppResult<()>;
}

/// Appends rows through the workbook `rows/add` endpoint
pub struct WorkbookRowSink {
    http: reqwest::Client,
    api_base: String,
    owner: Option<String>,
    path: String,
    table: String,
    tokens: Arc<TokenCache>,
}

impl WorkbookRowSink {
    pub fn new(
        http: reqwest::Client,
        api_base: impl Into<String>,
        config: &SinkConfig,
        tokens: Arc<TokenCache>,
    ) -> Self {
        Self {
            http,
            api_base: api_base.into(),
            owner: config.workbook_owner.clone(),
            path: config.workbook_path.clone(),
            table: config.table.clone(),
            tokens,
        }
    }

    /// `{base}/users/{owner}/drive/root:/{path}:/workbook/tables/{table}/rows/add`
    fn rows_add_url(&self) -> AppResult<reqwest::Url> {
        let owner = self
            .owner
            .as_deref()
            .ok_or_else(|| AppError::config("WORKBOOK_OWNER or TARGET_MAILBOX must be set"))?;

        let mut path_parts: Vec<String> = self
            .path
            .split('/')
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect();
        match path_parts.last_mut() {
            Some(last) => last.push(':'),
            None => return Err(AppError::config("WORKBOOK_PATH is empty")),
        }

        let mut segments = vec![
            "users".to_string(),
            owner.to_string(),
            "drive".to_string(),
            "root:".to_string(),
        ];
        segments.extend(path_parts);
        segments.extend(
            ["workbook", "tables", self.table.as_str(), "rows", "add"].map(str::to_string),
        );

        graph_url(&self.api_base, segments)
    }
}

#[async_trait]
impl RowSink for WorkbookRowSink {
    async fn append(&self, row: &Row) -> AppResult<()> {
        let url = self.rows_add_url()?;
        let token = self.tokens.access_token().await?;

        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&row.to_payload())
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate().await;
        }
        ensure_success(response, "workbook").await?;
        Ok(())
    }
}
