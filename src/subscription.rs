// ============================================================================
// Subscription Manager
// ============================================================================
//
// Creates or renews the mail provider subscription that delivers "message
// created" notifications to the webhook. Runs from the subscription-manager
// binary, never on the request path.
//
// ============================================================================

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use mailhook_config::{SubscriptionConfig, clamp_expiration_minutes};
use mailhook_error::{AppError, AppResult};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::TokenCache;
use crate::graph::{decode_response, graph_url};

const SERVICE: &str = "subscriptions";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: String,
    pub resource: String,
    pub notification_url: String,
    pub expiration: DateTime<Utc>,
    pub client_state: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSubscriptionRequest<'a> {
    change_type: &'a str,
    notification_url: &'a str,
    resource: &'a str,
    expiration_date_time: String,
    client_state: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RenewSubscriptionRequest {
    expiration_date_time: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionResponse {
    id: String,
    #[serde(default)]
    resource: Option<String>,
    #[serde(default)]
    notification_url: Option<String>,
    expiration_date_time: DateTime<Utc>,
    #[serde(default)]
    client_state: Option<String>,
}

/// Inbox message resource for a mailbox
pub fn inbox_resource(mailbox: &str) -> String {
    format!("/users/{}/mailFolders('Inbox')/messages", mailbox)
}

pub struct SubscriptionManager {
    http: reqwest::Client,
    api_base: String,
    tokens: Arc<TokenCache>,
    client_state: String,
    expiration_minutes: i64,
}

impl SubscriptionManager {
    pub fn new(
        http: reqwest::Client,
        api_base: impl Into<String>,
        tokens: Arc<TokenCache>,
        config: &SubscriptionConfig,
    ) -> Self {
        Self {
            http,
            api_base: api_base.into(),
            tokens,
            client_state: config.client_state.clone(),
            expiration_minutes: clamp_expiration_minutes(config.expiration_minutes),
        }
    }

    /// Expiration timestamp for a subscription created or renewed at `now`
    pub fn expiration_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::minutes(self.expiration_minutes)
    }

    /// Renew `existing_id` when given, creating a new subscription if it is gone
    pub async fn create_or_renew(
        &self,
        target: &str,
        notification_url: &str,
        existing_id: Option<&str>,
    ) -> AppResult<Subscription> {
        if let Some(id) = existing_id.filter(|id| !id.is_empty()) {
            match self.renew(id, target, notification_url).await? {
                Some(subscription) => return Ok(subscription),
                None => tracing::warn!(
                    subscription_id = %id,
                    "Subscription not found, creating a new one"
                ),
            }
        }
        self.create(target, notification_url).await
    }

    pub async fn create(&self, target: &str, notification_url: &str) -> AppResult<Subscription> {
        if notification_url.is_empty() {
            return Err(AppError::config("NOTIFICATION_URL is required to create a subscription"));
        }

        let resource = inbox_resource(target);
        let request = CreateSubscriptionRequest {
            change_type: "created",
            notification_url,
            resource: &resource,
            expiration_date_time: format_expiration(self.expiration_from(Utc::now())),
            client_state: &self.client_state,
        };

        let url = graph_url(&self.api_base, ["subscriptions"])?;
        let token = self.tokens.access_token().await?;
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;

        let created: SubscriptionResponse = decode_response(response, SERVICE).await?;
        tracing::info!(
            subscription_id = %created.id,
            expiration = %created.expiration_date_time,
            "Subscription created"
        );
        Ok(self.build_subscription(created, &resource, notification_url))
    }

    /// Extend an existing subscription; `Ok(None)` when the provider no longer knows it
    pub async fn renew(
        &self,
        subscription_id: &str,
        target: &str,
        notification_url: &str,
    ) -> AppResult<Option<Subscription>> {
        let request = RenewSubscriptionRequest {
            expiration_date_time: format_expiration(self.expiration_from(Utc::now())),
        };

        let url = graph_url(&self.api_base, ["subscriptions", subscription_id])?;
        let token = self.tokens.access_token().await?;
        let response = self
            .http
            .patch(url)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let renewed: SubscriptionResponse = decode_response(response, SERVICE).await?;
        tracing::info!(
            subscription_id = %renewed.id,
            expiration = %renewed.expiration_date_time,
            "Subscription renewed"
        );
        Ok(Some(self.build_subscription(
            renewed,
            &inbox_resource(target),
            notification_url,
        )))
    }

    fn build_subscription(
        &self,
        response: SubscriptionResponse,
        resource: &str,
        notification_url: &str,
    ) -> Subscription {
        Subscription {
            id: response.id,
            resource: response.resource.unwrap_or_else(|| resource.to_string()),
            notification_url: response
                .notification_url
                .unwrap_or_else(|| notification_url.to_string()),
            expiration: response.expiration_date_time,
            client_state: response
                .client_state
                .unwrap_or_else(|| self.client_state.clone()),
        }
    }
}

fn format_expiration(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
