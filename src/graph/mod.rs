// ============================================================================
// Mail Provider (Microsoft Graph)
// ============================================================================
//
// Notification and message types plus the HTTP client for fetching
// messages and attachments. Helpers here are shared with the workbook
// sink and the subscription manager, which talk to the same API.
//
// ============================================================================

pub mod client;
pub mod types;

pub use client::{GraphMailClient, MailClient};
pub use types::{Attachment, EmailAddress, ItemBody, Message, Notification, Recipient, ResourceData};

use mailhook_error::{AppError, AppResult};
use reqwest::Url;
use serde::de::DeserializeOwned;

use crate::utils::redact_body;

/// Build `{base}/{segments...}` with each segment percent-encoded
pub(crate) fn graph_url<I, S>(base: &str, segments: I) -> AppResult<Url>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut url = Url::parse(base)
        .map_err(|e| AppError::config(format!("invalid API base URL {}: {}", base, e)))?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| AppError::config(format!("API base URL cannot be a base: {}", base)))?;
        path.pop_if_empty().extend(segments);
    }
    Ok(url)
}

/// Turn a non-2xx response into `AppError::Upstream` with a redacted body
pub(crate) async fn ensure_success(
    response: reqwest::Response,
    service: &'static str,
) -> AppResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    Err(AppError::upstream(service, status.as_u16(), redact_body(&body)))
}

/// Check the status and decode a JSON body
pub(crate) async fn decode_response<T: DeserializeOwned>(
    response: reqwest::Response,
    service: &'static str,
) -> AppResult<T> {
    let response = ensure_success(response, service).await?;
    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_url_appends_segments() {
        let url = graph_url(
            "https://graph.microsoft.com/v1.0",
            ["users", "ana@example.com", "messages", "AAMk="],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://graph.microsoft.com/v1.0/users/ana@example.com/messages/AAMk="
        );
    }

    #[test]
    fn test_graph_url_handles_trailing_slash_and_encodes() {
        let url = graph_url("http://localhost:9000/v1.0/", ["users", "a/b c"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/v1.0/users/a%2Fb%20c");
    }

    #[test]
    fn test_graph_url_rejects_invalid_base() {
        let err = graph_url("not a url", ["users"]).unwrap_err();
        assert!(err.is_config());
    }
}
