// ============================================================================
// Webhook Request Parsing
// ============================================================================
//
// Classifies an inbound request once, up front, into a handshake, a
// notification batch, a malformed request or an unsupported one. Handlers
// branch on the variant and never inspect the raw JSON again.
//
// ============================================================================

use axum::http::Method;
use serde_json::Value;
use std::collections::HashMap;

use crate::graph::Notification;

pub const VALIDATION_TOKEN_PARAM: &str = "validationToken";

#[derive(Debug)]
pub enum WebhookRequest {
    /// Subscription validation: echo the token back as plain text
    Handshake(String),
    Batch(Vec<Notification>),
    Malformed(String),
    Unsupported,
}

impl WebhookRequest {
    pub fn parse(method: &Method, query: &HashMap<String, String>, body: &[u8]) -> Self {
        if *method != Method::GET && *method != Method::POST {
            return WebhookRequest::Unsupported;
        }

        if let Some(token) = query.get(VALIDATION_TOKEN_PARAM) {
            return if token.is_empty() {
                WebhookRequest::Malformed("empty validationToken".to_string())
            } else {
                WebhookRequest::Handshake(token.clone())
            };
        }

        if *method == Method::GET {
            return WebhookRequest::Unsupported;
        }

        Self::parse_body(body)
    }

    fn parse_body(body: &[u8]) -> Self {
        if body.iter().all(u8::is_ascii_whitespace) {
            return WebhookRequest::Malformed("empty body".to_string());
        }

        let value: Value = match serde_json::from_slice(body) {
            Ok(value) => value,
            Err(e) => return WebhookRequest::Malformed(format!("invalid JSON: {}", e)),
        };

        let Value::Object(fields) = value else {
            return WebhookRequest::Malformed("body is not a JSON object".to_string());
        };

        if let Some(Value::String(token)) = fields.get(VALIDATION_TOKEN_PARAM) {
            if !token.is_empty() {
                return WebhookRequest::Handshake(token.clone());
            }
        }

        let Some(Value::Array(items)) = fields.get("value") else {
            return WebhookRequest::Malformed(
                "body is neither a validation handshake nor a notification batch".to_string(),
            );
        };

        if let Some(token) = items.iter().find_map(nested_validation_token) {
            return WebhookRequest::Handshake(token);
        }

        let notifications = items
            .iter()
            .map(|item| {
                serde_json::from_value(item.clone()).unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Batch item is not a notification object");
                    Notification::default()
                })
            })
            .collect();
        WebhookRequest::Batch(notifications)
    }
}

/// First non-empty entry of `validationTokens`
fn nested_validation_token(item: &Value) -> Option<String> {
    item.get("validationTokens")?
        .as_array()?
        .first()?
        .as_str()
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_query() -> HashMap<String, String> {
        HashMap::new()
    }

    fn post(body: &str) -> WebhookRequest {
        WebhookRequest::parse(&Method::POST, &no_query(), body.as_bytes())
    }

    #[test]
    fn test_query_token_handshake_on_get_and_post() {
        let query = HashMap::from([(VALIDATION_TOKEN_PARAM.to_string(), "abc 123".to_string())]);

        for method in [Method::GET, Method::POST] {
            match WebhookRequest::parse(&method, &query, b"") {
                WebhookRequest::Handshake(token) => assert_eq!(token, "abc 123"),
                other => panic!("expected handshake, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_empty_query_token_is_malformed() {
        let query = HashMap::from([(VALIDATION_TOKEN_PARAM.to_string(), String::new())]);
        assert!(matches!(
            WebhookRequest::parse(&Method::GET, &query, b""),
            WebhookRequest::Malformed(_)
        ));
    }

    #[test]
    fn test_get_without_token_is_unsupported() {
        assert!(matches!(
            WebhookRequest::parse(&Method::GET, &no_query(), b""),
            WebhookRequest::Unsupported
        ));
        assert!(matches!(
            WebhookRequest::parse(&Method::PUT, &no_query(), b"{}"),
            WebhookRequest::Unsupported
        ));
    }

    #[test]
    fn test_flat_body_handshake() {
        assert!(matches!(
            post(r#"{"validationToken":"abc123"}"#),
            WebhookRequest::Handshake(t) if t == "abc123"
        ));
    }

    #[test]
    fn test_nested_body_handshake() {
        assert!(matches!(
            post(r#"{"value":[{"validationTokens":["tok-1","tok-2"]}]}"#),
            WebhookRequest::Handshake(t) if t == "tok-1"
        ));
    }

    #[test]
    fn test_batch() {
        let request = post(
            r#"{"value":[{"clientState":"s","resourceData":{"id":"m1"}},{"resourceData":{}},42]}"#,
        );
        let WebhookRequest::Batch(items) = request else {
            panic!("expected batch");
        };
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].message_id(), Some("m1"));
        assert_eq!(items[1].message_id(), None);
        assert_eq!(items[2].message_id(), None);
    }

    #[test]
    fn test_empty_value_list_is_a_batch() {
        assert!(matches!(post(r#"{"value":[]}"#), WebhookRequest::Batch(items) if items.is_empty()));
    }

    #[test]
    fn test_malformed_bodies() {
        for body in ["", "   ", "not json", "[1,2]", r#"{"foo":"bar"}"#, r#"{"value":"x"}"#] {
            assert!(
                matches!(post(body), WebhookRequest::Malformed(_)),
                "body {body:?} should be malformed"
            );
        }
    }
}
