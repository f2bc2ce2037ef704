// ============================================================================
// Webhook Route
// ============================================================================
//
// GET/POST {WEBHOOK_PATH}
// - validation token (query or body) -> 200 text/plain echo
// - notification batch -> processed in-request, then 202
// - malformed body -> 400
//
// ============================================================================

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use mailhook_error::AppError;
use std::collections::HashMap;
use std::sync::Arc;

use crate::context::AppContext;
use crate::metrics;
use crate::webhook::WebhookRequest;

pub async fn receive(
    State(app_context): State<Arc<AppContext>>,
    method: Method,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    match WebhookRequest::parse(&method, &query, &body) {
        WebhookRequest::Handshake(token) => {
            metrics::HANDSHAKES_TOTAL.inc();
            tracing::info!(method = %method, "Answering subscription validation handshake");
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/plain")],
                token,
            )
                .into_response()
        }
        WebhookRequest::Batch(notifications) => {
            app_context.processor.process_batch(&notifications).await;
            StatusCode::ACCEPTED.into_response()
        }
        WebhookRequest::Malformed(reason) => {
            tracing::warn!(method = %method, reason = %reason, "Rejecting malformed webhook request");
            AppError::validation(reason).into_response()
        }
        WebhookRequest::Unsupported => {
            tracing::warn!(method = %method, "Unhandled webhook request");
            (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed.").into_response()
        }
    }
}
