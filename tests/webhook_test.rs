// ============================================================================
// Webhook Endpoint Tests
// ============================================================================
//
// Tests for:
// - Validation handshake (query, flat body, nested body)
// - Malformed requests and unsupported methods
// - Notification batches with fake collaborators
// - clientState verification and duplicate suppression
//
// ============================================================================

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use mailhook_server::graph::Attachment;
use serde_json::json;

mod test_utils;
use test_utils::{CLIENT_STATE, spawn_app, spawn_app_with, test_config};

fn notification(message_id: &str) -> serde_json::Value {
    json!({
        "subscriptionId": "sub-1",
        "changeType": "created",
        "clientState": CLIENT_STATE,
        "resource": format!("Users/u1/Messages/{}", message_id),
        "resourceData": { "@odata.type": "#Microsoft.Graph.Message", "id": message_id }
    })
}

fn batch(items: Vec<serde_json::Value>) -> String {
    json!({ "value": items }).to_string()
}

fn cells(row: &mailhook_server::extraction::Row) -> Vec<String> {
    row.cells().to_vec()
}

// ===== Handshake =====

#[tokio::test]
async fn test_query_handshake_echoes_token() {
    let app = spawn_app().await;

    for method in [reqwest::Method::GET, reqwest::Method::POST] {
        let response = app
            .client
            .request(method, app.webhook_url())
            .query(&[("validationToken", "Validation: Token+123 ")])
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(
            response.headers()["content-type"].to_str().unwrap(),
            "text/plain"
        );
        assert_eq!(response.text().await.unwrap(), "Validation: Token+123 ");
    }
}

#[tokio::test]
async fn test_flat_body_handshake() {
    let app = spawn_app().await;

    let response = app.post_webhook(r#"{"validationToken":"abc123"}"#).await;

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/plain"
    );
    assert_eq!(response.text().await.unwrap(), "abc123");
}

#[tokio::test]
async fn test_nested_body_handshake() {
    let app = spawn_app().await;

    let response = app
        .post_webhook(r#"{"value":[{"validationTokens":["nested-token"]}]}"#)
        .await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "nested-token");
    assert_eq!(app.mail.fetches(), 0);
}

// ===== Malformed / unsupported =====

#[tokio::test]
async fn test_malformed_bodies_are_rejected() {
    let app = spawn_app().await;

    for body in ["", "not json", r#"{"hello":"world"}"#, "[]"] {
        let response = app.post_webhook(body).await;
        assert_eq!(response.status(), 400, "body {:?}", body);
    }
}

#[tokio::test]
async fn test_unsupported_methods() {
    let app = spawn_app().await;

    let response = app.client.get(app.webhook_url()).send().await.unwrap();
    assert_eq!(response.status(), 405);

    for method in [reqwest::Method::PUT, reqwest::Method::DELETE] {
        let response = app
            .client
            .request(method, app.webhook_url())
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 405);
    }
}

// ===== Notification batches =====

#[tokio::test]
async fn test_fetch_failure_yields_202_and_no_rows() {
    let app = spawn_app().await;

    let response = app.post_webhook(&batch(vec![notification("m1")])).await;

    assert_eq!(response.status(), 202);
    assert_eq!(app.mail.fetches(), 1);
    assert!(app.sink.rows().is_empty());
}

#[tokio::test]
async fn test_successful_notification_appends_row() {
    let app = spawn_app().await;
    app.mail.with_message("m1", "hola", vec![]);

    let response = app.post_webhook(&batch(vec![notification("m1")])).await;

    assert_eq!(response.status(), 202);
    let rows = app.sink.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(cells(&rows[0]), vec!["Ana", "123", "hola", ""]);
}

#[tokio::test]
async fn test_mixed_batch_counts_only_successes() {
    let app = spawn_app().await;
    app.mail.with_message("ok-1", "uno", vec![]);
    app.mail.with_message("ok-2", "dos", vec![]);

    let mut wrong_state = notification("ok-2");
    wrong_state["clientState"] = json!("forged");

    let response = app
        .post_webhook(&batch(vec![
            notification("missing"),
            json!({ "clientState": CLIENT_STATE, "resourceData": {} }),
            notification("ok-1"),
            wrong_state,
            json!("not an object"),
            notification("ok-2"),
        ]))
        .await;

    assert_eq!(response.status(), 202);
    assert_eq!(app.sink.rows().len(), 2);
    // Only "missing", "ok-1" and "ok-2" reach the fetcher
    assert_eq!(app.mail.fetches(), 3);
}

#[tokio::test]
async fn test_redelivery_is_not_appended_twice() {
    let app = spawn_app().await;
    app.mail.with_message("m1", "hola", vec![]);
    let body = batch(vec![notification("m1")]);

    assert_eq!(app.post_webhook(&body).await.status(), 202);
    assert_eq!(app.post_webhook(&body).await.status(), 202);

    assert_eq!(app.sink.rows().len(), 1);
    assert_eq!(app.mail.fetches(), 1);
}

#[tokio::test]
async fn test_adjuntos_string_yields_empty_cell() {
    let app = spawn_app_with(
        test_config(),
        r#"{"nombre":"Ana","cedula":"123","texto_original":"hola","adjuntos":"texto"}"#,
    )
    .await;
    app.mail.with_message("m1", "hola", vec![]);

    let response = app.post_webhook(&batch(vec![notification("m1")])).await;

    assert_eq!(response.status(), 202);
    assert_eq!(cells(&app.sink.rows()[0]), vec!["Ana", "123", "hola", ""]);
}

#[tokio::test]
async fn test_unparseable_model_output_skips_notification() {
    let app = spawn_app_with(test_config(), "Lo siento, no puedo ayudar").await;
    app.mail.with_message("m1", "hola", vec![]);

    let response = app.post_webhook(&batch(vec![notification("m1")])).await;

    assert_eq!(response.status(), 202);
    assert!(app.sink.rows().is_empty());
}

#[tokio::test]
async fn test_bad_attachment_does_not_abort_message() {
    let app = spawn_app().await;
    app.mail.with_message(
        "m1",
        "ver adjuntos",
        vec![
            Attachment {
                name: Some("empty.pdf".into()),
                content_bytes: None,
                ..Default::default()
            },
            Attachment {
                name: Some("broken.png".into()),
                content_bytes: Some("***".into()),
                ..Default::default()
            },
            Attachment {
                name: Some("scan.png".into()),
                content_type: Some("image/png".into()),
                content_bytes: Some(BASE64.encode(b"fake image")),
                ..Default::default()
            },
        ],
    );

    let response = app.post_webhook(&batch(vec![notification("m1")])).await;

    assert_eq!(response.status(), 202);
    assert_eq!(app.sink.rows().len(), 1);

    let calls = app.extractor.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "ver adjuntos");
    assert_eq!(calls[0].1.len(), 1);
}

#[tokio::test]
async fn test_missing_mailbox_skips_batch_but_answers_202() {
    let mut config = test_config();
    config.graph.mailbox = None;
    let app = spawn_app_with(config, test_utils::DEFAULT_REPLY).await;
    app.mail.with_message("m1", "hola", vec![]);

    let response = app.post_webhook(&batch(vec![notification("m1")])).await;

    assert_eq!(response.status(), 202);
    assert_eq!(app.mail.fetches(), 0);
    assert!(app.sink.rows().is_empty());
}

// ===== Health and metrics =====

#[tokio::test]
async fn test_health_and_metrics() {
    let app = spawn_app().await;

    let health: serde_json::Value = app
        .client
        .get(format!("http://{}/health", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health, json!({ "status": "ok" }));

    app.post_webhook(r#"{"validationToken":"t"}"#).await;
    let metrics = app
        .client
        .get(format!("http://{}/metrics", app.address))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains("mailhook_handshakes_total"));
}
