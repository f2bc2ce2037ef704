//! Prometheus metrics for the webhook service

use anyhow::Result;
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, IntCounter, IntCounterVec, TextEncoder, opts, register_int_counter,
    register_int_counter_vec,
};

pub static HANDSHAKES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "mailhook_handshakes_total",
        "Subscription validation handshakes answered"
    ))
    .expect("Failed to register HANDSHAKES_TOTAL metric")
});

pub static NOTIFICATIONS_RECEIVED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "mailhook_notifications_received_total",
        "Notifications received in webhook batches"
    ))
    .expect("Failed to register NOTIFICATIONS_RECEIVED_TOTAL metric")
});

pub static ROWS_APPENDED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "mailhook_rows_appended_total",
        "Rows appended to the workbook table"
    ))
    .expect("Failed to register ROWS_APPENDED_TOTAL metric")
});

/// Notifications skipped, labelled by the stage that failed
pub static NOTIFICATIONS_SKIPPED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "mailhook_notifications_skipped_total",
            "Notifications skipped because a processing stage failed"
        ),
        &["stage"]
    )
    .expect("Failed to register NOTIFICATIONS_SKIPPED_TOTAL metric")
});

pub static DUPLICATES_SUPPRESSED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "mailhook_duplicates_suppressed_total",
        "Redelivered notifications for messages already appended"
    ))
    .expect("Failed to register DUPLICATES_SUPPRESSED_TOTAL metric")
});

pub static TOKEN_REFRESHES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "mailhook_token_refreshes_total",
        "Access tokens requested from the identity provider"
    ))
    .expect("Failed to register TOKEN_REFRESHES_TOTAL metric")
});

pub fn gather_metrics() -> Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode(&metric_families, &mut buffer)?;

    Ok(String::from_utf8(buffer)?)
}
