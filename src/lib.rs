// ============================================================================
// Mailhook Server Library
// ============================================================================
//
// Mail change-notification webhook: validation handshake, per-notification
// pipeline (fetch, attachments, extraction, workbook row) and the
// subscription manager used by the operator job.
//
// ============================================================================

pub mod attachments;
pub mod auth;
pub mod context;
pub mod deduplication;
pub mod extraction;
pub mod graph;
pub mod metrics;
pub mod pipeline;
pub mod routes;
pub mod sink;
pub mod subscription;
pub mod utils;
pub mod webhook;
