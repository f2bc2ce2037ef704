// ============================================================================
// Outbound HTTP and Processing Limits
// ============================================================================

use crate::constants::*;

/// Timeouts applied to every outbound call
#[derive(Clone, Debug)]
pub struct HttpConfig {
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl HttpConfig {
    pub(crate) fn from_env() -> Self {
        Self {
            request_timeout_secs: std::env::var("HTTP_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|s| *s > 0)
                .unwrap_or(DEFAULT_HTTP_REQUEST_TIMEOUT_SECS),
            connect_timeout_secs: std::env::var("HTTP_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|s| *s > 0)
                .unwrap_or(DEFAULT_HTTP_CONNECT_TIMEOUT_SECS),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AttachmentConfig {
    /// Decoded attachments above this size are skipped
    pub max_bytes: usize,
}

impl AttachmentConfig {
    pub(crate) fn from_env() -> Self {
        Self {
            max_bytes: std::env::var("MAX_ATTACHMENT_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_ATTACHMENT_BYTES),
        }
    }
}

/// Message id deduplication window
#[derive(Clone, Debug)]
pub struct DedupConfig {
    pub ttl_secs: u64,
    pub max_entries: usize,
}

impl DedupConfig {
    pub(crate) fn from_env() -> Self {
        Self {
            ttl_secs: std::env::var("DEDUP_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_DEDUP_TTL_SECS),
            max_entries: std::env::var("DEDUP_MAX_ENTRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_DEDUP_MAX_ENTRIES),
        }
    }
}
