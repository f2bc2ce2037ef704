use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

const REDACTED_BODY_MAX_LEN: usize = 200;

/// Salted, truncated hash of a mailbox or sender address for logging.
///
/// The same address always maps to the same 8 hex characters for a given
/// salt, so log lines can be correlated without recording the address.
pub fn log_safe_id(id: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(id.to_lowercase().as_bytes());
    hex::encode(&hasher.finalize()[..4])
}

/// Trim an upstream response body to a loggable size
pub fn redact_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= REDACTED_BODY_MAX_LEN {
        return trimmed.to_string();
    }

    let mut end = REDACTED_BODY_MAX_LEN;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!(
        "{}...[truncated {} bytes]",
        &trimmed[..end],
        trimmed.len() - end
    )
}

/// Constant-time comparison of a received shared secret
pub fn secrets_match(received: &str, expected: &str) -> bool {
    received.as_bytes().ct_eq(expected.as_bytes()).into()
}
