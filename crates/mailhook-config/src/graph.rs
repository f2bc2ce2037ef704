// ============================================================================
// Graph Configuration
// ============================================================================

use crate::constants::*;
use crate::optional_var;

/// Identity provider credentials and mail provider endpoints.
///
/// Credentials are optional at load time. A missing value is reported as a
/// configuration error by the component that needs it, so the webhook
/// can still answer handshakes while the app registration is incomplete.
#[derive(Clone, Debug)]
pub struct GraphConfig {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Mailbox whose Inbox is subscribed (user id or UPN)
    pub mailbox: Option<String>,
    pub api_base: String,
    pub authority_base: String,
    pub scope: String,
    /// Tokens are refreshed this many seconds before they expire
    pub token_expiry_skew_secs: i64,
}

impl GraphConfig {
    pub(crate) fn from_env() -> Self {
        Self {
            tenant_id: optional_var("TENANT_ID"),
            client_id: optional_var("CLIENT_ID"),
            client_secret: optional_var("CLIENT_SECRET"),
            mailbox: optional_var("TARGET_MAILBOX"),
            api_base: std::env::var("GRAPH_API_BASE")
                .unwrap_or_else(|_| DEFAULT_GRAPH_API_BASE.to_string()),
            authority_base: std::env::var("GRAPH_AUTHORITY_BASE")
                .unwrap_or_else(|_| DEFAULT_AUTHORITY_BASE.to_string()),
            scope: std::env::var("GRAPH_SCOPE").unwrap_or_else(|_| DEFAULT_GRAPH_SCOPE.to_string()),
            token_expiry_skew_secs: std::env::var("TOKEN_EXPIRY_SKEW_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TOKEN_EXPIRY_SKEW_SECS),
        }
    }

    /// True when all three client-credential values are present
    pub fn has_credentials(&self) -> bool {
        self.tenant_id.is_some() && self.client_id.is_some() && self.client_secret.is_some()
    }
}
