// ============================================================================
// Subscription Configuration
// ============================================================================

use crate::constants::*;
use crate::optional_var;

#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Shared secret echoed by the provider in every notification
    pub client_state: String,
    /// Public URL of the webhook endpoint (required only by the subscription job)
    pub notification_url: Option<String>,
    /// Lifetime requested for new or renewed subscriptions
    pub expiration_minutes: i64,
    /// Existing subscription to renew
    pub subscription_id: Option<String>,
}

impl SubscriptionConfig {
    pub(crate) fn from_env() -> anyhow::Result<Self> {
        let client_state = optional_var("SUBSCRIPTION_CLIENT_STATE").ok_or_else(|| {
            anyhow::anyhow!("SUBSCRIPTION_CLIENT_STATE must be set to a non-empty secret")
        })?;

        let requested: i64 = std::env::var("SUBSCRIPTION_EXPIRATION_MINUTES")
            .ok()
            .and_then(|m| m.parse().ok())
            .unwrap_or(DEFAULT_SUBSCRIPTION_MINUTES);

        Ok(Self {
            client_state,
            notification_url: optional_var("NOTIFICATION_URL"),
            expiration_minutes: clamp_expiration_minutes(requested),
            subscription_id: optional_var("SUBSCRIPTION_ID"),
        })
    }
}

/// Keep the requested lifetime within what the provider accepts
pub fn clamp_expiration_minutes(requested: i64) -> i64 {
    if requested > MAX_SUBSCRIPTION_MINUTES {
        tracing::warn!(
            requested,
            max = MAX_SUBSCRIPTION_MINUTES,
            "Subscription lifetime above provider maximum, clamping"
        );
        MAX_SUBSCRIPTION_MINUTES
    } else if requested < 1 {
        DEFAULT_SUBSCRIPTION_MINUTES
    } else {
        requested
    }
}
