// ============================================================================
// Logging Configuration
// ============================================================================

use crate::constants::PLACEHOLDER_HASH_SALT;

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// Salt for hashing mailbox and sender addresses before they are logged
    pub hash_salt: String,
}

impl LoggingConfig {
    pub(crate) fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            hash_salt: {
                let salt = std::env::var("LOG_HASH_SALT")
                    .unwrap_or_else(|_| PLACEHOLDER_HASH_SALT.to_string());
                if salt.is_empty() || salt == PLACEHOLDER_HASH_SALT {
                    anyhow::bail!("LOG_HASH_SALT must be set to a unique, secret value");
                }
                salt
            },
        })
    }
}
