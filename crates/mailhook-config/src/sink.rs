// ============================================================================
// Workbook Sink Configuration
// ============================================================================

use crate::constants::*;
use crate::optional_var;

/// Location of the workbook table that receives one row per message
#[derive(Clone, Debug)]
pub struct SinkConfig {
    /// Drive owner; falls back to the subscribed mailbox
    pub workbook_owner: Option<String>,
    /// Path of the workbook relative to the drive root
    pub workbook_path: String,
    pub table: String,
}

impl SinkConfig {
    pub(crate) fn from_env(mailbox: Option<&str>) -> Self {
        Self {
            workbook_owner: optional_var("WORKBOOK_OWNER").or_else(|| mailbox.map(str::to_string)),
            workbook_path: std::env::var("WORKBOOK_PATH")
                .map(|p| p.trim_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_WORKBOOK_PATH.to_string()),
            table: std::env::var("WORKBOOK_TABLE")
                .unwrap_or_else(|_| DEFAULT_WORKBOOK_TABLE.to_string()),
        }
    }
}
