// ============================================================================
// Configuration Constants
// ============================================================================

// Default server values
pub(crate) const DEFAULT_PORT: u16 = 8080;
pub(crate) const DEFAULT_WEBHOOK_PATH: &str = "/webhook";

// Microsoft identity platform and Graph endpoints
pub(crate) const DEFAULT_GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";
pub(crate) const DEFAULT_AUTHORITY_BASE: &str = "https://login.microsoftonline.com";
pub(crate) const DEFAULT_GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";
pub(crate) const DEFAULT_TOKEN_EXPIRY_SKEW_SECS: i64 = 60;

// Extraction service
pub(crate) const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub(crate) const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

// Workbook sink
pub(crate) const DEFAULT_WORKBOOK_PATH: &str = "datos/emails.xlsx";
pub(crate) const DEFAULT_WORKBOOK_TABLE: &str = "Table1";

// Outbound HTTP timeouts (seconds)
pub(crate) const DEFAULT_HTTP_REQUEST_TIMEOUT_SECS: u64 = 30;
pub(crate) const DEFAULT_HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;

// Attachments larger than this are skipped before OCR
pub(crate) const DEFAULT_MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;

// Message id deduplication
pub(crate) const DEFAULT_DEDUP_TTL_SECS: u64 = 86_400;
pub(crate) const DEFAULT_DEDUP_MAX_ENTRIES: usize = 10_000;

// Graph caps mail subscriptions at 4230 minutes (2 days 23 hours 30 minutes)
pub const MAX_SUBSCRIPTION_MINUTES: i64 = 4230;
pub(crate) const DEFAULT_SUBSCRIPTION_MINUTES: i64 = MAX_SUBSCRIPTION_MINUTES;

pub(crate) const PLACEHOLDER_HASH_SALT: &str = "default-salt-please-change";
