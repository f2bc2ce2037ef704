use serde::{Deserialize, Serialize};

/// One change notification from a webhook batch
///
/// Every field is optional so a partially shaped item still deserializes
/// and can be rejected individually by the pipeline.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub subscription_id: Option<String>,
    pub change_type: Option<String>,
    pub resource: Option<String>,
    pub client_state: Option<String>,
    pub resource_data: Option<ResourceData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceData {
    pub id: Option<String>,
    #[serde(rename = "@odata.type")]
    pub odata_type: Option<String>,
    pub from: Option<Recipient>,
}

impl Notification {
    /// Message id from `resourceData.id`, if present and non-blank
    pub fn message_id(&self) -> Option<&str> {
        self.resource_data
            .as_ref()
            .and_then(|data| data.id.as_deref())
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Sender address, when the provider includes it in the notification
    pub fn sender_address(&self) -> Option<&str> {
        self.resource_data
            .as_ref()
            .and_then(|data| data.from.as_ref())
            .and_then(Recipient::address)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub email_address: Option<EmailAddress>,
}

impl Recipient {
    pub fn address(&self) -> Option<&str> {
        self.email_address
            .as_ref()
            .and_then(|email| email.address.as_deref())
            .filter(|address| !address.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EmailAddress {
    pub name: Option<String>,
    pub address: Option<String>,
}

/// Mail message as returned by the provider
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: Option<ItemBody>,
    #[serde(default)]
    pub has_attachments: bool,
    #[serde(default)]
    pub from: Option<Recipient>,
}

impl Message {
    /// Body content, or an empty string when the message has no body
    pub fn body_text(&self) -> &str {
        self.body
            .as_ref()
            .and_then(|body| body.content.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemBody {
    pub content_type: Option<String>,
    pub content: Option<String>,
}

/// File attachment with its base64-encoded payload
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(rename = "@odata.type")]
    pub odata_type: Option<String>,
    pub name: Option<String>,
    pub content_type: Option<String>,
    pub size: Option<u64>,
    pub content_bytes: Option<String>,
}

impl Attachment {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("N/A")
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AttachmentPage {
    #[serde(default)]
    pub value: Vec<Attachment>,
}
