//! Mailbox attachments and the host capability that produces them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One attachment of the open mail item. `file_base64` is resolved lazily —
/// the host enumerates metadata cheaply and content is fetched per item.
/// Once content is present the value is immutable; the hand-off channel
/// copies it, never mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_base64: Option<String>,
}

impl Attachment {
    /// Lower-cased extension of the attachment name, `unknown` when absent.
    #[must_use]
    pub fn extension(&self) -> String {
        self.name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Encoded payload size, used when picking a hand-off backend.
    #[must_use]
    pub fn payload_bytes(&self) -> usize {
        self.file_base64.as_ref().map_or(0, String::len)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttachmentSourceError {
    #[error("mailbox_unavailable")]
    MailboxUnavailable,
    #[error("attachment_content_failed:{id}:{message}")]
    Content { id: String, message: String },
}

/// Host mailbox surface: attachment enumeration plus per-item base64 content.
#[async_trait]
pub trait AttachmentSource: Send + Sync {
    async fn list(&self) -> Result<Vec<Attachment>, AttachmentSourceError>;
    async fn content(&self, id: &str) -> Result<String, AttachmentSourceError>;
}

/// Copies every listed attachment and fills in its content. A single host
/// failure fails the whole resolution; the caller resets its dialog guard.
pub async fn resolve_contents(
    source: &dyn AttachmentSource,
) -> Result<Vec<Attachment>, AttachmentSourceError> {
    let listed = source.list().await?;
    let mut resolved = Vec::with_capacity(listed.len());
    for attachment in listed {
        let content = source.content(&attachment.id).await?;
        resolved.push(Attachment {
            file_base64: Some(content),
            ..attachment
        });
    }
    tracing::debug!(
        target: "voucherpilot.attachments",
        count = resolved.len(),
        "resolved attachment contents",
    );
    Ok(resolved)
}

/// Panel default filter: PDFs only, with a show-all escape hatch upstream.
#[must_use]
pub fn filter_pdf_only(attachments: &[Attachment]) -> Vec<Attachment> {
    attachments
        .iter()
        .filter(|attachment| attachment.name.to_ascii_lowercase().ends_with(".pdf"))
        .cloned()
        .collect()
}
