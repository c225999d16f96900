//! Inbound messages and addressable delivery endpoints.

use super::{Attachment, ChannelRef, CorrespondentId, MessageRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An addressable endpoint for sends, edits, deletions, and history scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Destination {
    /// A shared staff-side channel.
    Channel(ChannelRef),
    /// A correspondent's private message stream.
    Direct(CorrespondentId),
}

/// Author of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAuthor {
    /// Platform identifier of the author.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Avatar reference, when one is set.
    pub avatar_url: Option<String>,
}

/// One message received from either endpoint, before mirroring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Platform identifier of the original message.
    pub id: MessageRef,
    /// Message author.
    pub author: MessageAuthor,
    /// Raw text body.
    pub content: String,
    /// Creation instant reported by the platform.
    pub created_at: DateTime<Utc>,
    /// Uploaded attachments, in platform order.
    pub attachments: Vec<Attachment>,
    /// Location the message was received from.
    pub source: Destination,
}

impl InboundMessage {
    /// Returns `true` when the message carries neither text nor attachments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty() && self.attachments.is_empty()
    }
}
