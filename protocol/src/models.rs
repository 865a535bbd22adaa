//! Timeline items as observed by the conversation surface.
//!
//! The surface never owns these records. It reads them from change notifications and keeps only
//! what it needs to render and order them.

use std::fmt::Display;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::ThreadId;

/// Stable identity of one timeline item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Position of an item in the backing collection.
///
/// Positions are totally ordered by arrival. Older pages fetched through "load more" are given
/// positions below every item already present, so a position never has to change once assigned.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct ItemPosition(pub i64);

impl Display for ItemPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageDirection {
    Incoming,
    Outgoing,
}

/// Delivery progress of an outgoing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    #[default]
    Pending,
    Sent,
    Delivered,
}

/// Metadata for a file attached to a message.
///
/// `loaded` flips once the attachment body is available locally; the rendered view grows by a
/// line when that happens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentInfo {
    pub name: String,
    pub size: u64,
    pub content_type: String,
    #[serde(default)]
    pub loaded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: ItemId,
    pub position: ItemPosition,
    pub thread_id: ThreadId,
    pub sender: String,
    pub direction: MessageDirection,
    pub sent_at: DateTime<Utc>,
    /// Plain-text body.
    pub text: String,
    /// Rendered body, when the sender provided one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default)]
    pub attachments: Vec<AttachmentInfo>,
    #[serde(default)]
    pub delivery: DeliveryState,
    /// Human-readable error summaries (send failures, unknown recipients).
    #[serde(default)]
    pub errors: Vec<String>,
}

impl Message {
    pub fn is_incoming(&self) -> bool {
        self.direction == MessageDirection::Incoming
    }

    pub fn is_outgoing(&self) -> bool {
        self.direction == MessageDirection::Outgoing
    }
}

/// Summary of a thread shown in the aside panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub id: ThreadId,
    pub title: String,
    pub members: Vec<String>,
    pub started: DateTime<Utc>,
    pub message_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn positions_order_older_pages_first() {
        let mut positions = vec![ItemPosition(3), ItemPosition(-2), ItemPosition(0)];
        positions.sort();
        assert_eq!(
            positions,
            vec![ItemPosition(-2), ItemPosition(0), ItemPosition(3)]
        );
    }

    #[test]
    fn message_defaults_optional_fields_when_deserializing() -> anyhow::Result<()> {
        let thread_id = ThreadId::new();
        let item_id = ItemId::new();
        let json = serde_json::json!({
            "id": item_id,
            "position": 7,
            "thread_id": thread_id,
            "sender": "alice",
            "direction": "incoming",
            "sent_at": "2024-05-01T12:00:00Z",
            "text": "hi",
        });

        let message: Message = serde_json::from_value(json)?;
        assert_eq!(message.position, ItemPosition(7));
        assert_eq!(message.delivery, DeliveryState::Pending);
        assert!(message.attachments.is_empty());
        assert!(message.html.is_none());
        assert!(message.is_incoming());
        Ok(())
    }
}
