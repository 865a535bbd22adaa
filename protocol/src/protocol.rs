//! Defines the protocol between the conversation UI and the service that owns threads.
//!
//! Uses a submission queue / event queue pattern: the UI submits [`Op`]s and observes [`Event`]s.
//! The UI never mutates messages itself; every timeline change arrives as an event.

use serde::Deserialize;
use serde::Serialize;

use crate::ThreadId;
use crate::models::ItemId;
use crate::models::ItemPosition;
use crate::models::Message;
use crate::models::ThreadSummary;
use crate::outgoing::OutgoingMessage;

/// Submission operation
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Op {
    ListThreads,

    /// Make `thread_id` the active thread. Answered with [`Event::ThreadOpened`].
    OpenThread { thread_id: ThreadId },

    /// Deliver a composed message to its thread.
    SendMessage(OutgoingMessage),

    /// Fetch up to `limit` messages older than `before`. Answered with
    /// [`Event::OlderMessages`].
    LoadMore {
        thread_id: ThreadId,
        before: ItemPosition,
        limit: usize,
    },
}

/// Change notifications from the thread service.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    ThreadsListed { threads: Vec<ThreadSummary> },

    ThreadOpened {
        summary: ThreadSummary,
        messages: Vec<Message>,
    },

    MessageAdded(Message),

    /// Content, delivery state or attachments of a message changed.
    MessageUpdated(Message),

    MessageRemoved { thread_id: ThreadId, item_id: ItemId },

    /// An older page. `exhausted` is set once nothing older remains.
    OlderMessages {
        thread_id: ThreadId,
        messages: Vec<Message>,
        exhausted: bool,
    },

    /// Non-fatal failure reported by the service.
    Error { message: String },
}

impl Event {
    /// Thread the event belongs to, when it is scoped to one.
    pub fn thread_id(&self) -> Option<ThreadId> {
        match self {
            Event::ThreadsListed { .. } | Event::Error { .. } => None,
            Event::ThreadOpened { summary, .. } => Some(summary.id),
            Event::MessageAdded(message) | Event::MessageUpdated(message) => {
                Some(message.thread_id)
            }
            Event::MessageRemoved { thread_id, .. } | Event::OlderMessages { thread_id, .. } => {
                Some(*thread_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn op_is_tagged_by_type() -> Result<()> {
        let thread_id = ThreadId::new();
        let op = Op::LoadMore {
            thread_id,
            before: ItemPosition(-4),
            limit: 20,
        };
        assert_eq!(
            serde_json::to_value(&op)?,
            json!({
                "type": "load_more",
                "thread_id": thread_id.to_string(),
                "before": -4,
                "limit": 20,
            })
        );
        let parsed: Op = serde_json::from_value(json!({ "type": "list_threads" }))?;
        assert_eq!(parsed, Op::ListThreads);
        Ok(())
    }

    #[test]
    fn removal_event_is_scoped_to_its_thread() -> Result<()> {
        let thread_id = ThreadId::new();
        let event = Event::MessageRemoved {
            thread_id,
            item_id: ItemId::new(),
        };
        assert_eq!(event.thread_id(), Some(thread_id));
        let round_trip: Event = serde_json::from_value(serde_json::to_value(&event)?)?;
        assert_eq!(round_trip, event);
        assert_eq!(
            Event::Error {
                message: "offline".to_string()
            }
            .thread_id(),
            None
        );
        Ok(())
    }
}
