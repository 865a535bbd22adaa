use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::ThreadId;

/// A staged file resolved at send time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub path: PathBuf,
    pub content_type: String,
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Payload of one successful composer submission.
///
/// `attachments` is always fully resolved: consumers never observe a partially read list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub thread_id: Option<ThreadId>,
    pub plain_text: String,
    pub html: String,
    pub attachments: Vec<Attachment>,
}
