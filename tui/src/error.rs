use std::path::PathBuf;

use chatline_protocol::models::ItemId;

/// Errors surfaced by the conversation surface's collaborators.
///
/// None of these escape the timeline or the composer: call sites log them and carry on.
#[derive(Debug, thiserror::Error)]
pub enum ChatlineError {
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid emoji table {}", path.display())]
    EmojiTable {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to render item {item_id}: {message}")]
    Render { item_id: ItemId, message: String },
}
