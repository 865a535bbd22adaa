/// Direction of a history recall keystroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recall {
    /// Towards older entries (<kbd>↑</kbd>).
    Previous,
    /// Towards newer entries and finally the empty live buffer (<kbd>↓</kbd>).
    Next,
}

/// Append-only log of sent composer contents with a recall cursor.
///
/// `offset` ranges over `[0, len]`: 0 is the live (empty) editing buffer and `len` is the oldest
/// entry, so offset `k > 0` shows `entries[len - k]`. Entries are never removed or reordered;
/// pushing a new one only resets the cursor.
#[derive(Debug, Default)]
pub struct SendHistory {
    entries: Vec<String>,
    offset: usize,
}

impl SendHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the raw content of a successful send and return to the live buffer.
    pub fn push(&mut self, raw: String) {
        self.entries.push(raw);
        self.offset = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Move the cursor one step, clamped to `[0, len]`, and return the text to show.
    pub fn recall(&mut self, direction: Recall) -> &str {
        self.offset = match direction {
            Recall::Previous => (self.offset + 1).min(self.entries.len()),
            Recall::Next => self.offset.saturating_sub(1),
        };
        if self.offset == 0 {
            ""
        } else {
            &self.entries[self.entries.len() - self.offset]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn history_with(entries: &[&str]) -> SendHistory {
        let mut history = SendHistory::new();
        for entry in entries {
            history.push((*entry).to_string());
        }
        history
    }

    #[test]
    fn recall_walks_back_and_forth() {
        let mut history = history_with(&["a", "b"]);
        assert_eq!(history.entries(), ["a".to_string(), "b".to_string()]);

        assert_eq!(history.recall(Recall::Previous), "b");
        assert_eq!(history.recall(Recall::Previous), "a");
        assert_eq!(history.recall(Recall::Next), "b");
        assert_eq!(history.recall(Recall::Next), "");
        assert_eq!(history.offset(), 0);
    }

    #[test]
    fn recall_clamps_at_both_ends() {
        let mut history = history_with(&["a", "b"]);
        assert_eq!(history.recall(Recall::Next), "");
        assert_eq!(history.offset(), 0);

        history.recall(Recall::Previous);
        history.recall(Recall::Previous);
        assert_eq!(history.recall(Recall::Previous), "a");
        assert_eq!(history.offset(), 2);
    }

    #[test]
    fn push_resets_cursor_and_keeps_duplicates() {
        let mut history = history_with(&["same"]);
        history.recall(Recall::Previous);
        history.push("same".to_string());
        assert_eq!(history.offset(), 0);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn empty_history_only_shows_the_live_buffer() {
        let mut history = SendHistory::new();
        assert_eq!(history.recall(Recall::Previous), "");
        assert_eq!(history.offset(), 0);
    }
}
