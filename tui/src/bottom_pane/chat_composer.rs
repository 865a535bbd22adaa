//! The chat composer is the bottom-pane text input state machine.
//!
//! It is responsible for:
//!
//! - Editing the input buffer (an [`InputSurface`]).
//! - Recalling previously sent drafts.
//! - Handling submit vs newline on Enter.
//! - Normalizing every edit (stripping control sequences and expanding `:shortcodes:`).
//! - Packaging a submission into an [`OutgoingMessage`] and emitting it on the app event channel.
//!
//! # Key Event Routing
//!
//! [`ChatComposer::handle_key_event`] drops key releases, then decides between history recall,
//! submission, and plain editing. It returns [`InputResult::Submit`] when the caller should await
//! [`ChatComposer::send`]; sending is async because staged attachments are read first.
//!
//! # History Navigation (Up/Down)
//!
//! <kbd>↑</kbd>/<kbd>↓</kbd> and <kbd>Ctrl</kbd>+<kbd>P</kbd>/<kbd>Ctrl</kbd>+<kbd>N</kbd> walk
//! the send history only while the draft has not been edited since the last send or recall. Any
//! edit switches those keys back to caret movement. A recalled entry is shown with the caret at
//! the start of the text.
//!
//! # Submit vs Newline
//!
//! Plain <kbd>Enter</kbd> submits unless the draft contains an odd number of ``` fences, in which
//! case the user is inside a literal block and a newline is inserted instead. Enter with any
//! modifier always inserts a newline.
use std::path::PathBuf;
use std::sync::Arc;

use chatline_protocol::ThreadId;
use chatline_protocol::outgoing::OutgoingMessage;
use crossterm::event::KeyCode;
use crossterm::event::KeyEvent;
use crossterm::event::KeyEventKind;
use crossterm::event::KeyModifiers;
use ratatui::buffer::Buffer;
use ratatui::layout::Constraint;
use ratatui::layout::Layout;
use ratatui::layout::Rect;
use ratatui::style::Stylize;
use ratatui::text::Line;
use ratatui::text::Span;
use ratatui::widgets::Block;
use ratatui::widgets::Paragraph;
use ratatui::widgets::Widget;

use super::attachments::AttachmentStage;
use super::attachments::StagedFiles;
use super::chat_composer_history::Recall;
use super::chat_composer_history::SendHistory;
use super::footer::FooterMode;
use super::footer::FooterProps;
use super::footer::footer_height;
use super::footer::render_footer;
use super::input_surface::CaretPlacement;
use super::input_surface::InputSurface;
use crate::app_event::AppEvent;
use crate::app_event_sender::AppEventSender;
use crate::markdown::render_markdown_html;
use crate::render::renderable::Renderable;
use crate::sanitize::ControlSanitizer;
use crate::sanitize::Sanitize;
use crate::shortcodes::ShortcodeTable;
use crate::style::composer_style;

const LITERAL_FENCE: &str = "```";

/// Columns taken by the `› ` prompt.
const LIVE_PREFIX_COLS: u16 = 2;

/// The composer grows with its content up to this many rows, then scrolls.
const MAX_VISIBLE_ROWS: u16 = 8;

/// Result returned when the user interacts with the text area.
#[derive(Debug, PartialEq)]
pub enum InputResult {
    /// The key requested a send; the caller should await [`ChatComposer::send`].
    Submit,
    None,
}

/// Returns true when every ``` fence in `text` is closed.
pub fn literal_blocks_closed(text: &str) -> bool {
    text.split(LITERAL_FENCE).count() % 2 == 1
}

pub struct ChatComposer<A: AttachmentStage = StagedFiles> {
    surface: InputSurface,
    history: SendHistory,
    /// Set by any edit, cleared by a send or a history recall.
    editing: bool,
    has_focus: bool,
    loading: bool,
    sanitizer: Arc<dyn Sanitize>,
    shortcodes: Arc<ShortcodeTable>,
    attachments: A,
    app_event_tx: AppEventSender,
    placeholder_text: String,
    thread_id: Option<ThreadId>,
}

impl ChatComposer<StagedFiles> {
    pub fn new(
        app_event_tx: AppEventSender,
        shortcodes: Arc<ShortcodeTable>,
        placeholder_text: String,
    ) -> Self {
        Self::with_collaborators(
            app_event_tx,
            Arc::new(ControlSanitizer),
            shortcodes,
            StagedFiles::new(),
            placeholder_text,
        )
    }

    pub fn stage_attachment(&mut self, path: PathBuf) {
        tracing::debug!("staging attachment {}", path.display());
        self.attachments.stage(path);
    }
}

impl<A: AttachmentStage> ChatComposer<A> {
    pub fn with_collaborators(
        app_event_tx: AppEventSender,
        sanitizer: Arc<dyn Sanitize>,
        shortcodes: Arc<ShortcodeTable>,
        attachments: A,
        placeholder_text: String,
    ) -> Self {
        Self {
            surface: InputSurface::new(),
            history: SendHistory::new(),
            editing: false,
            has_focus: true,
            loading: false,
            sanitizer,
            shortcodes,
            attachments,
            app_event_tx,
            placeholder_text,
            thread_id: None,
        }
    }

    pub fn text(&self) -> &str {
        self.surface.text()
    }

    pub fn caret(&self) -> usize {
        self.surface.caret()
    }

    pub fn is_empty(&self) -> bool {
        self.surface.is_empty()
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    pub fn history(&self) -> &SendHistory {
        &self.history
    }

    pub fn attachments(&self) -> &A {
        &self.attachments
    }

    /// Discards the draft without recording it.
    pub fn clear_draft(&mut self) {
        self.surface.clear();
        self.editing = false;
    }

    /// Thread that subsequent sends are addressed to.
    pub fn set_thread(&mut self, thread_id: Option<ThreadId>) {
        self.thread_id = thread_id;
    }

    pub fn focus(&mut self) {
        self.has_focus = true;
    }

    pub fn blur(&mut self) {
        self.has_focus = false;
    }

    pub fn has_focus(&self) -> bool {
        self.has_focus
    }

    /// Toggles the busy marker. Editing stays enabled either way.
    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Handle a key event coming from the main UI. The bool reports whether a redraw is needed.
    pub fn handle_key_event(&mut self, key_event: KeyEvent) -> (InputResult, bool) {
        if key_event.kind == KeyEventKind::Release {
            return (InputResult::None, false);
        }
        match key_event {
            KeyEvent {
                code: KeyCode::Up | KeyCode::Down,
                modifiers: KeyModifiers::NONE,
                ..
            }
            | KeyEvent {
                code: KeyCode::Char('p') | KeyCode::Char('n'),
                modifiers: KeyModifiers::CONTROL,
                ..
            } if !self.editing && !self.history.is_empty() => {
                let direction = match key_event.code {
                    KeyCode::Up | KeyCode::Char('p') => Recall::Previous,
                    _ => Recall::Next,
                };
                self.recall(direction);
                (InputResult::None, true)
            }
            KeyEvent {
                code: KeyCode::Enter,
                modifiers: KeyModifiers::NONE,
                ..
            } if literal_blocks_closed(self.surface.text()) => (InputResult::Submit, false),
            input => self.handle_input_basic(input),
        }
    }

    /// Insert pasted text as a single edit.
    pub fn handle_paste(&mut self, pasted: String) -> bool {
        let pasted = pasted.replace("\r\n", "\n").replace('\r', "\n");
        if pasted.is_empty() {
            return false;
        }
        self.surface.insert_str(&pasted);
        self.on_input();
        true
    }

    /// Validates and emits the current draft.
    ///
    /// Returns false when there is nothing to send: no text survives sanitization and no
    /// staged attachment can be read. The draft is left untouched in that case, but staged files
    /// that all failed to read are dropped. Otherwise emits [`AppEvent::Send`] and resets the
    /// draft, recording the raw text in the send history.
    pub async fn send(&mut self) -> bool {
        let raw = self.surface.text().to_string();
        let clean = self.sanitizer.sanitize(&raw);
        let plain_text = self.shortcodes.expand(clean.trim());
        let html = render_markdown_html(&self.shortcodes.expand(&clean));
        tracing::debug!(plain_text = %plain_text, html = %html, "composer send requested");

        let has_text = !plain_text.is_empty() || !html.is_empty();
        if !has_text && !self.attachments.has_files() {
            return false;
        }

        let attachments = self.attachments.snapshot().await;
        if !has_text && attachments.is_empty() {
            tracing::warn!("none of the staged attachments could be read; nothing to send");
            self.attachments.clear();
            return false;
        }
        self.app_event_tx.send(AppEvent::Send(OutgoingMessage {
            thread_id: self.thread_id,
            plain_text,
            html,
            attachments,
        }));
        self.attachments.clear();
        self.surface.clear();
        self.history.push(raw);
        self.editing = false;
        self.focus();
        true
    }

    fn recall(&mut self, direction: Recall) {
        let text = self.history.recall(direction).to_string();
        self.surface.set_text(text, CaretPlacement::Start);
    }

    /// Runs after every edit: marks the draft as edited, then normalizes it. Each normalization
    /// step runs once; when it changes the content the caret moves to the tail.
    fn on_input(&mut self) {
        self.editing = true;

        let current = self.surface.text();
        let sanitized = self.sanitizer.sanitize(current);
        if sanitized != current {
            tracing::warn!("removed control sequences from the draft");
            self.surface.set_text(sanitized, CaretPlacement::Tail);
        }

        let current = self.surface.text();
        let expanded = self.shortcodes.expand(current);
        if expanded != current {
            self.surface.set_text(expanded, CaretPlacement::Tail);
        }
    }

    /// Handles keys that edit the draft or move the caret.
    fn handle_input_basic(&mut self, input: KeyEvent) -> (InputResult, bool) {
        let KeyEvent {
            code, modifiers, ..
        } = input;
        let word_modifier =
            modifiers.contains(KeyModifiers::ALT) || modifiers.contains(KeyModifiers::CONTROL);
        let edited = match code {
            KeyCode::Char('w') if modifiers == KeyModifiers::CONTROL => {
                self.surface.delete_word_backward()
            }
            KeyCode::Char('u') if modifiers == KeyModifiers::CONTROL => {
                self.surface.delete_to_line_start()
            }
            KeyCode::Char(c)
                if !modifiers.contains(KeyModifiers::CONTROL)
                    && !modifiers.contains(KeyModifiers::ALT) =>
            {
                self.surface.insert_str(c.encode_utf8(&mut [0; 4]));
                true
            }
            KeyCode::Enter => {
                self.surface.insert_str("\n");
                true
            }
            KeyCode::Tab => {
                self.surface.insert_str("\t");
                true
            }
            KeyCode::Backspace if word_modifier => self.surface.delete_word_backward(),
            KeyCode::Backspace => self.surface.delete_backward(),
            KeyCode::Delete => self.surface.delete_forward(),
            KeyCode::Left if word_modifier => return self.moved(InputSurface::move_word_left),
            KeyCode::Right if word_modifier => return self.moved(InputSurface::move_word_right),
            KeyCode::Left => return self.moved(InputSurface::move_left),
            KeyCode::Right => return self.moved(InputSurface::move_right),
            KeyCode::Home => return self.moved(InputSurface::move_line_start),
            KeyCode::End => return self.moved(InputSurface::move_line_end),
            KeyCode::Up => return self.moved(InputSurface::move_up),
            KeyCode::Down => return self.moved(InputSurface::move_down),
            _ => return (InputResult::None, false),
        };
        if edited {
            self.on_input();
        }
        (InputResult::None, edited)
    }

    fn moved(&mut self, movement: fn(&mut InputSurface)) -> (InputResult, bool) {
        let before = self.surface.caret();
        movement(&mut self.surface);
        (InputResult::None, before != self.surface.caret())
    }

    fn footer_props(&self) -> FooterProps {
        FooterProps {
            mode: self.footer_mode(),
            attachment_count: self.attachments.len(),
            loading: self.loading,
        }
    }

    fn footer_mode(&self) -> FooterMode {
        if !literal_blocks_closed(self.surface.text()) {
            FooterMode::LiteralBlock
        } else if !self.editing && self.history.offset() > 0 {
            FooterMode::HistoryRecall {
                offset: self.history.offset(),
                len: self.history.len(),
            }
        } else {
            FooterMode::ShortcutSummary
        }
    }

    fn layout_areas(&self, area: Rect) -> [Rect; 2] {
        let footer = footer_height(self.footer_props());
        let [textarea_rect, footer_rect] =
            Layout::vertical([Constraint::Min(1), Constraint::Length(footer)]).areas(area);
        [textarea_rect, footer_rect]
    }

    fn visible_rows(&self, width: u16) -> u16 {
        let rows = self
            .surface
            .wrapped_rows(width.saturating_sub(LIVE_PREFIX_COLS))
            .len();
        (rows as u16).clamp(1, MAX_VISIBLE_ROWS)
    }

    /// First wrapped row shown, chosen so the caret row stays visible.
    fn scroll_top(&self, width: u16, height: u16) -> usize {
        let (caret_row, _) = self
            .surface
            .caret_row_col(width.saturating_sub(LIVE_PREFIX_COLS));
        caret_row.saturating_sub(usize::from(height.max(1)) - 1)
    }
}

impl<A: AttachmentStage> Renderable for ChatComposer<A> {
    fn cursor_pos(&self, area: Rect) -> Option<(u16, u16)> {
        if !self.has_focus {
            return None;
        }
        let [textarea_rect, _] = self.layout_areas(area);
        let (row, col) = self
            .surface
            .caret_row_col(textarea_rect.width.saturating_sub(LIVE_PREFIX_COLS));
        let top = self.scroll_top(textarea_rect.width, textarea_rect.height);
        let y = textarea_rect.y + u16::try_from(row - top).unwrap_or(0);
        let x = textarea_rect.x + LIVE_PREFIX_COLS + u16::try_from(col).unwrap_or(u16::MAX);
        Some((
            x.min(textarea_rect.right().saturating_sub(1)),
            y.min(textarea_rect.bottom().saturating_sub(1)),
        ))
    }

    fn desired_height(&self, width: u16) -> u16 {
        self.visible_rows(width) + footer_height(self.footer_props())
    }

    fn render(&self, area: Rect, buf: &mut Buffer) {
        let [textarea_rect, footer_rect] = self.layout_areas(area);
        Block::default()
            .style(composer_style())
            .render(textarea_rect, buf);

        let prompt = if self.has_focus {
            "\u{203a} ".bold()
        } else {
            "\u{203a} ".dim()
        };
        let lines: Vec<Line<'_>> = if self.surface.is_empty() {
            vec![Line::from(vec![
                prompt,
                Span::from(self.placeholder_text.as_str()).dim(),
            ])]
        } else {
            let text = self.surface.text();
            let rows = self
                .surface
                .wrapped_rows(textarea_rect.width.saturating_sub(LIVE_PREFIX_COLS));
            let top = self.scroll_top(textarea_rect.width, textarea_rect.height);
            rows.into_iter()
                .enumerate()
                .skip(top)
                .take(usize::from(textarea_rect.height))
                .map(|(idx, range)| {
                    let lead = if idx == 0 {
                        prompt.clone()
                    } else {
                        Span::from("  ")
                    };
                    Line::from(vec![lead, Span::from(text[range].replace('\t', " "))])
                })
                .collect()
        };
        Paragraph::new(lines).render(textarea_rect, buf);
        render_footer(footer_rect, buf, self.footer_props());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::sync::mpsc::unbounded_channel;

    fn composer() -> (ChatComposer, UnboundedReceiver<AppEvent>) {
        let (tx, rx) = unbounded_channel::<AppEvent>();
        let composer = ChatComposer::new(
            AppEventSender::new(tx),
            Arc::new(ShortcodeTable::builtin()),
            "Write a message".to_string(),
        );
        (composer, rx)
    }

    fn press(composer: &mut ChatComposer, code: KeyCode) -> (InputResult, bool) {
        composer.handle_key_event(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_str(composer: &mut ChatComposer, text: &str) {
        for c in text.chars() {
            if c == '\n' {
                composer.handle_key_event(KeyEvent::new(KeyCode::Enter, KeyModifiers::SHIFT));
            } else {
                press(composer, KeyCode::Char(c));
            }
        }
    }

    fn expect_sent(rx: &mut UnboundedReceiver<AppEvent>) -> OutgoingMessage {
        match rx.try_recv() {
            Ok(AppEvent::Send(message)) => message,
            other => panic!("expected a send event, got {other:?}"),
        }
    }

    #[test]
    fn literal_fence_parity() {
        assert!(literal_blocks_closed(""));
        assert!(literal_blocks_closed("no fences"));
        assert!(!literal_blocks_closed("```rust\nfn main() {}"));
        assert!(literal_blocks_closed("```rust\nfn main() {}\n```"));
    }

    #[test]
    fn enter_submits_outside_literal_blocks() {
        let (mut composer, _rx) = composer();
        type_str(&mut composer, "hello");
        assert_eq!(press(&mut composer, KeyCode::Enter), (InputResult::Submit, false));
    }

    #[test]
    fn unpaired_fence_blocks_submit_and_paired_fence_allows_it() {
        let (mut composer, _rx) = composer();
        type_str(&mut composer, "hello ```code");
        assert_eq!(press(&mut composer, KeyCode::Enter).0, InputResult::None);
        assert_eq!(composer.text(), "hello ```code\n");

        composer.clear_draft();
        type_str(&mut composer, "hello ```code```");
        assert_eq!(press(&mut composer, KeyCode::Enter).0, InputResult::Submit);
    }

    #[test]
    fn enter_inside_open_literal_block_inserts_newline() {
        let (mut composer, _rx) = composer();
        type_str(&mut composer, "```");
        let (result, redraw) = press(&mut composer, KeyCode::Enter);
        assert_eq!(result, InputResult::None);
        assert!(redraw);
        assert_eq!(composer.text(), "```\n");
        assert_eq!(composer.footer_mode(), FooterMode::LiteralBlock);
    }

    #[test]
    fn shift_enter_inserts_newline() {
        let (mut composer, _rx) = composer();
        type_str(&mut composer, "a\nb");
        assert_eq!(composer.text(), "a\nb");
    }

    #[test]
    fn key_release_is_ignored() {
        let (mut composer, _rx) = composer();
        let mut release = KeyEvent::new(KeyCode::Char('x'), KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert_eq!(composer.handle_key_event(release), (InputResult::None, false));
        assert!(composer.is_empty());
        assert!(!composer.is_editing());
    }

    #[tokio::test]
    async fn empty_send_is_declined() {
        let (mut composer, mut rx) = composer();
        type_str(&mut composer, "   ");
        assert!(!composer.send().await);
        assert!(rx.try_recv().is_err());
        assert_eq!(composer.text(), "   ");
        assert!(composer.history().is_empty());
    }

    #[tokio::test]
    async fn send_emits_plain_text_and_html() {
        let (mut composer, mut rx) = composer();
        type_str(&mut composer, "**hi** there :wave");
        type_str(&mut composer, ":");

        assert!(composer.send().await);
        let message = expect_sent(&mut rx);
        assert_eq!(message.plain_text, "**hi** there \u{1f44b}");
        assert_eq!(
            message.html,
            "<p><strong>hi</strong> there \u{1f44b}</p>\n"
        );
        assert!(message.attachments.is_empty());
        assert!(composer.is_empty());
        assert!(!composer.is_editing());
        assert!(composer.has_focus());
    }

    #[tokio::test]
    async fn recall_walks_history_with_caret_at_start() {
        let (mut composer, mut rx) = composer();
        for text in ["a", "b"] {
            type_str(&mut composer, text);
            assert!(composer.send().await);
            expect_sent(&mut rx);
        }

        press(&mut composer, KeyCode::Up);
        assert_eq!(composer.text(), "b");
        assert_eq!(composer.caret(), 0);
        press(&mut composer, KeyCode::Up);
        assert_eq!(composer.text(), "a");
        press(&mut composer, KeyCode::Down);
        assert_eq!(composer.text(), "b");
        composer.handle_key_event(KeyEvent::new(KeyCode::Char('n'), KeyModifiers::CONTROL));
        assert_eq!(composer.text(), "");
    }

    #[tokio::test]
    async fn editing_turns_arrows_back_into_caret_movement() {
        let (mut composer, mut rx) = composer();
        type_str(&mut composer, "first");
        assert!(composer.send().await);
        expect_sent(&mut rx);

        type_str(&mut composer, "one\ntwo");
        press(&mut composer, KeyCode::Up);
        assert_eq!(composer.text(), "one\ntwo");
        assert_eq!(composer.caret(), 3);
        assert_eq!(composer.history().offset(), 0);
    }

    #[tokio::test]
    async fn sending_a_recalled_entry_appends_it_again() {
        let (mut composer, mut rx) = composer();
        type_str(&mut composer, "again");
        assert!(composer.send().await);
        expect_sent(&mut rx);

        press(&mut composer, KeyCode::Up);
        assert!(composer.send().await);
        assert_eq!(expect_sent(&mut rx).plain_text, "again");
        assert_eq!(composer.history().entries(), ["again", "again"]);
        assert_eq!(composer.history().offset(), 0);
    }

    #[test]
    fn control_sequences_are_removed_and_caret_moves_to_tail() {
        let (mut composer, _rx) = composer();
        composer.handle_paste("x\u{1b}[31my\u{1b}]0;title\u{7}z".to_string());
        assert_eq!(composer.text(), "xyz");
        assert_eq!(composer.caret(), 3);
    }

    #[tokio::test]
    async fn typed_angle_brackets_are_kept_as_text() {
        let (mut composer, mut rx) = composer();
        type_str(&mut composer, "use Vec<String> here");
        assert_eq!(composer.text(), "use Vec<String> here");

        assert!(composer.send().await);
        let message = expect_sent(&mut rx);
        assert_eq!(message.plain_text, "use Vec<String> here");
        assert_eq!(message.html, "<p>use Vec&lt;String&gt; here</p>\n");
        assert_eq!(composer.history().entries(), ["use Vec<String> here"]);
    }

    #[tokio::test]
    async fn angle_brackets_inside_literal_blocks_are_kept() {
        let (mut composer, mut rx) = composer();
        type_str(&mut composer, "```\nlet v: Vec<String>;\n```");
        assert_eq!(composer.text(), "```\nlet v: Vec<String>;\n```");

        assert!(composer.send().await);
        let message = expect_sent(&mut rx);
        assert_eq!(message.plain_text, "```\nlet v: Vec<String>;\n```");
        assert_eq!(
            message.html,
            "<pre><code>let v: Vec&lt;String&gt;;\n</code></pre>\n"
        );
    }

    #[tokio::test]
    async fn pasted_markup_stays_literal_and_is_escaped_on_send() {
        let (mut composer, mut rx) = composer();
        composer.handle_paste("x<script>alert(1)</script>y".to_string());
        assert_eq!(composer.text(), "x<script>alert(1)</script>y");

        assert!(composer.send().await);
        let message = expect_sent(&mut rx);
        assert_eq!(message.plain_text, "x<script>alert(1)</script>y");
        assert!(!message.html.contains("<script"), "{}", message.html);
    }

    #[test]
    fn shortcode_expansion_moves_caret_to_tail() {
        let (mut composer, _rx) = composer();
        type_str(&mut composer, "a :fire: b");
        press(&mut composer, KeyCode::Home);
        assert_eq!(composer.caret(), 0);
        assert_eq!(composer.text(), "a \u{1f525} b");
        type_str(&mut composer, ":x:");
        assert_eq!(composer.text(), "\u{274c}a \u{1f525} b");
        assert_eq!(composer.caret(), composer.text().len());
    }

    #[test]
    fn paste_normalizes_carriage_returns() {
        let (mut composer, _rx) = composer();
        assert!(composer.handle_paste("one\r\ntwo\rthree".to_string()));
        assert_eq!(composer.text(), "one\ntwo\nthree");
        assert!(!composer.handle_paste(String::new()));
    }

    #[tokio::test]
    async fn send_carries_staged_attachments() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("photo.png");
        std::fs::write(&path, [1u8, 2, 3])?;

        let (mut composer, mut rx) = composer();
        let thread_id = ThreadId::new();
        composer.set_thread(Some(thread_id));
        composer.stage_attachment(path);

        assert!(composer.send().await);
        let message = expect_sent(&mut rx);
        assert_eq!(message.thread_id, Some(thread_id));
        assert_eq!(message.plain_text, "");
        assert_eq!(message.attachments.len(), 1);
        assert_eq!(message.attachments[0].name, "photo.png");
        assert_eq!(message.attachments[0].content_type, "image/png");
        assert!(!composer.attachments().has_files());
        Ok(())
    }

    #[tokio::test]
    async fn attachment_only_send_with_unreadable_files_is_declined() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let (mut composer, mut rx) = composer();
        composer.stage_attachment(dir.path().join("missing.png"));

        assert!(!composer.send().await);
        assert!(rx.try_recv().is_err());
        assert!(composer.history().is_empty());
        assert!(!composer.attachments().has_files());
        Ok(())
    }

    #[test]
    fn word_deletion_shortcuts() {
        let (mut composer, _rx) = composer();
        type_str(&mut composer, "hello brave world");
        composer.handle_key_event(KeyEvent::new(KeyCode::Char('w'), KeyModifiers::CONTROL));
        assert_eq!(composer.text(), "hello brave ");
        composer.handle_key_event(KeyEvent::new(KeyCode::Backspace, KeyModifiers::ALT));
        assert_eq!(composer.text(), "hello ");
        composer.handle_key_event(KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL));
        assert_eq!(composer.text(), "");
    }

    fn snapshot_composer_state<F>(name: &str, setup: F)
    where
        F: FnOnce(&mut ChatComposer),
    {
        let (mut composer, _rx) = composer();
        setup(&mut composer);
        let width = 60;
        let height = composer.desired_height(width);
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal
            .draw(|f| composer.render(f.area(), f.buffer_mut()))
            .unwrap();
        insta::assert_snapshot!(name, terminal.backend());
    }

    #[test]
    fn composer_snapshots() {
        snapshot_composer_state("composer_placeholder", |_| {});
        snapshot_composer_state("composer_open_literal_block", |composer| {
            type_str(composer, "```\nfn main() {}");
        });
    }

    #[test]
    fn cursor_follows_the_caret() {
        let (mut composer, _rx) = composer();
        let area = Rect::new(0, 0, 60, composer.desired_height(60));
        assert_eq!(composer.cursor_pos(area), Some((2, 0)));

        type_str(&mut composer, "ab\ncd");
        let area = Rect::new(0, 0, 60, composer.desired_height(60));
        assert_eq!(composer.cursor_pos(area), Some((4, 1)));
        composer.blur();
        assert_eq!(composer.cursor_pos(area), None);
    }
}
