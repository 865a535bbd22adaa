//! The conversation screen: timeline, thread aside, status line, and composer.
//!
//! [`ChatlineTui::run`] owns every piece of view state on one task. Terminal input, app events
//! (render results, sends, refresh ticks), and thread service events are multiplexed with
//! `tokio::select!`; nothing else mutates the timeline or the composer.

use std::collections::HashMap;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use chatline_protocol::ThreadId;
use chatline_protocol::models::Message;
use chatline_protocol::models::ThreadSummary;
use chatline_protocol::protocol::Event;
use chatline_protocol::protocol::Op;
use chrono::Utc;
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
use ratatui::widgets::Clear;
use ratatui::widgets::Widget;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::mpsc::unbounded_channel;

use crate::AppExitInfo;
use crate::ExitReason;
use crate::app_event::AppEvent;
use crate::app_event_sender::AppEventSender;
use crate::aside::ASIDE_MIN_TERMINAL_WIDTH;
use crate::aside::ASIDE_WIDTH;
use crate::aside::RefreshTimer;
use crate::aside::ThreadAside;
use crate::bottom_pane::ChatComposer;
use crate::bottom_pane::InputResult;
use crate::render::renderable::Renderable;
use crate::shortcodes::shared_table;
use crate::style::status_style;
use crate::timeline::MessageRenderer;
use crate::timeline::ScrollPinConfig;
use crate::timeline::ScrollState;
use crate::timeline::TimelineEngine;
use crate::tui;
use crate::tui::Tui;
use crate::tui::TuiEvent;

const ATTACH_COMMAND: &str = "/attach ";

/// Session settings resolved by the binary from flags and the config file.
#[derive(Debug, Clone)]
pub struct ChatlineTuiConfig {
    pub scroll: ScrollPinConfig,
    pub aside_refresh: Duration,
    pub emoji_table: Option<PathBuf>,
    /// Messages requested per "load more" page.
    pub page_size: usize,
    pub placeholder_text: String,
}

/// Channels to the thread service.
pub struct BackendChannels {
    pub op_tx: UnboundedSender<Op>,
    pub event_rx: UnboundedReceiver<Event>,
}

/// Owns the terminal for the lifetime of a session and restores it on drop.
pub struct ChatlineTui {
    tui: Tui,
}

impl ChatlineTui {
    /// Initialize the terminal (raw mode, alternate screen) and clear it.
    pub fn new() -> anyhow::Result<Self> {
        let mut terminal = tui::init()?;
        terminal.clear()?;
        Ok(Self {
            tui: Tui::new(terminal),
        })
    }

    /// Runs the conversation screen until the user quits or the service goes away.
    pub async fn run(
        &mut self,
        config: ChatlineTuiConfig,
        backend: BackendChannels,
    ) -> anyhow::Result<AppExitInfo> {
        let BackendChannels {
            op_tx,
            mut event_rx,
        } = backend;
        let (app_event_tx_raw, mut app_event_rx) = unbounded_channel::<AppEvent>();
        let app_event_tx = AppEventSender::new(app_event_tx_raw);

        let mut app = ConversationApp::new(config, app_event_tx, op_tx);
        app.submit(Op::ListThreads);
        let frame_requester = self.tui.frame_requester();
        frame_requester.schedule_frame();

        while app.exit_reason.is_none() {
            let deadline = app.timeline.as_ref().and_then(TimelineEngine::next_deadline);
            tokio::select! {
                maybe_event = self.tui.next_event() => {
                    let Some(event) = maybe_event else {
                        app.exit_reason = Some(ExitReason::UserRequested);
                        break;
                    };
                    match event {
                        TuiEvent::Draw => {
                            while let Ok(app_event) = app_event_rx.try_recv() {
                                app.handle_app_event(app_event);
                            }
                            if let Err(err) = app.draw(&mut self.tui) {
                                tracing::error!("failed to draw: {err:#}");
                                app.exit_reason =
                                    Some(ExitReason::Fatal(format!("failed to draw: {err}")));
                            }
                        }
                        TuiEvent::Key(key_event) => {
                            if app.handle_key_event(key_event).await {
                                frame_requester.schedule_frame();
                            }
                        }
                        TuiEvent::Paste(pasted) => {
                            if app.composer.handle_paste(pasted) {
                                frame_requester.schedule_frame();
                            }
                        }
                        TuiEvent::Scroll(delta) => {
                            app.scroll_timeline(delta);
                            frame_requester.schedule_frame();
                        }
                    }
                }
                maybe_app_event = app_event_rx.recv() => {
                    let Some(app_event) = maybe_app_event else {
                        break;
                    };
                    app.handle_app_event(app_event);
                    frame_requester.schedule_frame();
                }
                maybe_service_event = event_rx.recv() => {
                    match maybe_service_event {
                        Some(event) => app.handle_service_event(event),
                        None => app.exit_reason = Some(ExitReason::BackendClosed),
                    }
                    frame_requester.schedule_frame();
                }
                _ = sleep_until(deadline), if deadline.is_some() => {
                    app.tick(Instant::now());
                    frame_requester.schedule_frame();
                }
            }
        }

        app.refresh_timer.disarm();
        Ok(AppExitInfo {
            thread_id: app.timeline.as_ref().map(TimelineEngine::thread_id),
            messages_sent: app.messages_sent,
            exit_reason: app.exit_reason.unwrap_or(ExitReason::UserRequested),
        })
    }
}

impl Drop for ChatlineTui {
    fn drop(&mut self) {
        // Always attempt to restore the terminal, even if the caller exits early.
        let _ = tui::restore();
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    if let Some(deadline) = deadline {
        tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
    }
}

/// Returns the path of a `/attach <path>` draft.
fn parse_attach_command(text: &str) -> Option<PathBuf> {
    let path = text.trim().strip_prefix(ATTACH_COMMAND.trim_end())?;
    if !path.starts_with(char::is_whitespace) {
        return None;
    }
    let path = path.trim();
    (!path.is_empty()).then(|| PathBuf::from(path))
}

struct ConversationApp {
    config: ChatlineTuiConfig,
    app_event_tx: AppEventSender,
    op_tx: UnboundedSender<Op>,
    renderer: Arc<MessageRenderer>,
    timeline: Option<TimelineEngine>,
    /// Scroll state of threads that are not open, restored when they are reopened.
    saved_scroll: HashMap<ThreadId, ScrollState>,
    threads: Vec<ThreadSummary>,
    /// Threads with no older messages left to load.
    exhausted: HashSet<ThreadId>,
    load_more_in_flight: bool,
    composer: ChatComposer,
    aside: ThreadAside,
    refresh_timer: RefreshTimer,
    status: Option<String>,
    messages_sent: usize,
    exit_reason: Option<ExitReason>,
}

impl ConversationApp {
    fn new(
        config: ChatlineTuiConfig,
        app_event_tx: AppEventSender,
        op_tx: UnboundedSender<Op>,
    ) -> Self {
        let shortcodes = shared_table(config.emoji_table.as_deref());
        let composer = ChatComposer::new(
            app_event_tx.clone(),
            shortcodes,
            config.placeholder_text.clone(),
        );
        let refresh_timer = RefreshTimer::new(config.aside_refresh, app_event_tx.clone());
        Self {
            config,
            app_event_tx,
            op_tx,
            renderer: Arc::new(MessageRenderer),
            timeline: None,
            saved_scroll: HashMap::new(),
            threads: Vec::new(),
            exhausted: HashSet::new(),
            load_more_in_flight: false,
            composer,
            aside: ThreadAside::new(),
            refresh_timer,
            status: None,
            messages_sent: 0,
            exit_reason: None,
        }
    }

    fn submit(&mut self, op: Op) {
        if let Err(err) = self.op_tx.send(op) {
            tracing::error!("thread service is gone: {err}");
            self.exit_reason = Some(ExitReason::BackendClosed);
        }
    }

    /// Returns whether a redraw is needed.
    async fn handle_key_event(&mut self, key_event: KeyEvent) -> bool {
        if key_event.kind == KeyEventKind::Release {
            return false;
        }
        let now = Instant::now();
        match key_event {
            KeyEvent {
                code: KeyCode::Char('c'),
                modifiers: KeyModifiers::CONTROL,
                ..
            } => {
                if self.composer.is_empty() {
                    self.exit_reason = Some(ExitReason::UserRequested);
                } else {
                    self.composer.clear_draft();
                }
                true
            }
            KeyEvent {
                code: KeyCode::Char('a'),
                modifiers: KeyModifiers::CONTROL,
                ..
            } => {
                self.aside.toggle_expanded();
                self.sync_refresh_timer();
                true
            }
            KeyEvent {
                code: KeyCode::Char('t'),
                modifiers: KeyModifiers::CONTROL,
                ..
            } => {
                self.open_next_thread();
                true
            }
            KeyEvent {
                code: KeyCode::PageUp | KeyCode::PageDown,
                ..
            } => {
                let page = self
                    .timeline
                    .as_ref()
                    .map_or(1, |timeline| timeline.viewport().viewport_height.max(1));
                let page = isize::try_from(page).unwrap_or(isize::MAX);
                let delta = if key_event.code == KeyCode::PageUp {
                    -page
                } else {
                    page
                };
                self.scroll_timeline(delta);
                true
            }
            KeyEvent {
                code: KeyCode::Home,
                modifiers: KeyModifiers::CONTROL,
                ..
            } => {
                if let Some(timeline) = self.timeline.as_mut() {
                    timeline.scroll_to_top(now);
                }
                true
            }
            KeyEvent {
                code: KeyCode::End,
                modifiers: KeyModifiers::CONTROL,
                ..
            } => {
                if let Some(timeline) = self.timeline.as_mut() {
                    timeline.scroll_to_bottom(now);
                }
                true
            }
            _ => {
                let (result, needs_redraw) = self.composer.handle_key_event(key_event);
                match result {
                    InputResult::Submit => {
                        self.submit_draft().await;
                        true
                    }
                    InputResult::None => needs_redraw,
                }
            }
        }
    }

    async fn submit_draft(&mut self) {
        if let Some(path) = parse_attach_command(self.composer.text()) {
            self.composer.clear_draft();
            if path.is_file() {
                self.composer.stage_attachment(path);
                self.status = None;
            } else {
                self.status = Some(format!("no such file: {}", path.display()));
            }
            return;
        }
        self.composer.set_loading(true);
        if self.composer.send().await {
            self.messages_sent += 1;
        } else {
            self.composer.set_loading(false);
        }
    }

    fn scroll_timeline(&mut self, delta: isize) {
        if let Some(timeline) = self.timeline.as_mut() {
            timeline.scroll_by(delta, Instant::now());
        }
    }

    fn tick(&mut self, now: Instant) {
        if let Some(timeline) = self.timeline.as_mut() {
            timeline.tick(now);
        }
    }

    fn handle_app_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::ItemRendered {
                thread_id,
                ticket,
                result,
            } => {
                if let Some(timeline) = self.timeline.as_mut()
                    && timeline.thread_id() == thread_id
                {
                    timeline.on_item_rendered(ticket, result);
                }
            }
            AppEvent::Send(message) => {
                self.submit(Op::SendMessage(message));
            }
            AppEvent::LoadMoreRequested(thread_id) => self.load_more(thread_id),
            AppEvent::RefreshAside => self.aside.refresh(Utc::now()),
        }
    }

    fn load_more(&mut self, thread_id: ThreadId) {
        if self.load_more_in_flight || self.exhausted.contains(&thread_id) {
            return;
        }
        let Some(before) = self
            .timeline
            .as_ref()
            .filter(|timeline| timeline.thread_id() == thread_id)
            .and_then(TimelineEngine::oldest_position)
        else {
            return;
        };
        self.load_more_in_flight = true;
        self.submit(Op::LoadMore {
            thread_id,
            before,
            limit: self.config.page_size,
        });
    }

    fn handle_service_event(&mut self, event: Event) {
        let current = self.timeline.as_ref().map(TimelineEngine::thread_id);
        if let Some(thread_id) = event.thread_id()
            && !matches!(event, Event::ThreadOpened { .. })
            && current != Some(thread_id)
        {
            tracing::debug!(%thread_id, "ignoring event for a thread that is not open");
            return;
        }
        match event {
            Event::ThreadsListed { threads } => {
                let open_first = self.timeline.is_none();
                self.threads = threads;
                if open_first && let Some(first) = self.threads.first() {
                    let thread_id = first.id;
                    self.submit(Op::OpenThread { thread_id });
                }
            }
            Event::ThreadOpened { summary, messages } => self.open_thread(summary, messages),
            Event::MessageAdded(message) => {
                if message.is_outgoing() {
                    self.composer.set_loading(false);
                }
                self.aside.record_message();
                if let Some(timeline) = self.timeline.as_mut() {
                    timeline.add_item(message);
                }
            }
            Event::MessageUpdated(message) => {
                if let Some(timeline) = self.timeline.as_mut() {
                    timeline.update_item(message);
                }
            }
            Event::MessageRemoved { item_id, .. } => {
                if let Some(timeline) = self.timeline.as_mut() {
                    timeline.remove_item(item_id);
                }
            }
            Event::OlderMessages {
                thread_id,
                messages,
                exhausted,
            } => {
                self.load_more_in_flight = false;
                if exhausted {
                    self.exhausted.insert(thread_id);
                }
                if let Some(timeline) = self.timeline.as_mut() {
                    for message in messages {
                        timeline.add_item(message);
                    }
                }
            }
            Event::Error { message } => {
                tracing::warn!("thread service error: {message}");
                self.composer.set_loading(false);
                self.status = Some(message);
            }
        }
    }

    fn open_thread(&mut self, summary: ThreadSummary, messages: Vec<Message>) {
        if let Some(previous) = self.timeline.take() {
            let thread_id = previous.thread_id();
            self.saved_scroll.insert(thread_id, previous.unmount());
        }
        let thread_id = summary.id;
        let restored = self.saved_scroll.get(&thread_id).copied();
        let mut timeline = TimelineEngine::mount(
            thread_id,
            Arc::clone(&self.renderer),
            self.app_event_tx.clone(),
            self.config.scroll,
            restored,
        );
        for message in messages {
            timeline.add_item(message);
        }
        self.timeline = Some(timeline);
        self.load_more_in_flight = false;
        self.composer.set_thread(Some(thread_id));
        self.composer.focus();
        self.aside.set_summary(summary);
        self.sync_refresh_timer();
    }

    fn open_next_thread(&mut self) {
        if self.threads.is_empty() {
            return;
        }
        let current = self.timeline.as_ref().map(TimelineEngine::thread_id);
        let index = current
            .and_then(|id| self.threads.iter().position(|thread| thread.id == id))
            .map_or(0, |index| (index + 1) % self.threads.len());
        let thread_id = self.threads[index].id;
        if Some(thread_id) != current {
            self.submit(Op::OpenThread { thread_id });
        }
    }

    /// Keeps exactly one refresh timer running while the aside is on screen.
    fn sync_refresh_timer(&mut self) {
        let shown = self.aside.is_shown();
        if shown && !self.refresh_timer.is_armed() {
            self.refresh_timer.arm();
        } else if !shown && self.refresh_timer.is_armed() {
            self.refresh_timer.disarm();
        }
    }

    fn layout(&self, area: Rect) -> ScreenLayout {
        let composer_height = self.composer.desired_height(area.width).min(area.height);
        let [main, status, composer] = Layout::vertical([
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(composer_height),
        ])
        .areas(area);
        let (timeline, aside) = if self.aside.is_shown() {
            let [timeline, aside] =
                Layout::horizontal([Constraint::Min(1), Constraint::Length(ASIDE_WIDTH)])
                    .areas(main);
            (timeline, Some(aside))
        } else {
            (main, None)
        };
        ScreenLayout {
            timeline,
            aside,
            status,
            composer,
        }
    }

    fn draw(&mut self, tui: &mut Tui) -> anyhow::Result<()> {
        let size = tui.terminal.size()?;
        self.aside
            .set_visible(size.width >= ASIDE_MIN_TERMINAL_WIDTH);
        self.sync_refresh_timer();
        let layout = self.layout(Rect::new(0, 0, size.width, size.height));
        if let Some(timeline) = self.timeline.as_mut() {
            timeline.set_area(layout.timeline.width, layout.timeline.height);
        }

        tui.draw(|frame| {
            let area = frame.area();
            let buf = frame.buffer_mut();
            Clear.render(area, buf);
            self.render_screen(&layout, buf);
            if let Some(cursor) = self.composer.cursor_pos(layout.composer) {
                frame.set_cursor_position(cursor);
            }
        })?;
        Ok(())
    }

    fn render_screen(&self, layout: &ScreenLayout, buf: &mut Buffer) {
        match &self.timeline {
            Some(timeline) => timeline.render(layout.timeline, buf),
            None => Line::from("Connecting\u{2026}".dim()).render(layout.timeline, buf),
        }
        if let Some(aside) = layout.aside {
            self.aside.render(aside, buf);
        }
        self.status_line()
            .style(status_style())
            .render(layout.status, buf);
        self.composer.render(layout.composer, buf);
    }

    fn status_line(&self) -> Line<'static> {
        let mut spans: Vec<Span<'static>> = vec![" ".into()];
        match self.aside.summary() {
            Some(summary) => spans.push(format!("# {}", summary.title).bold()),
            None => spans.push("chatline".bold()),
        }
        if self.threads.len() > 1 {
            spans.push(format!("  {} threads \u{b7} ctrl+t next", self.threads.len()).into());
        }
        if let Some(timeline) = &self.timeline
            && !timeline.is_pinned()
        {
            spans.push("  \u{2193} more below".cyan());
        }
        if let Some(status) = &self.status {
            spans.push(format!("  {status}").red());
        }
        Line::from(spans)
    }
}

struct ScreenLayout {
    timeline: Rect,
    aside: Option<Rect>,
    status: Rect,
    composer: Rect,
}
