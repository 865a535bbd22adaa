//! The conversation timeline.
//!
//! [`TimelineEngine`] coordinates three parts:
//!
//! - [`RenderScheduler`] renders each message off the UI task.
//! - [`TimelineContainer`] inserts finished renders ordered by the position captured when the
//!   render was scheduled, so completion order never affects display order.
//! - [`ScrollPinTracker`] keeps the viewport following new content while the user is at the
//!   bottom, and asks for older content when a scroll settles at the top.
//!
//! All state lives on the UI task. Render results re-enter through
//! [`AppEvent::ItemRendered`](crate::app_event::AppEvent::ItemRendered) and are handed to
//! [`TimelineEngine::on_item_rendered`].

mod container;
mod message_renderer;
mod render_scheduler;
mod scroll_pin;

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chatline_protocol::ThreadId;
use chatline_protocol::models::ItemId;
use chatline_protocol::models::ItemPosition;
use chatline_protocol::models::Message;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Stylize;
use ratatui::text::Line;
use ratatui::widgets::Widget;

pub use container::RenderedView;
pub use container::TimelineContainer;
pub use message_renderer::MessageRenderer;
pub use render_scheduler::ItemRenderer;
pub use render_scheduler::RenderScheduler;
pub use render_scheduler::RenderTicket;
pub use scroll_pin::DEFAULT_SCROLL_DEBOUNCE;
pub use scroll_pin::DEFAULT_SCROLL_SLOP;
pub use scroll_pin::MutationKind;
pub use scroll_pin::Observation;
pub use scroll_pin::ScrollPinConfig;
pub use scroll_pin::ScrollPinTracker;
pub use scroll_pin::ScrollState;
pub use scroll_pin::Viewport;

use crate::app_event::AppEvent;
use crate::app_event_sender::AppEventSender;
use crate::error::ChatlineError;
use crate::render::renderable::Renderable;

pub struct TimelineEngine<R: ItemRenderer = MessageRenderer> {
    thread_id: ThreadId,
    scheduler: RenderScheduler<R>,
    container: TimelineContainer,
    /// Latest scheduled render per item. Results for other tickets are stale.
    pending: HashMap<ItemId, RenderTicket>,
    failed: HashSet<ItemId>,
    tracker: ScrollPinTracker,
    viewport: Viewport,
    width: u16,
    /// Saved offset still waiting for enough content to be restored.
    pending_restore: Option<usize>,
    app_event_tx: AppEventSender,
}

impl<R: ItemRenderer> TimelineEngine<R> {
    /// Mounts an empty timeline for `thread_id`.
    ///
    /// A saved state that was pinned (or none at all) starts pinned to the bottom. Otherwise the
    /// saved offset is re-applied as content arrives until it can be reached.
    pub fn mount(
        thread_id: ThreadId,
        renderer: Arc<R>,
        app_event_tx: AppEventSender,
        config: ScrollPinConfig,
        restored: Option<ScrollState>,
    ) -> Self {
        let (state, pending_restore) = match restored {
            Some(saved) if !saved.pinned => (saved, Some(saved.last_known_offset)),
            _ => (ScrollState::default(), None),
        };
        tracing::debug!(%thread_id, ?state, "mounting timeline");
        Self {
            thread_id,
            scheduler: RenderScheduler::new(renderer, app_event_tx.clone(), thread_id),
            container: TimelineContainer::new(),
            pending: HashMap::new(),
            failed: HashSet::new(),
            tracker: ScrollPinTracker::new(config, state),
            viewport: Viewport::default(),
            width: 0,
            pending_restore,
            app_event_tx,
        }
    }

    /// Tears the timeline down and returns the state to restore on the next mount. Renders
    /// still in flight are dropped when they complete.
    pub fn unmount(mut self) -> ScrollState {
        if self.pending_restore.is_none() {
            self.tracker.refresh(&self.viewport);
        }
        let state = self.tracker.state();
        tracing::debug!(thread_id = %self.thread_id, ?state, "unmounting timeline");
        state
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn is_pinned(&self) -> bool {
        self.tracker.is_pinned()
    }

    #[cfg(test)]
    pub(crate) fn container(&self) -> &TimelineContainer {
        &self.container
    }

    #[cfg(test)]
    pub(crate) fn is_pending(&self, item_id: ItemId) -> bool {
        self.pending.contains_key(&item_id)
    }

    #[cfg(test)]
    pub(crate) fn pending_count(&self) -> usize {
        self.pending.len()
    }

    #[cfg(test)]
    pub(crate) fn has_failed(&self, item_id: ItemId) -> bool {
        self.failed.contains(&item_id)
    }

    /// Schedules a render for a newly observed message. Notifications for messages that are
    /// already rendered or rendering are ignored. Returns whether a render was scheduled.
    pub fn add_item(&mut self, item: Message) -> bool {
        if self.pending.contains_key(&item.id) || self.container.contains(item.id) {
            tracing::debug!(item_id = %item.id, "ignoring duplicate add");
            return false;
        }
        self.failed.remove(&item.id);
        let ticket = self.scheduler.schedule(item);
        self.pending.insert(ticket.item_id, ticket);
        true
    }

    /// Re-renders a message whose content changed. The replacement keeps the position the
    /// message was first displayed with.
    pub fn update_item(&mut self, mut item: Message) {
        let original = self
            .container
            .get(item.id)
            .map(RenderedView::position)
            .or_else(|| self.pending.get(&item.id).map(|ticket| ticket.position));
        match original {
            Some(position) => {
                item.position = position;
                let ticket = self.scheduler.schedule(item);
                self.pending.insert(ticket.item_id, ticket);
            }
            None => {
                self.add_item(item);
            }
        }
    }

    /// Drops a message from the timeline. A render still in flight is discarded on arrival.
    pub fn remove_item(&mut self, item_id: ItemId) {
        self.pending.remove(&item_id);
        self.failed.remove(&item_id);
        if self.container.remove(item_id).is_some() {
            self.relayout(Observation::Mutation(MutationKind::ChildList));
        }
    }

    /// Applies a finished render.
    pub fn on_item_rendered(
        &mut self,
        ticket: RenderTicket,
        result: anyhow::Result<Vec<Line<'static>>>,
    ) {
        if self.pending.get(&ticket.item_id) != Some(&ticket) {
            tracing::debug!(item_id = %ticket.item_id, "dropping stale render");
            return;
        }
        self.pending.remove(&ticket.item_id);

        let lines = match result {
            Ok(lines) => lines,
            Err(err) => {
                let err = ChatlineError::Render {
                    item_id: ticket.item_id,
                    message: format!("{err:#}"),
                };
                tracing::warn!("{err}");
                self.failed.insert(ticket.item_id);
                return;
            }
        };
        self.failed.remove(&ticket.item_id);

        if self.pending_restore.is_none() {
            self.tracker.refresh(&self.viewport);
        }
        let view = RenderedView::new(ticket.item_id, ticket.position, lines);
        let kind = match self.container.replace(view) {
            Ok(old) => {
                let new_height = self
                    .container
                    .get(ticket.item_id)
                    .map_or(0, |view| view.height(self.width));
                if old.height(self.width) == new_height {
                    MutationKind::CharacterData
                } else {
                    MutationKind::Subtree
                }
            }
            Err(view) => {
                self.container.insert(view);
                MutationKind::ChildList
            }
        };
        self.relayout(Observation::Mutation(kind));
    }

    /// Sets the area the timeline is drawn into.
    pub fn set_area(&mut self, width: u16, height: u16) {
        let viewport_height = usize::from(height);
        if width == self.width && viewport_height == self.viewport.viewport_height {
            return;
        }
        self.width = width;
        self.viewport.viewport_height = viewport_height;
        self.relayout(Observation::Resize);
    }

    /// User scroll input. The pin is re-evaluated once the burst settles (see [`Self::tick`]).
    pub fn scroll_by(&mut self, delta: isize, now: Instant) {
        self.pending_restore = None;
        self.viewport.scroll_by(delta);
        self.tracker.observe_scroll(now);
    }

    pub fn scroll_to_top(&mut self, now: Instant) {
        self.pending_restore = None;
        self.viewport.scroll_to(0);
        self.tracker.observe_scroll(now);
    }

    pub fn scroll_to_bottom(&mut self, now: Instant) {
        self.pending_restore = None;
        self.viewport.scroll_to(self.viewport.bottom_offset());
        self.tracker.observe_scroll(now);
    }

    /// Runs the debounced scroll evaluation when due, requesting older content if the user
    /// settled at the top.
    pub fn tick(&mut self, now: Instant) {
        if self.tracker.tick(now, &mut self.viewport) {
            tracing::info!(thread_id = %self.thread_id, "requesting older messages");
            self.app_event_tx
                .send(AppEvent::LoadMoreRequested(self.thread_id));
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.tracker.deadline()
    }

    /// Lowest position currently known, used to place an older page below it.
    pub fn oldest_position(&self) -> Option<ItemPosition> {
        self.container
            .iter()
            .map(RenderedView::position)
            .chain(self.pending.values().map(|ticket| ticket.position))
            .min()
    }

    fn relayout(&mut self, observation: Observation) {
        self.viewport.content_height = self.container.content_height(self.width);
        self.viewport.scroll_to(self.viewport.scroll_offset);
        if let Some(target) = self.pending_restore {
            self.viewport.scroll_to(target);
            if self.viewport.scroll_offset != target {
                return;
            }
            tracing::debug!(offset = target, "restored saved scroll offset");
            self.pending_restore = None;
        }
        self.tracker.observe(observation, &mut self.viewport);
    }
}

impl<R: ItemRenderer> Renderable for TimelineEngine<R> {
    fn render(&self, area: Rect, buf: &mut Buffer) {
        if self.container.is_empty() {
            let placeholder = if self.pending.is_empty() {
                "No messages yet."
            } else {
                "Loading\u{2026}"
            };
            Line::from(placeholder.dim()).render(area, buf);
            return;
        }
        self.container
            .render(area, buf, self.viewport.scroll_offset);
    }

    fn desired_height(&self, width: u16) -> u16 {
        u16::try_from(self.container.content_height(width)).unwrap_or(u16::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatline_protocol::models::DeliveryState;
    use chatline_protocol::models::MessageDirection;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::sync::mpsc::unbounded_channel;
    use tokio::sync::oneshot;

    /// One line per message: its text. Five-line messages make pin arithmetic easy to follow.
    #[derive(Default)]
    struct TextRenderer;

    impl ItemRenderer for TextRenderer {
        async fn render_item(&self, item: Message) -> anyhow::Result<Vec<Line<'static>>> {
            match item.text.as_str() {
                "boom" => anyhow::bail!("template exploded"),
                "panic" => panic!("renderer panicked"),
                _ => {}
            }
            Ok(item.text.lines().map(|line| Line::from(line.to_string())).collect())
        }
    }

    /// Holds every render until the test releases it.
    #[derive(Default)]
    struct GatedRenderer {
        gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    }

    impl GatedRenderer {
        fn gate(&self, text: &str) -> oneshot::Sender<()> {
            let (tx, rx) = oneshot::channel();
            self.gates
                .lock()
                .unwrap()
                .insert(text.to_string(), rx);
            tx
        }
    }

    impl ItemRenderer for GatedRenderer {
        async fn render_item(&self, item: Message) -> anyhow::Result<Vec<Line<'static>>> {
            let gate = self.gates.lock().unwrap().remove(&item.text);
            if let Some(gate) = gate {
                gate.await?;
            }
            Ok(vec![Line::from(item.text)])
        }
    }

    fn message(position: i64, text: &str) -> Message {
        Message {
            id: ItemId::new(),
            position: ItemPosition(position),
            thread_id: ThreadId::new(),
            sender: "ada".to_string(),
            direction: MessageDirection::Incoming,
            sent_at: Utc::now(),
            text: text.to_string(),
            html: None,
            attachments: Vec::new(),
            delivery: DeliveryState::Delivered,
            errors: Vec::new(),
        }
    }

    fn tall(position: i64, rows: usize) -> Message {
        message(position, &vec!["row"; rows].join("\n"))
    }

    fn engine<R: ItemRenderer>(
        renderer: R,
        restored: Option<ScrollState>,
    ) -> (TimelineEngine<R>, UnboundedReceiver<AppEvent>) {
        let (tx, rx) = unbounded_channel();
        let engine = TimelineEngine::mount(
            ThreadId::new(),
            Arc::new(renderer),
            AppEventSender::new(tx),
            ScrollPinConfig::default(),
            restored,
        );
        (engine, rx)
    }

    async fn next_render(
        rx: &mut UnboundedReceiver<AppEvent>,
    ) -> (RenderTicket, anyhow::Result<Vec<Line<'static>>>) {
        match rx.recv().await {
            Some(AppEvent::ItemRendered { ticket, result, .. }) => (ticket, result),
            other => panic!("expected a render result, got {other:?}"),
        }
    }

    /// Applies every render in flight, in completion order.
    async fn drain<R: ItemRenderer>(
        engine: &mut TimelineEngine<R>,
        rx: &mut UnboundedReceiver<AppEvent>,
    ) {
        while engine.pending_count() > 0 {
            let (ticket, result) = next_render(rx).await;
            engine.on_item_rendered(ticket, result);
        }
    }

    fn texts<R: ItemRenderer>(engine: &TimelineEngine<R>) -> Vec<String> {
        engine
            .container()
            .iter()
            .map(|view| {
                view.lines()
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .collect()
    }

    #[tokio::test]
    async fn out_of_order_results_are_inserted_by_position() {
        let (mut engine, mut rx) = engine(TextRenderer, None);
        engine.set_area(20, 10);
        for (position, text) in [(1, "one"), (2, "two"), (3, "three")] {
            engine.add_item(message(position, text));
        }

        let mut results = HashMap::new();
        for _ in 0..3 {
            let (ticket, result) = next_render(&mut rx).await;
            results.insert(ticket.position.0, (ticket, result));
        }
        for position in [3, 1, 2] {
            let (ticket, result) = results.remove(&position).expect("render result");
            engine.on_item_rendered(ticket, result);
        }
        assert_eq!(texts(&engine), vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn renders_completing_out_of_order_land_in_order() {
        let renderer = GatedRenderer::default();
        let gates: Vec<_> = ["one", "two", "three"]
            .iter()
            .map(|text| renderer.gate(text))
            .collect();
        let (mut engine, mut rx) = engine(renderer, None);
        engine.set_area(20, 10);
        engine.add_item(message(1, "one"));
        engine.add_item(message(2, "two"));
        engine.add_item(message(3, "three"));

        let mut gates: Vec<_> = gates.into_iter().map(Some).collect();
        for index in [2, 0, 1] {
            if let Some(gate) = gates[index].take() {
                gate.send(()).expect("render is waiting");
            }
            let (ticket, result) = next_render(&mut rx).await;
            assert_eq!(ticket.position, ItemPosition(index as i64 + 1));
            engine.on_item_rendered(ticket, result);
        }
        assert_eq!(texts(&engine), vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn duplicate_adds_are_ignored() {
        let (mut engine, mut rx) = engine(TextRenderer, None);
        let item = message(1, "once");
        assert!(engine.add_item(item.clone()));
        assert!(!engine.add_item(item.clone()));
        drain(&mut engine, &mut rx).await;
        assert!(!engine.add_item(item));
        assert_eq!(engine.container().len(), 1);
    }

    #[tokio::test]
    async fn removal_while_pending_never_shows_the_view() {
        let (mut engine, mut rx) = engine(TextRenderer, None);
        let item = message(1, "gone");
        let id = item.id;
        engine.add_item(item);
        engine.remove_item(id);
        assert!(!engine.is_pending(id));

        let (ticket, result) = next_render(&mut rx).await;
        engine.on_item_rendered(ticket, result);
        assert!(engine.container().is_empty());
    }

    #[tokio::test]
    async fn removal_after_insertion_removes_the_view() {
        let (mut engine, mut rx) = engine(TextRenderer, None);
        let keep = message(1, "keep");
        let gone = message(2, "gone");
        let gone_id = gone.id;
        engine.add_item(keep);
        engine.add_item(gone);
        drain(&mut engine, &mut rx).await;

        engine.remove_item(gone_id);
        assert_eq!(texts(&engine), vec!["keep"]);
    }

    #[tokio::test]
    async fn a_failed_render_does_not_affect_others() {
        let (mut engine, mut rx) = engine(TextRenderer, None);
        let bad = message(2, "boom");
        let bad_id = bad.id;
        engine.add_item(message(1, "before"));
        engine.add_item(bad);
        engine.add_item(message(3, "after"));
        drain(&mut engine, &mut rx).await;

        assert_eq!(texts(&engine), vec!["before", "after"]);
        assert!(engine.has_failed(bad_id));
    }

    #[tokio::test]
    async fn a_panicking_render_is_settled_as_failed() {
        let (mut engine, mut rx) = engine(TextRenderer, None);
        let bad = message(2, "panic");
        let bad_id = bad.id;
        engine.add_item(message(1, "before"));
        engine.add_item(bad);
        drain(&mut engine, &mut rx).await;

        assert_eq!(texts(&engine), vec!["before"]);
        assert!(!engine.is_pending(bad_id));
        assert!(engine.has_failed(bad_id));
    }

    #[tokio::test]
    async fn update_keeps_the_original_position_and_drops_stale_results() {
        let (mut engine, mut rx) = engine(TextRenderer, None);
        let first = message(1, "first");
        let mut second = message(2, "draft");
        engine.add_item(first);
        engine.add_item(second.clone());
        drain(&mut engine, &mut rx).await;

        second.position = ItemPosition(0);
        second.text = "edited".to_string();
        engine.update_item(second.clone());
        second.text = "edited twice".to_string();
        engine.update_item(second);
        drain(&mut engine, &mut rx).await;

        assert_eq!(texts(&engine), vec!["first", "edited twice"]);
        while let Ok(event) = rx.try_recv() {
            if let AppEvent::ItemRendered { ticket, result, .. } = event {
                engine.on_item_rendered(ticket, result);
            }
        }
        assert_eq!(texts(&engine), vec!["first", "edited twice"]);
    }

    #[tokio::test]
    async fn pinned_timeline_follows_new_content() {
        let (mut engine, mut rx) = engine(TextRenderer, None);
        engine.set_area(20, 10);
        engine.add_item(tall(1, 8));
        drain(&mut engine, &mut rx).await;
        assert_eq!(engine.viewport().scroll_offset, 0);
        assert!(engine.is_pinned());

        engine.add_item(tall(2, 8));
        drain(&mut engine, &mut rx).await;
        assert_eq!(engine.viewport().content_height, 16);
        assert_eq!(engine.viewport().scroll_offset, 6);
        assert!(engine.is_pinned());
    }

    #[tokio::test]
    async fn unpinned_timeline_stays_put_and_loads_more_at_the_top() {
        let (mut engine, mut rx) = engine(TextRenderer, None);
        engine.set_area(20, 10);
        engine.add_item(tall(1, 30));
        drain(&mut engine, &mut rx).await;
        assert_eq!(engine.viewport().scroll_offset, 20);

        let start = Instant::now();
        for step in 0..10u64 {
            engine.scroll_by(-3, start + Duration::from_millis(step));
            engine.tick(start + Duration::from_millis(step));
        }
        assert_eq!(engine.viewport().scroll_offset, 0);
        let settled = engine.next_deadline().expect("scroll evaluation pending");
        engine.tick(settled);
        assert!(!engine.is_pinned());

        let mut load_more = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, AppEvent::LoadMoreRequested(_)) {
                load_more += 1;
            }
        }
        assert_eq!(load_more, 1);

        engine.add_item(tall(2, 5));
        drain(&mut engine, &mut rx).await;
        assert_eq!(engine.viewport().scroll_offset, 0);
    }

    #[tokio::test]
    async fn unmount_and_mount_restore_the_saved_offset() {
        let (mut engine, mut rx) = engine(TextRenderer, None);
        engine.set_area(20, 10);
        engine.add_item(tall(1, 40));
        drain(&mut engine, &mut rx).await;
        engine.scroll_by(-12, Instant::now());
        let saved = engine.unmount();
        assert_eq!(
            saved,
            ScrollState {
                pinned: false,
                last_known_offset: 18,
            }
        );

        let (mut engine, mut rx) = self::engine(TextRenderer, Some(saved));
        engine.set_area(20, 10);
        assert!(!engine.is_pinned());
        engine.add_item(tall(1, 20));
        drain(&mut engine, &mut rx).await;
        assert_eq!(engine.viewport().scroll_offset, 10);
        engine.add_item(tall(2, 20));
        drain(&mut engine, &mut rx).await;
        assert_eq!(engine.viewport().scroll_offset, 18);
        engine.add_item(tall(3, 20));
        drain(&mut engine, &mut rx).await;
        assert_eq!(engine.viewport().scroll_offset, 18);
        assert!(!engine.is_pinned());
    }

    #[tokio::test]
    async fn pinned_unmount_starts_the_next_mount_at_the_bottom() {
        let (mut engine, mut rx) = engine(TextRenderer, None);
        engine.set_area(20, 10);
        engine.add_item(tall(1, 40));
        drain(&mut engine, &mut rx).await;
        let saved = engine.unmount();
        assert!(saved.pinned);

        let (mut engine, mut rx) = self::engine(TextRenderer, Some(saved));
        engine.set_area(20, 10);
        engine.add_item(tall(1, 25));
        drain(&mut engine, &mut rx).await;
        assert_eq!(engine.viewport().scroll_offset, 15);
        assert!(engine.is_pinned());
    }
}
