use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use chatline_protocol::ThreadId;
use chatline_protocol::models::ItemId;
use chatline_protocol::models::ItemPosition;
use chatline_protocol::models::Message;
use ratatui::text::Line;

use crate::app_event::AppEvent;
use crate::app_event_sender::AppEventSender;

/// Produces the display lines for one message.
///
/// Calls run concurrently and may finish in any order. An error only affects the message it was
/// produced for.
pub trait ItemRenderer: Send + Sync + 'static {
    fn render_item(
        &self,
        item: Message,
    ) -> impl Future<Output = anyhow::Result<Vec<Line<'static>>>> + Send;
}

/// Shared by every scheduler so tickets from an earlier mount of the same thread never match.
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Identifies one scheduled render. `position` is captured at schedule time and is the sort key
/// the finished view is inserted with; `generation` lets a newer render of the same item
/// supersede an older one that is still in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTicket {
    pub item_id: ItemId,
    pub position: ItemPosition,
    pub generation: u64,
}

/// Spawns renders and routes their results back through the app event channel.
pub struct RenderScheduler<R: ItemRenderer> {
    renderer: Arc<R>,
    app_event_tx: AppEventSender,
    thread_id: ThreadId,
}

impl<R: ItemRenderer> RenderScheduler<R> {
    pub fn new(renderer: Arc<R>, app_event_tx: AppEventSender, thread_id: ThreadId) -> Self {
        Self {
            renderer,
            app_event_tx,
            thread_id,
        }
    }

    /// Starts rendering `item`. The render cannot be cancelled; its result arrives as
    /// [`AppEvent::ItemRendered`] carrying the returned ticket, with a panic in the renderer
    /// reported as an error.
    pub fn schedule(&self, item: Message) -> RenderTicket {
        let ticket = RenderTicket {
            item_id: item.id,
            position: item.position,
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
        };
        let renderer = Arc::clone(&self.renderer);
        let app_event_tx = self.app_event_tx.clone();
        let thread_id = self.thread_id;
        tokio::spawn(async move {
            // A panicking renderer still reports back so the ticket is settled as failed.
            let render = tokio::spawn(async move { renderer.render_item(item).await });
            let result = match render.await {
                Ok(result) => result,
                Err(err) => Err(anyhow::anyhow!("render task failed: {err}")),
            };
            app_event_tx.send(AppEvent::ItemRendered {
                thread_id,
                ticket,
                result,
            });
        });
        ticket
    }
}
