//! Application-level events used to coordinate UI actions.
//!
//! Everything that completes asynchronously (renders, attachment reads, timers) re-enters the
//! UI loop through this channel, so view state is only ever mutated on the loop task.

use chatline_protocol::ThreadId;
use chatline_protocol::outgoing::OutgoingMessage;
use ratatui::text::Line;

use crate::timeline::RenderTicket;

#[derive(Debug)]
pub enum AppEvent {
    /// A render scheduled for `ticket` finished. Failures are delivered too so the timeline can
    /// record them.
    ItemRendered {
        thread_id: ThreadId,
        ticket: RenderTicket,
        result: anyhow::Result<Vec<Line<'static>>>,
    },

    /// The composer accepted a submission.
    Send(OutgoingMessage),

    /// The timeline was scrolled to the top while unpinned.
    LoadMoreRequested(ThreadId),

    /// Periodic refresh of the thread aside panel.
    RefreshAside,
}
