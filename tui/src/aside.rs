//! Thread details panel shown beside the timeline.

use std::time::Duration;

use chatline_protocol::models::ThreadSummary;
use chrono::DateTime;
use chrono::Utc;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Stylize;
use ratatui::text::Line;
use ratatui::widgets::Block;
use ratatui::widgets::Borders;
use ratatui::widgets::Paragraph;
use ratatui::widgets::Widget;
use tokio::task::JoinHandle;

use crate::app_event::AppEvent;
use crate::app_event_sender::AppEventSender;
use crate::render::renderable::Renderable;

pub const DEFAULT_ASIDE_REFRESH: Duration = Duration::from_secs(5);

/// Narrowest terminal that still has room for the panel.
pub const ASIDE_MIN_TERMINAL_WIDTH: u16 = 90;

pub const ASIDE_WIDTH: u16 = 30;

pub struct ThreadAside {
    summary: Option<ThreadSummary>,
    expanded: bool,
    visible: bool,
    /// Reference time for the relative age line, advanced by each refresh.
    now: DateTime<Utc>,
}

impl ThreadAside {
    pub fn new() -> Self {
        Self {
            summary: None,
            expanded: true,
            visible: false,
            now: Utc::now(),
        }
    }

    pub fn set_summary(&mut self, summary: ThreadSummary) {
        self.summary = Some(summary);
        self.now = Utc::now();
    }

    pub fn summary(&self) -> Option<&ThreadSummary> {
        self.summary.as_ref()
    }

    pub fn record_message(&mut self) {
        if let Some(summary) = self.summary.as_mut() {
            summary.message_count += 1;
        }
    }

    pub fn toggle_expanded(&mut self) {
        self.expanded = !self.expanded;
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Whether the panel is on screen and should keep its contents fresh.
    pub fn is_shown(&self) -> bool {
        self.expanded && self.visible && self.summary.is_some()
    }

    pub fn refresh(&mut self, now: DateTime<Utc>) {
        self.now = now;
    }

    fn lines(&self, width: u16) -> Vec<Line<'static>> {
        let Some(summary) = &self.summary else {
            return Vec::new();
        };
        let mut lines = vec![Line::from(summary.title.clone().bold()), Line::default()];
        let members = summary.members.join(", ");
        lines.push(Line::from(format!("{} members", summary.members.len()).dim()));
        for row in textwrap::wrap(&members, usize::from(width.max(1))) {
            lines.push(Line::from(row.into_owned()));
        }
        lines.push(Line::default());
        lines.push(Line::from(
            format!("{} messages", summary.message_count).dim(),
        ));
        lines.push(Line::from(
            format!("started {}", format_age(self.now - summary.started)).dim(),
        ));
        lines
    }
}

impl Default for ThreadAside {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderable for ThreadAside {
    fn render(&self, area: Rect, buf: &mut Buffer) {
        let block = Block::default().borders(Borders::LEFT).dim();
        let inner = block.inner(area);
        block.render(area, buf);
        let inner = Rect {
            x: inner.x.saturating_add(1).min(inner.right()),
            width: inner.width.saturating_sub(1),
            ..inner
        };
        Paragraph::new(self.lines(inner.width)).render(inner, buf);
    }

    fn desired_height(&self, width: u16) -> u16 {
        self.lines(width.saturating_sub(2)).len() as u16
    }
}

/// Coarse relative age, e.g. `3 minutes ago`.
pub fn format_age(age: chrono::TimeDelta) -> String {
    let seconds = age.num_seconds().max(0);
    let (value, unit) = match seconds {
        0..60 => return "just now".to_string(),
        60..3_600 => (seconds / 60, "minute"),
        3_600..86_400 => (seconds / 3_600, "hour"),
        _ => (seconds / 86_400, "day"),
    };
    let plural = if value == 1 { "" } else { "s" };
    format!("{value} {unit}{plural} ago")
}

/// Periodic [`AppEvent::RefreshAside`] ticks.
///
/// At most one timer task exists: arming always aborts the previous task first.
pub struct RefreshTimer {
    period: Duration,
    app_event_tx: AppEventSender,
    handle: Option<JoinHandle<()>>,
}

impl RefreshTimer {
    pub fn new(period: Duration, app_event_tx: AppEventSender) -> Self {
        Self {
            period,
            app_event_tx,
            handle: None,
        }
    }

    pub fn arm(&mut self) {
        self.disarm();
        let period = self.period;
        let app_event_tx = self.app_event_tx.clone();
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        self.handle = Some(tokio::spawn(async move {
            loop {
                interval.tick().await;
                app_event_tx.send(AppEvent::RefreshAside);
            }
        }));
    }

    pub fn disarm(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.disarm();
    }
}
