use ratatui::buffer::Buffer;
use ratatui::layout::Rect;

/// A pane of the conversation screen.
///
/// `desired_height` lets the runner size fixed panes (the composer) before laying out the
/// flexible ones (the timeline).
pub trait Renderable {
    fn render(&self, area: Rect, buf: &mut Buffer);
    fn desired_height(&self, width: u16) -> u16;
    fn cursor_pos(&self, _area: Rect) -> Option<(u16, u16)> {
        None
    }
}
