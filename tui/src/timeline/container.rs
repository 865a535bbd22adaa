//! Ordered storage for rendered message views.

use std::cell::Cell;

use chatline_protocol::models::ItemId;
use chatline_protocol::models::ItemPosition;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::text::Line;
use ratatui::widgets::Paragraph;
use ratatui::widgets::Widget;
use ratatui::widgets::Wrap;

/// The lines produced for one message, tagged with the position the message had when its render
/// was scheduled. The tag never changes afterwards.
#[derive(Debug)]
pub struct RenderedView {
    item_id: ItemId,
    position: ItemPosition,
    lines: Vec<Line<'static>>,
    /// `(width, height)` of the last wrap computation.
    height_cache: Cell<Option<(u16, usize)>>,
}

impl RenderedView {
    pub fn new(item_id: ItemId, position: ItemPosition, lines: Vec<Line<'static>>) -> Self {
        Self {
            item_id,
            position,
            lines,
            height_cache: Cell::new(None),
        }
    }

    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    pub fn position(&self) -> ItemPosition {
        self.position
    }

    pub fn lines(&self) -> &[Line<'static>] {
        &self.lines
    }

    /// Number of rows the view occupies when wrapped to `width`.
    pub fn height(&self, width: u16) -> usize {
        if let Some((cached_width, height)) = self.height_cache.get()
            && cached_width == width
        {
            return height;
        }
        let height = self.paragraph().line_count(width);
        self.height_cache.set(Some((width, height)));
        height
    }

    fn paragraph(&self) -> Paragraph<'static> {
        Paragraph::new(self.lines.clone()).wrap(Wrap { trim: false })
    }
}

/// The visible list of views, kept in ascending position order.
#[derive(Debug, Default)]
pub struct TimelineContainer {
    children: Vec<RenderedView>,
}

impl TimelineContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `view` before the first child with a greater position, or appends it. Returns the
    /// index it landed at.
    pub fn insert(&mut self, view: RenderedView) -> usize {
        let index = self
            .children
            .iter()
            .position(|child| child.position > view.position)
            .unwrap_or(self.children.len());
        self.children.insert(index, view);
        index
    }

    /// Swaps the lines of the view for the same item, keeping its position tag. Returns the old
    /// view, or gives `view` back when the item is not present.
    pub fn replace(&mut self, view: RenderedView) -> Result<RenderedView, RenderedView> {
        match self
            .children
            .iter_mut()
            .find(|child| child.item_id == view.item_id)
        {
            Some(child) => {
                let replacement = RenderedView::new(child.item_id, child.position, view.lines);
                Ok(std::mem::replace(child, replacement))
            }
            None => Err(view),
        }
    }

    pub fn remove(&mut self, item_id: ItemId) -> Option<RenderedView> {
        let index = self
            .children
            .iter()
            .position(|child| child.item_id == item_id)?;
        Some(self.children.remove(index))
    }

    pub fn contains(&self, item_id: ItemId) -> bool {
        self.children.iter().any(|child| child.item_id == item_id)
    }

    pub fn get(&self, item_id: ItemId) -> Option<&RenderedView> {
        self.children.iter().find(|child| child.item_id == item_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RenderedView> {
        self.children.iter()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn content_height(&self, width: u16) -> usize {
        self.children.iter().map(|child| child.height(width)).sum()
    }

    /// Draws the rows `[scroll_offset, scroll_offset + area.height)` of the stacked views.
    pub fn render(&self, area: Rect, buf: &mut Buffer, scroll_offset: usize) {
        let bottom = scroll_offset + usize::from(area.height);
        let mut top = 0;
        for child in &self.children {
            let height = child.height(area.width);
            let child_bottom = top + height;
            if child_bottom > scroll_offset && top < bottom {
                let skip = scroll_offset.saturating_sub(top);
                let y = area.y + u16::try_from(top.saturating_sub(scroll_offset)).unwrap_or(0);
                let visible = (child_bottom.min(bottom) - top.max(scroll_offset)) as u16;
                let child_area = Rect::new(area.x, y, area.width, visible);
                child
                    .paragraph()
                    .scroll((u16::try_from(skip).unwrap_or(u16::MAX), 0))
                    .render(child_area, buf);
            }
            if child_bottom >= bottom {
                break;
            }
            top = child_bottom;
        }
    }
}
