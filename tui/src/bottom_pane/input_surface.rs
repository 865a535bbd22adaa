//! The editable text surface owned by the composer.
//!
//! `InputSurface` is a plain text buffer with a byte-offset caret. All caret movement is
//! grapheme-aware; the caret is always kept on a grapheme boundary.

use std::ops::Range;

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use super::word_boundary::beginning_of_previous_word;
use super::word_boundary::end_of_next_word;

/// Where to leave the caret after replacing the whole content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaretPlacement {
    Start,
    Tail,
}

#[derive(Debug, Default, Clone)]
pub struct InputSurface {
    text: String,
    caret: usize,
}

impl InputSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn caret(&self) -> usize {
        self.caret
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn set_text(&mut self, text: impl Into<String>, placement: CaretPlacement) {
        self.text = text.into();
        self.caret = match placement {
            CaretPlacement::Start => 0,
            CaretPlacement::Tail => self.text.len(),
        };
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.caret = 0;
    }

    pub fn insert_str(&mut self, s: &str) {
        self.text.insert_str(self.caret, s);
        self.caret += s.len();
    }

    /// Deletes the grapheme before the caret. Returns whether anything was removed.
    pub fn delete_backward(&mut self) -> bool {
        let start = self.prev_boundary();
        self.delete_range(start..self.caret)
    }

    /// Deletes the grapheme after the caret.
    pub fn delete_forward(&mut self) -> bool {
        let end = self.next_boundary();
        self.delete_range(self.caret..end)
    }

    pub fn delete_word_backward(&mut self) -> bool {
        let start = beginning_of_previous_word(&self.text, self.caret);
        self.delete_range(start..self.caret)
    }

    /// Deletes from the caret back to the start of its line.
    pub fn delete_to_line_start(&mut self) -> bool {
        let start = self.line_range().start;
        self.delete_range(start..self.caret)
    }

    fn delete_range(&mut self, range: Range<usize>) -> bool {
        if range.is_empty() {
            return false;
        }
        self.caret = range.start;
        self.text.replace_range(range, "");
        true
    }

    pub fn move_left(&mut self) {
        self.caret = self.prev_boundary();
    }

    pub fn move_right(&mut self) {
        self.caret = self.next_boundary();
    }

    pub fn move_word_left(&mut self) {
        self.caret = beginning_of_previous_word(&self.text, self.caret);
    }

    pub fn move_word_right(&mut self) {
        self.caret = end_of_next_word(&self.text, self.caret);
    }

    pub fn move_line_start(&mut self) {
        self.caret = self.line_range().start;
    }

    pub fn move_line_end(&mut self) {
        self.caret = self.line_range().end;
    }

    /// Moves to the previous logical line, keeping the display column where possible.
    pub fn move_up(&mut self) {
        let line = self.line_range();
        if line.start == 0 {
            self.caret = 0;
            return;
        }
        let column = self.text[line.start..self.caret].width();
        let prev_end = line.start - 1;
        let prev_start = self.text[..prev_end].rfind('\n').map_or(0, |idx| idx + 1);
        self.caret = offset_at_column(&self.text, prev_start..prev_end, column);
    }

    /// Moves to the next logical line, keeping the display column where possible.
    pub fn move_down(&mut self) {
        let line = self.line_range();
        if line.end == self.text.len() {
            self.caret = self.text.len();
            return;
        }
        let column = self.text[line.start..self.caret].width();
        let next_start = line.end + 1;
        let next_end = self.text[next_start..]
            .find('\n')
            .map_or(self.text.len(), |idx| next_start + idx);
        self.caret = offset_at_column(&self.text, next_start..next_end, column);
    }

    /// Byte range of the logical line containing the caret, excluding its newline.
    fn line_range(&self) -> Range<usize> {
        let start = self.text[..self.caret].rfind('\n').map_or(0, |idx| idx + 1);
        let end = self.text[self.caret..]
            .find('\n')
            .map_or(self.text.len(), |idx| self.caret + idx);
        start..end
    }

    fn prev_boundary(&self) -> usize {
        self.text[..self.caret]
            .grapheme_indices(true)
            .next_back()
            .map_or(0, |(idx, _)| idx)
    }

    fn next_boundary(&self) -> usize {
        self.text[self.caret..]
            .graphemes(true)
            .next()
            .map_or(self.caret, |g| self.caret + g.len())
    }

    /// Splits the content into display rows no wider than `width` columns. Each row is a byte
    /// range into the text; newlines are not part of any row.
    pub fn wrapped_rows(&self, width: u16) -> Vec<Range<usize>> {
        let width = usize::from(width.max(1));
        let mut rows = Vec::new();
        let mut line_start = 0;
        for line in self.text.split('\n') {
            let mut row_start = line_start;
            let mut row_width = 0;
            for (idx, grapheme) in line.grapheme_indices(true) {
                let w = grapheme.width();
                if row_width + w > width && row_width > 0 {
                    rows.push(row_start..line_start + idx);
                    row_start = line_start + idx;
                    row_width = 0;
                }
                row_width += w;
            }
            rows.push(row_start..line_start + line.len());
            line_start += line.len() + 1;
        }
        rows
    }

    /// Row and column of the caret within [`Self::wrapped_rows`].
    pub fn caret_row_col(&self, width: u16) -> (usize, usize) {
        let rows = self.wrapped_rows(width);
        let mut found = (0, 0);
        for (row, range) in rows.iter().enumerate() {
            if range.start <= self.caret && self.caret <= range.end {
                found = (row, self.text[range.start..self.caret].width());
                // A caret at the exact end of a soft-wrapped row belongs to the next row.
                let continues_on_next_row = rows
                    .get(row + 1)
                    .is_some_and(|next| next.start == range.end);
                if self.caret < range.end || !continues_on_next_row {
                    return found;
                }
            }
        }
        found
    }
}

fn offset_at_column(text: &str, line: Range<usize>, column: usize) -> usize {
    let mut width = 0;
    for (idx, grapheme) in text[line.clone()].grapheme_indices(true) {
        let w = grapheme.width();
        if width + w > column {
            return line.start + idx;
        }
        width += w;
    }
    line.end
}
