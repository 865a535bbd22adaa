//! The bottom-pane footer renders transient hints and context indicators.
//!
//! The footer is pure rendering: it formats `FooterProps` into `Line`s without mutating any state.
//! Which mode is shown is decided by the `ChatComposer`.
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Stylize;
use ratatui::text::Line;
use ratatui::text::Span;
use ratatui::widgets::Paragraph;
use ratatui::widgets::Widget;

const FOOTER_INDENT_COLS: usize = 2;

/// The rendering inputs for the footer area under the composer.
#[derive(Clone, Copy, Debug)]
pub struct FooterProps {
    pub mode: FooterMode,
    pub attachment_count: usize,
    /// A send is in flight; the composer stays editable but shows a busy marker.
    pub loading: bool,
}

/// Selects which footer content is rendered.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FooterMode {
    ShortcutSummary,
    /// The draft has an unterminated ``` block, so Enter inserts a newline.
    LiteralBlock,
    /// A history entry is shown; `offset` counts back from the newest of `len` entries.
    HistoryRecall { offset: usize, len: usize },
}

pub fn footer_height(props: FooterProps) -> u16 {
    footer_lines(props).len() as u16
}

pub fn render_footer(area: Rect, buf: &mut Buffer, props: FooterProps) {
    let indent = " ".repeat(FOOTER_INDENT_COLS);
    let lines: Vec<Line<'static>> = footer_lines(props)
        .into_iter()
        .map(|line| {
            let mut spans = vec![Span::from(indent.clone())];
            spans.extend(line.spans);
            Line::from(spans)
        })
        .collect();
    Paragraph::new(lines).render(area, buf);
}

fn footer_lines(props: FooterProps) -> Vec<Line<'static>> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    if props.loading {
        spans.push("sending\u{2026}".cyan());
        spans.push(" \u{b7} ".dim());
    }
    match props.mode {
        FooterMode::ShortcutSummary => {
            spans.push(key("enter"));
            spans.push(" send".dim());
            spans.push(" \u{b7} ".dim());
            spans.push(key("shift+enter"));
            spans.push(" newline".dim());
            spans.push(" \u{b7} ".dim());
            spans.push(key("\u{2191}"));
            spans.push(" history".dim());
        }
        FooterMode::LiteralBlock => {
            spans.push("inside ``` block".magenta());
            spans.push(" \u{b7} ".dim());
            spans.push(key("enter"));
            spans.push(" newline".dim());
        }
        FooterMode::HistoryRecall { offset, len } => {
            spans.push(format!("history {offset}/{len}").dim());
            spans.push(" \u{b7} ".dim());
            spans.push(key("\u{2193}"));
            spans.push(" newer".dim());
        }
    }
    match props.attachment_count {
        0 => {}
        1 => {
            spans.push(" \u{b7} ".dim());
            spans.push("1 attachment".into());
        }
        n => {
            spans.push(" \u{b7} ".dim());
            spans.push(format!("{n} attachments").into());
        }
    }
    vec![Line::from(spans)]
}

fn key(label: &'static str) -> Span<'static> {
    Span::from(label).bold()
}
