use ratatui::style::Color;
use ratatui::style::Style;

/// Background band behind the composer input rows.
pub fn composer_style() -> Style {
    Style::default().bg(Color::Indexed(236))
}

/// Status line under the timeline.
pub fn status_style() -> Style {
    Style::default().fg(Color::Gray).bg(Color::Indexed(238))
}
