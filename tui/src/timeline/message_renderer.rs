//! Default display lines for a message.

use chatline_protocol::models::AttachmentInfo;
use chatline_protocol::models::DeliveryState;
use chatline_protocol::models::Message;
use chrono::Local;
use ratatui::style::Stylize;
use ratatui::text::Line;
use ratatui::text::Span;

use super::render_scheduler::ItemRenderer;
use crate::sanitize::HtmlSanitizer;
use crate::sanitize::Sanitize;
use crate::sanitize::plain_text;
use crate::sanitize::strip_control;

const BODY_INDENT: &str = "  ";

/// Renders a header (sender, local time, delivery marker), the body, attachment and error lines,
/// and a blank separator. Every string taken from the message is stripped of terminal control
/// sequences first.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageRenderer;

impl ItemRenderer for MessageRenderer {
    async fn render_item(&self, item: Message) -> anyhow::Result<Vec<Line<'static>>> {
        Ok(message_lines(&item))
    }
}

pub fn message_lines(message: &Message) -> Vec<Line<'static>> {
    let mut lines = vec![header_line(message)];

    let body = if message.text.is_empty() {
        message
            .html
            .as_deref()
            .map(|html| plain_text(&HtmlSanitizer.sanitize(html)))
            .unwrap_or_default()
    } else {
        strip_control(&message.text)
    };
    for line in body.lines() {
        lines.push(Line::from(format!("{BODY_INDENT}{line}")));
    }

    for attachment in &message.attachments {
        lines.push(attachment_line(attachment));
    }
    for error in &message.errors {
        let error = strip_control(error);
        lines.push(Line::from(vec![BODY_INDENT.into(), format!("! {error}").red()]));
    }
    lines.push(Line::default());
    lines
}

fn header_line(message: &Message) -> Line<'static> {
    let time = message.sent_at.with_timezone(&Local).format("%H:%M").to_string();
    let mut spans: Vec<Span<'static>> = Vec::new();
    if message.is_outgoing() {
        spans.push("you".green().bold());
    } else {
        spans.push(strip_control(&message.sender).cyan().bold());
    }
    spans.push(" ".into());
    spans.push(time.dim());
    if message.is_outgoing() {
        spans.push(" ".into());
        spans.push(match message.delivery {
            DeliveryState::Pending => "\u{2026}".dim(),
            DeliveryState::Sent => "\u{2713}".dim(),
            DeliveryState::Delivered => "\u{2713}\u{2713}".green(),
        });
    }
    Line::from(spans)
}

fn attachment_line(attachment: &AttachmentInfo) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = vec![
        BODY_INDENT.into(),
        "[file] ".magenta(),
        strip_control(&attachment.name).into(),
        format!(" ({})", format_size(attachment.size)).dim(),
    ];
    if !attachment.loaded {
        spans.push(" loading".dim().italic());
    }
    Line::from(spans)
}

fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatline_protocol::ThreadId;
    use chatline_protocol::models::ItemId;
    use chatline_protocol::models::ItemPosition;
    use chatline_protocol::models::MessageDirection;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn message(direction: MessageDirection, text: &str) -> Message {
        Message {
            id: ItemId::new(),
            position: ItemPosition(1),
            thread_id: ThreadId::new(),
            sender: "ada".to_string(),
            direction,
            sent_at: Utc::now(),
            text: text.to_string(),
            html: None,
            attachments: Vec::new(),
            delivery: DeliveryState::Delivered,
            errors: Vec::new(),
        }
    }

    fn flatten(line: &Line<'_>) -> String {
        line.spans.iter().map(|span| span.content.as_ref()).collect()
    }

    #[test]
    fn incoming_message_lines() {
        let lines = message_lines(&message(MessageDirection::Incoming, "hi\nthere"));
        let text: Vec<String> = lines.iter().map(flatten).collect();
        assert!(text[0].starts_with("ada "), "{:?}", text[0]);
        assert_eq!(&text[1..], ["  hi", "  there", ""]);
    }

    #[test]
    fn outgoing_message_shows_delivery_marker() {
        let lines = message_lines(&message(MessageDirection::Outgoing, "ok"));
        let header = flatten(&lines[0]);
        assert!(header.starts_with("you "), "{header:?}");
        assert!(header.ends_with("\u{2713}\u{2713}"), "{header:?}");
    }

    #[test]
    fn attachments_and_errors_get_their_own_lines() {
        let mut msg = message(MessageDirection::Outgoing, "");
        msg.html = Some("<p>from <b>html</b></p>".to_string());
        msg.attachments.push(AttachmentInfo {
            name: "cat.png".to_string(),
            size: 2048,
            content_type: "image/png".to_string(),
            loaded: false,
        });
        msg.errors.push("unknown recipient".to_string());

        let text: Vec<String> = message_lines(&msg).iter().map(flatten).collect();
        assert_eq!(
            &text[1..],
            [
                "  from html",
                "  [file] cat.png (2.0 KiB) loading",
                "  ! unknown recipient",
                "",
            ]
        );
    }

    #[test]
    fn control_sequences_from_the_service_are_not_rendered() {
        let mut msg = message(MessageDirection::Incoming, "hi\u{1b}[2J\u{1b}[31mred");
        msg.sender = "eve\u{1b}]0;owned\u{7}".to_string();
        msg.attachments.push(AttachmentInfo {
            name: "a\u{1b}[1mb.txt".to_string(),
            size: 1,
            content_type: "text/plain".to_string(),
            loaded: true,
        });
        msg.errors.push("bad\u{7}".to_string());

        let text: Vec<String> = message_lines(&msg).iter().map(flatten).collect();
        assert!(text[0].starts_with("eve "), "{:?}", text[0]);
        assert_eq!(
            &text[1..],
            ["  hired", "  [file] ab.txt (1 B)", "  ! bad", ""]
        );
        assert!(text.iter().all(|line| !line.chars().any(char::is_control)));

        let mut html_only = message(MessageDirection::Incoming, "");
        html_only.html = Some("<p>x\u{1b}[2Jy<script>z</script></p>".to_string());
        let text: Vec<String> = message_lines(&html_only).iter().map(flatten).collect();
        assert_eq!(text[1], "  xy");
    }

    #[test]
    fn sizes_use_binary_units() {
        assert_eq!(format_size(12), "12 B");
        assert_eq!(format_size(1536), "1.5 KiB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MiB");
    }
}
