//! Word-boundary helpers used by the input surface for word-wise navigation and deletion.
//!
//! Boundaries come from Unicode word segmentation, with ASCII punctuation additionally treated as
//! separators so `foo.bar` stops at the dot.

use unicode_segmentation::UnicodeSegmentation;

/// ASCII punctuation treated as word separators in addition to Unicode boundaries.
pub const WORD_SEPARATORS: &str = "`~!@#$%^&*()-=+[{]}\\|;:'\",.<>/?";

/// Return the byte index of the start of the previous word.
pub fn beginning_of_previous_word(text: &str, cursor_pos: usize) -> usize {
    let cursor_pos = clamp_pos_to_char_boundary(text, cursor_pos);
    segments(&text[..cursor_pos])
        .into_iter()
        .rev()
        .find(|(_, segment)| is_word(segment))
        .map(|(start, _)| start)
        .unwrap_or(0)
}

/// Return the byte index of the end of the next word.
pub fn end_of_next_word(text: &str, cursor_pos: usize) -> usize {
    let cursor_pos = clamp_pos_to_char_boundary(text, cursor_pos);
    segments(&text[cursor_pos..])
        .into_iter()
        .find(|(_, segment)| is_word(segment))
        .map(|(start, segment)| cursor_pos + start + segment.len())
        .unwrap_or(text.len())
}

/// Unicode word-bound segments, further split so every separator character stands alone.
fn segments(text: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    for (start, segment) in text.split_word_bound_indices() {
        let mut run_start = 0;
        for (idx, c) in segment.char_indices() {
            if WORD_SEPARATORS.contains(c) {
                if idx > run_start {
                    out.push((start + run_start, &segment[run_start..idx]));
                }
                let end = idx + c.len_utf8();
                out.push((start + idx, &segment[idx..end]));
                run_start = end;
            }
        }
        if run_start < segment.len() {
            out.push((start + run_start, &segment[run_start..]));
        }
    }
    out
}

fn is_word(segment: &str) -> bool {
    segment
        .chars()
        .any(|c| !c.is_whitespace() && !WORD_SEPARATORS.contains(c))
}

fn clamp_pos_to_char_boundary(text: &str, pos: usize) -> usize {
    let mut pos = pos.min(text.len());
    while pos > 0 && !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn previous_word_skips_trailing_whitespace() {
        let text = "hello brave world  ";
        assert_eq!(beginning_of_previous_word(text, text.len()), 12);
        assert_eq!(beginning_of_previous_word(text, 12), 6);
        assert_eq!(beginning_of_previous_word(text, 3), 0);
        assert_eq!(beginning_of_previous_word(text, 0), 0);
    }

    #[test]
    fn punctuation_separates_words() {
        let text = "foo.bar";
        assert_eq!(beginning_of_previous_word(text, text.len()), 4);
        assert_eq!(end_of_next_word(text, 0), 3);
        assert_eq!(end_of_next_word(text, 3), 7);
    }

    #[test]
    fn next_word_handles_non_ascii() {
        let text = "caf\u{e9} na\u{ef}ve";
        assert_eq!(end_of_next_word(text, 0), "caf\u{e9}".len());
        assert_eq!(end_of_next_word(text, "caf\u{e9}".len()), text.len());
        assert_eq!(end_of_next_word(text, text.len()), text.len());
    }
}
