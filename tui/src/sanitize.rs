//! Sanitization of composer content and of markup received from the thread service.
//!
//! Composer content is plain text: [`ControlSanitizer`] only strips terminal control sequences
//! from it, so anything the user types, `<` and `>` included, survives. Markup from the thread
//! service goes through [`HtmlSanitizer`], which keeps a small allow-list of inline formatting
//! tags, drops everything else, and strips control characters.
//!
//! Both sanitizers are idempotent: `sanitize(sanitize(x)) == sanitize(x)` for every input. The
//! composer relies on this to apply each step at most once per input event.

/// Maps raw content to safe content. Implementations must be deterministic and idempotent.
pub trait Sanitize: Send + Sync {
    fn sanitize(&self, raw: &str) -> String;
}

/// Sanitizer for text the user edits in the composer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ControlSanitizer;

impl Sanitize for ControlSanitizer {
    fn sanitize(&self, raw: &str) -> String {
        strip_control(raw)
    }
}

const ALLOWED_TAGS: &[&str] = &[
    "a",
    "b",
    "blockquote",
    "br",
    "code",
    "del",
    "div",
    "em",
    "i",
    "li",
    "ol",
    "p",
    "pre",
    "s",
    "span",
    "strong",
    "u",
    "ul",
];

/// Tags removed together with everything up to their closing tag.
const DROP_CONTENT_TAGS: &[&str] = &["embed", "iframe", "object", "script", "style", "template"];

const SAFE_URL_SCHEMES: &[&str] = &["http://", "https://", "mailto:"];

#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlSanitizer;

impl Sanitize for HtmlSanitizer {
    fn sanitize(&self, raw: &str) -> String {
        let mut current = strip_control(raw);
        loop {
            let next = sanitize_markup_once(&current);
            if next == current {
                return current;
            }
            current = next;
        }
    }
}

/// Returns the visible text of sanitized markup: tags are removed, `<br>` becomes a newline and
/// the basic entities are decoded.
pub fn plain_text(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut rest = markup;
    while let Some(idx) = rest.find('<') {
        out.push_str(&rest[..idx]);
        let candidate = &rest[idx..];
        match parse_tag(candidate) {
            Some(tag) => {
                if tag.name.eq_ignore_ascii_case("br") {
                    out.push('\n');
                }
                rest = &candidate[tag.len..];
            }
            None => {
                out.push('<');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    decode_basic_entities(&out)
}

fn decode_basic_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Removes ANSI escape sequences and control characters other than newline and tab. Carriage
/// returns are normalized to newlines.
pub fn strip_control(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\u{1b}' => match chars.peek() {
                Some('[') => {
                    chars.next();
                    // CSI: parameters and intermediates up to a final byte in 0x40..=0x7e.
                    for c in chars.by_ref() {
                        if ('\u{40}'..='\u{7e}').contains(&c) {
                            break;
                        }
                    }
                }
                Some(']') => {
                    chars.next();
                    // OSC: terminated by BEL or ST (ESC \).
                    while let Some(c) = chars.next() {
                        if c == '\u{7}' {
                            break;
                        }
                        if c == '\u{1b}' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                Some(_) => {
                    chars.next();
                }
                None => {}
            },
            '\r' => {
                if chars.peek() != Some(&'\n') {
                    out.push('\n');
                }
            }
            '\n' | '\t' => out.push(ch),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

fn sanitize_markup_once(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(idx) = rest.find('<') {
        out.push_str(&rest[..idx]);
        let candidate = &rest[idx..];

        if let Some(comment) = candidate.strip_prefix("<!--") {
            rest = match comment.find("-->") {
                Some(end) => &comment[end + 3..],
                None => "",
            };
            continue;
        }

        let Some(tag) = parse_tag(candidate) else {
            out.push('<');
            rest = &candidate[1..];
            continue;
        };

        let name = tag.name.to_ascii_lowercase();
        rest = &candidate[tag.len..];
        if DROP_CONTENT_TAGS.contains(&name.as_str()) {
            if !tag.closing {
                rest = skip_past_closing_tag(rest, &name);
            }
            continue;
        }
        if ALLOWED_TAGS.contains(&name.as_str()) {
            push_normalized_tag(&mut out, &name, &tag);
        }
    }
    out.push_str(rest);
    out
}

fn push_normalized_tag(out: &mut String, name: &str, tag: &Tag<'_>) {
    if tag.closing {
        if name != "br" {
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
        return;
    }

    out.push('<');
    out.push_str(name);
    if name == "a"
        && let Some(href) = tag.attr("href")
        && is_safe_href(href)
    {
        out.push_str(" href=\"");
        out.push_str(href);
        out.push('"');
    }
    out.push('>');
}

fn is_safe_href(href: &str) -> bool {
    if href.contains('"') {
        return false;
    }
    let lower = href.trim_start().to_ascii_lowercase();
    SAFE_URL_SCHEMES
        .iter()
        .any(|scheme| lower.starts_with(scheme))
}

fn skip_past_closing_tag<'a>(mut rest: &'a str, name: &str) -> &'a str {
    while let Some(idx) = rest.find("</") {
        let candidate = &rest[idx..];
        if let Some(tag) = parse_tag(candidate)
            && tag.closing
            && tag.name.eq_ignore_ascii_case(name)
        {
            return &candidate[tag.len..];
        }
        rest = &candidate[2..];
    }
    ""
}

#[derive(Debug)]
pub(crate) struct Tag<'a> {
    pub(crate) name: &'a str,
    pub(crate) closing: bool,
    attrs: Vec<(&'a str, Option<&'a str>)>,
    /// Byte length of the whole tag including the angle brackets.
    pub(crate) len: usize,
}

impl<'a> Tag<'a> {
    fn attr(&self, name: &str) -> Option<&'a str> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .and_then(|(_, value)| *value)
    }
}

/// Parses a complete tag at the start of `s`. Returns `None` when `s` does not start with a
/// well-formed tag, including an unterminated one, so partially typed tags stay literal text.
pub(crate) fn parse_tag(s: &str) -> Option<Tag<'_>> {
    let bytes = s.as_bytes();
    if bytes.first() != Some(&b'<') {
        return None;
    }
    let mut i = 1;
    let closing = bytes.get(i) == Some(&b'/');
    if closing {
        i += 1;
    }

    let name_start = i;
    if !bytes.get(i).is_some_and(u8::is_ascii_alphabetic) {
        return None;
    }
    while bytes
        .get(i)
        .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'-')
    {
        i += 1;
    }
    let name = &s[name_start..i];

    let mut attrs = Vec::new();
    loop {
        while bytes.get(i).is_some_and(u8::is_ascii_whitespace) {
            i += 1;
        }
        match bytes.get(i)? {
            b'>' => {
                return Some(Tag {
                    name,
                    closing,
                    attrs,
                    len: i + 1,
                });
            }
            b'/' => {
                i += 1;
            }
            _ => {
                let key_start = i;
                while bytes
                    .get(i)
                    .is_some_and(|b| !b.is_ascii_whitespace() && !matches!(b, b'=' | b'>' | b'/'))
                {
                    i += 1;
                }
                if i == key_start {
                    // A stray '=' with no attribute name.
                    i += 1;
                    continue;
                }
                let key = &s[key_start..i];
                let mut value = None;
                if bytes.get(i) == Some(&b'=') {
                    i += 1;
                    match bytes.get(i)? {
                        quote @ (b'"' | b'\'') => {
                            let quote = *quote;
                            let value_start = i + 1;
                            let len = bytes[value_start..].iter().position(|b| *b == quote)?;
                            value = Some(&s[value_start..value_start + len]);
                            i = value_start + len + 1;
                        }
                        _ => {
                            let value_start = i;
                            while bytes
                                .get(i)
                                .is_some_and(|b| !b.is_ascii_whitespace() && *b != b'>')
                            {
                                i += 1;
                            }
                            value = Some(&s[value_start..i]);
                        }
                    }
                }
                attrs.push((key, value));
            }
        }
    }
}
