//! `:name:` shortcode expansion.
//!
//! The table is built once per process: the built-in set plus, optionally, an emoji JSON file in
//! the common `short_names` / `unified` record format. It is never invalidated during a session.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::OnceLock;

use serde::Deserialize;

use crate::error::ChatlineError;

const BUILTIN_SHORTCODES: &[(&str, &str)] = &[
    ("+1", "\u{1f44d}"),
    ("-1", "\u{1f44e}"),
    ("100", "\u{1f4af}"),
    ("angry", "\u{1f620}"),
    ("beer", "\u{1f37a}"),
    ("blush", "\u{1f60a}"),
    ("broken_heart", "\u{1f494}"),
    ("bug", "\u{1f41b}"),
    ("cat", "\u{1f431}"),
    ("check", "\u{2714}\u{fe0f}"),
    ("clap", "\u{1f44f}"),
    ("coffee", "\u{2615}"),
    ("confused", "\u{1f615}"),
    ("cry", "\u{1f622}"),
    ("dog", "\u{1f436}"),
    ("eyes", "\u{1f440}"),
    ("fire", "\u{1f525}"),
    ("grin", "\u{1f601}"),
    ("heart", "\u{2764}\u{fe0f}"),
    ("joy", "\u{1f602}"),
    ("laughing", "\u{1f606}"),
    ("ok_hand", "\u{1f44c}"),
    ("party", "\u{1f389}"),
    ("pizza", "\u{1f355}"),
    ("pray", "\u{1f64f}"),
    ("rocket", "\u{1f680}"),
    ("scream", "\u{1f631}"),
    ("see_no_evil", "\u{1f648}"),
    ("shrug", "\u{1f937}"),
    ("slightly_smiling_face", "\u{1f642}"),
    ("smile", "\u{1f604}"),
    ("smiley", "\u{1f603}"),
    ("sob", "\u{1f62d}"),
    ("sparkles", "\u{2728}"),
    ("star", "\u{2b50}"),
    ("sunglasses", "\u{1f60e}"),
    ("tada", "\u{1f389}"),
    ("thinking", "\u{1f914}"),
    ("thumbsdown", "\u{1f44e}"),
    ("thumbsup", "\u{1f44d}"),
    ("warning", "\u{26a0}\u{fe0f}"),
    ("wave", "\u{1f44b}"),
    ("wink", "\u{1f609}"),
    ("x", "\u{274c}"),
];

#[derive(Debug, Deserialize)]
struct EmojiRecord {
    #[serde(default)]
    short_names: Vec<String>,
    unified: String,
}

#[derive(Debug, Clone, Default)]
pub struct ShortcodeTable {
    glyphs: HashMap<String, String>,
}

impl ShortcodeTable {
    pub fn builtin() -> Self {
        Self {
            glyphs: BUILTIN_SHORTCODES
                .iter()
                .map(|(name, glyph)| ((*name).to_string(), (*glyph).to_string()))
                .collect(),
        }
    }

    /// Parses an emoji table in the `[{ "short_names": [...], "unified": "1F600" }]` format.
    /// Records whose `unified` code points do not decode are skipped.
    pub fn from_emoji_json(json: &str) -> Result<Self, serde_json::Error> {
        let records: Vec<EmojiRecord> = serde_json::from_str(json)?;
        let mut glyphs = HashMap::new();
        for record in records {
            let Some(glyph) = decode_unified(&record.unified) else {
                continue;
            };
            for name in record.short_names {
                glyphs.insert(name, glyph.clone());
            }
        }
        Ok(Self { glyphs })
    }

    pub fn load_emoji_file(path: &Path) -> Result<Self, ChatlineError> {
        let json = std::fs::read_to_string(path).map_err(|source| ChatlineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_emoji_json(&json).map_err(|source| ChatlineError::EmojiTable {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Adds `other`'s entries, overriding existing names.
    pub fn extend(&mut self, other: ShortcodeTable) {
        self.glyphs.extend(other.glyphs);
    }

    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.glyphs.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    /// Replaces every `:name:` whose name resolves. Unresolved shortcodes pass through unchanged
    /// and are consumed as a whole, so their closing colon never opens another match.
    pub fn expand(&self, text: &str) -> String {
        let bytes = text.as_bytes();
        let mut out = String::with_capacity(text.len());
        let mut copied_up_to = 0;
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] != b':' {
                i += 1;
                continue;
            }
            let name_start = i + 1;
            let mut j = name_start;
            while j < bytes.len() && is_shortcode_byte(bytes[j]) {
                j += 1;
            }
            if j == name_start || bytes.get(j) != Some(&b':') {
                i += 1;
                continue;
            }
            if let Some(glyph) = self.resolve(&text[name_start..j]) {
                out.push_str(&text[copied_up_to..i]);
                out.push_str(glyph);
                copied_up_to = j + 1;
            }
            i = j + 1;
        }
        out.push_str(&text[copied_up_to..]);
        out
    }
}

fn is_shortcode_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'+' | b'-')
}

fn decode_unified(unified: &str) -> Option<String> {
    unified
        .split('-')
        .map(|part| u32::from_str_radix(part, 16).ok().and_then(char::from_u32))
        .collect()
}

static SHARED_TABLE: OnceLock<Arc<ShortcodeTable>> = OnceLock::new();

/// Returns the process-wide table, building it on first use.
///
/// `emoji_file` is only consulted by the call that performs the initialization; later calls get
/// the memoized table. A file that fails to load is logged and the built-in table is used alone.
pub fn shared_table(emoji_file: Option<&Path>) -> Arc<ShortcodeTable> {
    SHARED_TABLE
        .get_or_init(|| {
            let mut table = ShortcodeTable::builtin();
            if let Some(path) = emoji_file {
                match ShortcodeTable::load_emoji_file(path) {
                    Ok(extra) => {
                        tracing::info!(
                            "loaded {} shortcodes from {}",
                            extra.len(),
                            path.display()
                        );
                        table.extend(extra);
                    }
                    Err(err) => tracing::warn!("{err}"),
                }
            }
            Arc::new(table)
        })
        .clone()
}
