use std::fmt::Display;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use tempfile::NamedTempFile;
use toml_edit::DocumentMut;
use toml_edit::Item as TomlItem;
use toml_edit::Table as TomlTable;
use toml_edit::value;

/// Settings read from `config.toml`. Unset keys fall back to the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    pub scroll_slop: Option<usize>,
    pub scroll_debounce_ms: Option<u64>,
    pub emoji_table: Option<PathBuf>,
    pub aside_refresh_secs: Option<u64>,
}

/// A settable `table.key` in `config.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    ScrollSlop,
    ScrollDebounceMs,
    EmojiTable,
    AsideRefreshSecs,
}

impl ConfigKey {
    const ALL: [ConfigKey; 4] = [
        ConfigKey::ScrollSlop,
        ConfigKey::ScrollDebounceMs,
        ConfigKey::EmojiTable,
        ConfigKey::AsideRefreshSecs,
    ];

    fn table(self) -> &'static str {
        match self {
            ConfigKey::ScrollSlop | ConfigKey::ScrollDebounceMs => "timeline",
            ConfigKey::EmojiTable => "composer",
            ConfigKey::AsideRefreshSecs => "aside",
        }
    }

    fn key(self) -> &'static str {
        match self {
            ConfigKey::ScrollSlop => "scroll_slop",
            ConfigKey::ScrollDebounceMs => "scroll_debounce_ms",
            ConfigKey::EmojiTable => "emoji_table",
            ConfigKey::AsideRefreshSecs => "refresh_secs",
        }
    }

    fn is_path(self) -> bool {
        self == ConfigKey::EmojiTable
    }

    fn apply(self, config: &mut FileConfig, raw: &ConfigValue) {
        match (self, raw) {
            (ConfigKey::ScrollSlop, ConfigValue::Integer(n)) => {
                config.scroll_slop = usize::try_from(*n).ok();
            }
            (ConfigKey::ScrollDebounceMs, ConfigValue::Integer(n)) => {
                config.scroll_debounce_ms = u64::try_from(*n).ok();
            }
            (ConfigKey::AsideRefreshSecs, ConfigValue::Integer(n)) => {
                config.aside_refresh_secs = u64::try_from(*n).ok();
            }
            (ConfigKey::EmojiTable, ConfigValue::String(path)) => {
                config.emoji_table = Some(PathBuf::from(path));
            }
            (key, raw) => tracing::warn!("ignoring {key} = {raw:?}: wrong type"),
        }
    }
}

impl Display for ConfigKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.table(), self.key())
    }
}

impl FromStr for ConfigKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigKey::ALL
            .into_iter()
            .find(|key| key.to_string() == s)
            .ok_or_else(|| {
                let known = ConfigKey::ALL.map(|key| key.to_string()).join(", ");
                format!("unknown config key `{s}` (expected one of: {known})")
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ConfigValue {
    Integer(i64),
    String(String),
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn new_default() -> anyhow::Result<Self> {
        let Some(home) = dirs::home_dir() else {
            anyhow::bail!("cannot determine home directory for config path");
        };
        Ok(Self::new(default_config_path(&home)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Log file next to the config file.
    pub fn default_log_path(&self) -> PathBuf {
        self.path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("log")
            .join("chatline.log")
    }

    /// Reads every known key. A missing file is an empty config; a file that is not valid TOML
    /// is scanned line by line so one broken table does not discard the rest.
    pub fn load(&self) -> anyhow::Result<FileConfig> {
        let Some(content) = read_document_string(&self.path)? else {
            return Ok(FileConfig::default());
        };

        let mut config = FileConfig::default();
        match content.parse::<DocumentMut>() {
            Ok(doc) => {
                for key in ConfigKey::ALL {
                    if let Some(raw) = read_key(&doc, key) {
                        key.apply(&mut config, &raw);
                    }
                }
            }
            Err(err) => {
                tracing::warn!(
                    "{} is not valid TOML, using fallback parser: {err}",
                    self.path.display()
                );
                for key in ConfigKey::ALL {
                    if let Some(raw) = parse_key_fallback(&content, key) {
                        key.apply(&mut config, &raw);
                    }
                }
            }
        }
        Ok(config)
    }

    /// Writes one key, preserving the rest of the file (comments included).
    pub fn set(&self, key: ConfigKey, raw: &str) -> anyhow::Result<()> {
        let parsed = if key.is_path() {
            ConfigValue::String(raw.to_string())
        } else {
            let n = raw
                .trim()
                .parse::<u32>()
                .with_context(|| format!("{key} expects a non-negative integer, got `{raw}`"))?;
            ConfigValue::Integer(i64::from(n))
        };

        let content = read_document_string(&self.path)?.unwrap_or_default();
        let updated = match content.parse::<DocumentMut>() {
            Ok(mut doc) => {
                let table = ensure_table_for_write(&mut doc, key.table());
                table[key.key()] = match &parsed {
                    ConfigValue::Integer(n) => value(*n),
                    ConfigValue::String(s) => value(s.as_str()),
                };
                doc.to_string()
            }
            Err(_) => append_key_fallback(&content, key, &parsed),
        };

        write_atomic_text(&self.path, &updated)
    }
}

fn default_config_path(home: &Path) -> PathBuf {
    home.join(".chatline").join("config.toml")
}

fn read_key(doc: &DocumentMut, key: ConfigKey) -> Option<ConfigValue> {
    let item = doc
        .get(key.table())
        .and_then(TomlItem::as_table)
        .and_then(|table| table.get(key.key()))
        .and_then(TomlItem::as_value)?;
    if let Some(n) = item.as_integer() {
        return Some(ConfigValue::Integer(n));
    }
    item.as_str().map(|s| ConfigValue::String(s.to_string()))
}

fn parse_key_fallback(contents: &str, key: ConfigKey) -> Option<ConfigValue> {
    let mut in_table = false;
    let mut result = None;

    for line in contents.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with('[') {
            in_table = parse_table_header_name(trimmed) == Some(key.table());
            continue;
        }
        if !in_table {
            continue;
        }

        let Some(line) = strip_toml_comment(trimmed) else {
            continue;
        };
        let Some((name, raw)) = line.split_once('=') else {
            continue;
        };
        if name.trim() != key.key() {
            continue;
        }

        let raw = raw.trim();
        if let Some(quoted) = raw.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
            result = Some(ConfigValue::String(quoted.to_string()));
        } else if let Ok(n) = raw.parse::<i64>() {
            result = Some(ConfigValue::Integer(n));
        }
    }

    result
}

fn parse_table_header_name(line: &str) -> Option<&str> {
    let line = line.trim_start();
    if !line.starts_with('[') {
        return None;
    }
    let end = line.find(']')?;
    let name = line[1..end].trim();
    if name.is_empty() { None } else { Some(name) }
}

/// Drops a trailing `#` comment. Quoted values containing `#` are not supported here.
fn strip_toml_comment(line: &str) -> Option<&str> {
    let line = line.split_once('#').map_or(line, |(head, _)| head).trim();
    if line.is_empty() { None } else { Some(line) }
}

fn ensure_table_for_write<'a>(doc: &'a mut DocumentMut, key: &str) -> &'a mut TomlTable {
    if doc.get(key).and_then(TomlItem::as_table).is_none() {
        let mut table = TomlTable::new();
        table.set_implicit(false);
        doc[key] = TomlItem::Table(table);
    }
    match &mut doc[key] {
        TomlItem::Table(table) => table,
        _ => unreachable!("expected `{key}` to be a table"),
    }
}

fn append_key_fallback(existing: &str, key: ConfigKey, parsed: &ConfigValue) -> String {
    let mut out = existing.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push('\n');
    out.push_str(&format!("[{}]\n", key.table()));
    match parsed {
        ConfigValue::Integer(n) => out.push_str(&format!("{} = {n}\n", key.key())),
        ConfigValue::String(s) => out.push_str(&format!("{} = {s:?}\n", key.key())),
    }
    out
}

fn read_document_string(path: &Path) -> anyhow::Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(anyhow::Error::new(err).context(format!("read {}", path.display()))),
    }
}

/// Replaces `path` through a temp file in the same directory so readers never see a partial
/// config.
fn write_atomic_text(path: &Path, contents: &str) -> anyhow::Result<()> {
    let Some(parent) = path.parent() else {
        anyhow::bail!("invalid config path: {}", path.display());
    };
    std::fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;

    let mut tmp = NamedTempFile::new_in(parent).context("create temp file")?;
    use std::io::Write as _;
    tmp.write_all(contents.as_bytes())
        .context("write temp file")?;
    if !contents.ends_with('\n') {
        tmp.write_all(b"\n").context("write temp newline")?;
    }
    tmp.persist(path).map_err(|err| {
        anyhow::Error::new(err.error).context(format!("persist {}", path.display()))
    })?;
    Ok(())
}
