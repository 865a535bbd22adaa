mod backend;
mod config;

use std::fs::OpenOptions;
use std::num::NonZeroUsize;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chatline_tui::BackendChannels;
use chatline_tui::ChatlineTui;
use chatline_tui::ChatlineTuiConfig;
use chatline_tui::ExitReason;
use chatline_tui::ScrollPinConfig;
use clap::CommandFactory;
use clap::FromArgMatches;
use clap::Parser;
use clap::Subcommand;
use tokio::sync::mpsc::unbounded_channel;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::backend::LoopbackConfig;
use crate::config::ConfigKey;
use crate::config::ConfigStore;
use crate::config::FileConfig;

const DEFAULT_LOG_FILTER: &str = "chatline_tui=info,chatline_cli=info";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Terminal chat client with a live, ordered conversation timeline"
)]
struct Cli {
    /// Config file to read (and write with `chatline set`).
    #[arg(long, env = "CHATLINE_CONFIG")]
    config: Option<PathBuf>,

    /// Rows from the bottom within which the timeline still counts as pinned.
    #[arg(long)]
    scroll_slop: Option<usize>,

    /// Quiet period after the last scroll event before the scroll position is evaluated.
    #[arg(long)]
    scroll_debounce_ms: Option<u64>,

    /// Emoji JSON file (`short_names` / `unified` records) extending the built-in shortcodes.
    #[arg(long, env = "CHATLINE_EMOJI_TABLE")]
    emoji_table: Option<PathBuf>,

    /// Seconds between refreshes of the thread details panel.
    #[arg(long)]
    aside_refresh_secs: Option<u64>,

    /// Messages requested per "load more" page.
    #[arg(long, default_value = "20")]
    page_size: NonZeroUsize,

    /// Where to write logs. Defaults to `log/chatline.log` next to the config file.
    #[arg(long, env = "CHATLINE_LOG_FILE")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Persist a setting, e.g. `chatline set timeline.scroll_slop 4`.
    Set {
        key: ConfigKey,
        value: String,
    },
}

fn parse_cli() -> Cli {
    let matches = Cli::command()
        .version(chatline_tui::CHATLINE_VERSION)
        .get_matches();
    Cli::from_arg_matches(&matches).unwrap_or_else(|err| err.exit())
}

/// Flags win over the config file; the file wins over built-in defaults.
fn resolve_tui_config(cli: &Cli, file: FileConfig) -> ChatlineTuiConfig {
    let defaults = ScrollPinConfig::default();
    let scroll = ScrollPinConfig {
        slop: cli.scroll_slop.or(file.scroll_slop).unwrap_or(defaults.slop),
        debounce: cli
            .scroll_debounce_ms
            .or(file.scroll_debounce_ms)
            .map_or(defaults.debounce, Duration::from_millis),
    };
    let aside_refresh = cli
        .aside_refresh_secs
        .or(file.aside_refresh_secs)
        .filter(|secs| *secs > 0)
        .map_or(chatline_tui::DEFAULT_ASIDE_REFRESH, Duration::from_secs);
    ChatlineTuiConfig {
        scroll,
        aside_refresh,
        emoji_table: cli.emoji_table.clone().or(file.emoji_table),
        page_size: cli.page_size.get(),
        placeholder_text: "Write a message".to_string(),
    }
}

/// Routes `tracing` output to `path`; the terminal belongs to the UI.
fn init_logging(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))?;
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .with_target(false),
        )
        .with(filter)
        .try_init()
        .context("install tracing subscriber")?;
    Ok(())
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = parse_cli();
    let store = match &cli.config {
        Some(path) => ConfigStore::new(path.clone()),
        None => ConfigStore::new_default()?,
    };

    if let Some(CliCommand::Set { key, value }) = &cli.command {
        store
            .set(*key, value)
            .with_context(|| format!("update {}", store.path().display()))?;
        println!("{key} = {value} ({})", store.path().display());
        return Ok(());
    }

    let log_path = cli
        .log_file
        .clone()
        .unwrap_or_else(|| store.default_log_path());
    if let Err(err) = init_logging(&log_path) {
        eprintln!("warning: logging disabled: {err:#}");
    }

    let file_config = store.load().unwrap_or_else(|err| {
        tracing::warn!("ignoring unreadable config: {err:#}");
        FileConfig::default()
    });
    let tui_config = resolve_tui_config(&cli, file_config);
    tracing::info!(?tui_config, "starting chatline");

    let (op_tx, op_rx) = unbounded_channel();
    let (event_tx, event_rx) = unbounded_channel();
    let backend = tokio::spawn(backend::run_loopback_backend(
        LoopbackConfig::default(),
        op_rx,
        event_tx,
    ));

    let mut ui = ChatlineTui::new()?;
    let exit_info = ui
        .run(tui_config, BackendChannels { op_tx, event_rx })
        .await;
    // Restore the terminal before printing anything.
    drop(ui);

    if let Err(err) = backend.await.context("join loopback backend")? {
        tracing::warn!("loopback backend failed: {err:#}");
    }

    let exit_info = exit_info?;
    tracing::info!(?exit_info, "chatline exited");
    match exit_info.exit_reason {
        ExitReason::UserRequested => {}
        ExitReason::BackendClosed => eprintln!("chatline: connection to the thread service closed"),
        ExitReason::Fatal(message) => {
            eprintln!("chatline: {message}");
            std::process::exit(1);
        }
    }
    if exit_info.messages_sent > 0 {
        println!("Sent {} message(s).", exit_info.messages_sent);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn page_size_must_be_at_least_one() {
        assert!(Cli::try_parse_from(["chatline", "--page-size", "0"]).is_err());
        assert!(Cli::try_parse_from(["chatline", "--page-size", "5"]).is_ok());
    }

    #[test]
    fn set_subcommand_parses_dotted_key() {
        let cli = Cli::try_parse_from(["chatline", "set", "timeline.scroll_slop", "4"])
            .expect("parse args");
        let Some(CliCommand::Set { key, value }) = cli.command else {
            panic!("expected set command, got: {:?}", cli.command);
        };
        assert_eq!(key, ConfigKey::ScrollSlop);
        assert_eq!(value, "4");

        assert!(Cli::try_parse_from(["chatline", "set", "timeline.bogus", "4"]).is_err());
    }

    #[test]
    fn flags_override_config_file() {
        let cli = Cli::try_parse_from(["chatline", "--scroll-slop", "5"]).expect("parse args");
        let file = FileConfig {
            scroll_slop: Some(3),
            scroll_debounce_ms: Some(40),
            emoji_table: Some(PathBuf::from("emoji.json")),
            aside_refresh_secs: Some(0),
        };
        let config = resolve_tui_config(&cli, file);
        assert_eq!(config.scroll.slop, 5);
        assert_eq!(config.scroll.debounce, Duration::from_millis(40));
        assert_eq!(config.emoji_table, Some(PathBuf::from("emoji.json")));
        assert_eq!(config.aside_refresh, chatline_tui::DEFAULT_ASIDE_REFRESH);
        assert_eq!(config.page_size, 20);
    }

    #[test]
    fn defaults_apply_without_config() {
        let cli = Cli::try_parse_from(["chatline"]).expect("parse args");
        let config = resolve_tui_config(&cli, FileConfig::default());
        assert_eq!(config.scroll, ScrollPinConfig::default());
        assert_eq!(config.emoji_table, None);
    }
}
