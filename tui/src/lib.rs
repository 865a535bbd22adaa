// Forbid accidental stdout/stderr writes in the library portion of the TUI.
#![deny(clippy::print_stdout, clippy::print_stderr)]

mod exit;

mod app_event;
mod app_event_sender;
mod aside;
mod bottom_pane;
mod chatline_tui;
mod error;
mod markdown;
mod render;
mod sanitize;
mod shortcodes;
mod style;
mod timeline;
mod tui;
mod version;

pub use aside::DEFAULT_ASIDE_REFRESH;
pub use chatline_tui::BackendChannels;
pub use chatline_tui::ChatlineTui;
pub use chatline_tui::ChatlineTuiConfig;
pub use error::ChatlineError;
pub use exit::AppExitInfo;
pub use exit::ExitReason;
pub use timeline::DEFAULT_SCROLL_DEBOUNCE;
pub use timeline::DEFAULT_SCROLL_SLOP;
pub use timeline::ScrollPinConfig;
pub use version::CHATLINE_VERSION;
