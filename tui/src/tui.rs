//! Terminal session: raw mode, alternate screen, and the merged input/draw event stream.

use std::io;
use std::io::Stdout;
use std::io::stdout;
use std::panic;

use crossterm::event::DisableBracketedPaste;
use crossterm::event::DisableMouseCapture;
use crossterm::event::EnableBracketedPaste;
use crossterm::event::EnableMouseCapture;
use crossterm::event::Event;
use crossterm::event::EventStream;
use crossterm::event::KeyEvent;
use crossterm::event::MouseEventKind;
use crossterm::execute;
use crossterm::terminal::EnterAlternateScreen;
use crossterm::terminal::LeaveAlternateScreen;
use crossterm::terminal::disable_raw_mode;
use crossterm::terminal::enable_raw_mode;
use ratatui::Frame;
use ratatui::backend::CrosstermBackend;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::mpsc::unbounded_channel;
use tokio_stream::StreamExt;

pub type Terminal = ratatui::Terminal<CrosstermBackend<Stdout>>;

/// Rows scrolled per mouse wheel notch.
const WHEEL_SCROLL_ROWS: isize = 3;

#[derive(Debug)]
pub enum TuiEvent {
    Key(KeyEvent),
    Paste(String),
    /// Mouse wheel, in rows; negative scrolls towards older content.
    Scroll(isize),
    Draw,
}

pub fn init() -> io::Result<Terminal> {
    set_panic_hook();
    enable_raw_mode()?;
    execute!(
        stdout(),
        EnterAlternateScreen,
        EnableBracketedPaste,
        EnableMouseCapture
    )?;
    ratatui::Terminal::new(CrosstermBackend::new(stdout()))
}

pub fn restore() -> io::Result<()> {
    execute!(
        stdout(),
        DisableMouseCapture,
        DisableBracketedPaste,
        LeaveAlternateScreen
    )?;
    disable_raw_mode()
}

fn set_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = restore();
        original_hook(panic_info);
    }));
}

/// Requests redraws from anywhere on the UI task.
#[derive(Clone, Debug)]
pub struct FrameRequester {
    draw_tx: UnboundedSender<()>,
}

impl FrameRequester {
    pub fn schedule_frame(&self) {
        let _ = self.draw_tx.send(());
    }
}

pub struct Tui {
    pub terminal: Terminal,
    events: EventStream,
    draw_tx: UnboundedSender<()>,
    draw_rx: UnboundedReceiver<()>,
}

impl Tui {
    pub fn new(terminal: Terminal) -> Self {
        let (draw_tx, draw_rx) = unbounded_channel();
        Self {
            terminal,
            events: EventStream::new(),
            draw_tx,
            draw_rx,
        }
    }

    pub fn frame_requester(&self) -> FrameRequester {
        FrameRequester {
            draw_tx: self.draw_tx.clone(),
        }
    }

    /// Next input or draw request. Queued draw requests are coalesced into one.
    /// Returns `None` once the terminal input stream ends.
    pub async fn next_event(&mut self) -> Option<TuiEvent> {
        loop {
            tokio::select! {
                Some(()) = self.draw_rx.recv() => {
                    while self.draw_rx.try_recv().is_ok() {}
                    return Some(TuiEvent::Draw);
                }
                maybe_event = self.events.next() => {
                    let event = match maybe_event {
                        Some(Ok(event)) => event,
                        Some(Err(err)) => {
                            tracing::warn!("terminal input error: {err}");
                            continue;
                        }
                        None => return None,
                    };
                    if let Some(event) = map_terminal_event(event) {
                        return Some(event);
                    }
                }
            }
        }
    }

    pub fn draw(&mut self, render: impl FnOnce(&mut Frame)) -> io::Result<()> {
        self.terminal.draw(render)?;
        Ok(())
    }
}

fn map_terminal_event(event: Event) -> Option<TuiEvent> {
    match event {
        Event::Key(key_event) => Some(TuiEvent::Key(key_event)),
        Event::Paste(pasted) => Some(TuiEvent::Paste(pasted)),
        Event::Resize(_, _) | Event::FocusGained => Some(TuiEvent::Draw),
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::ScrollUp => Some(TuiEvent::Scroll(-WHEEL_SCROLL_ROWS)),
            MouseEventKind::ScrollDown => Some(TuiEvent::Scroll(WHEEL_SCROLL_ROWS)),
            _ => None,
        },
        Event::FocusLost => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;
    use crossterm::event::MouseEvent;

    fn mouse(kind: MouseEventKind) -> Event {
        Event::Mouse(MouseEvent {
            kind,
            column: 0,
            row: 0,
            modifiers: KeyModifiers::NONE,
        })
    }

    #[test]
    fn wheel_maps_to_row_scrolling() {
        assert!(matches!(
            map_terminal_event(mouse(MouseEventKind::ScrollUp)),
            Some(TuiEvent::Scroll(-3))
        ));
        assert!(matches!(
            map_terminal_event(mouse(MouseEventKind::ScrollDown)),
            Some(TuiEvent::Scroll(3))
        ));
        assert!(map_terminal_event(mouse(MouseEventKind::Moved)).is_none());
        assert!(matches!(
            map_terminal_event(Event::Resize(80, 24)),
            Some(TuiEvent::Draw)
        ));
    }
}
