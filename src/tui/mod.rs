//! Terminal chat screen
//!
//! A ratatui/crossterm front end over the chat controllers: chat list on the
//! left, transcript on the right, status banner and query input below.

mod app;
mod clipboard;
mod events;
mod input;
mod render;

pub use app::{ChatApp, Focus};
pub use clipboard::{ClipboardSink, CopyTarget, SystemClipboard};
pub use events::{Event, EventHandler};
pub use input::QueryInput;

use crossterm::{
    event::{DisableBracketedPaste, EnableBracketedPaste},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, Stdout};

type Term = Terminal<CrosstermBackend<Stdout>>;

/// Run the chat screen until the user quits
///
/// The terminal is restored even when the loop fails.
pub async fn run_chat_screen(mut app: ChatApp) -> anyhow::Result<()> {
    let mut terminal = setup_terminal()?;
    let result = event_loop(&mut terminal, &mut app).await;
    app.shutdown();
    restore_terminal(&mut terminal)?;
    result
}

async fn event_loop(terminal: &mut Term, app: &mut ChatApp) -> anyhow::Result<()> {
    let events = EventHandler::new();
    app.load().await;
    terminal.draw(|frame| render::draw(frame, app))?;

    while !app.should_quit() {
        let mut redraw = app.poll_background().await;
        match events.poll()? {
            // Banner and link previews change in the background
            Event::Tick => redraw = true,
            event => redraw |= app.handle_event(event).await,
        }
        if redraw {
            terminal.draw(|frame| render::draw(frame, app))?;
        }
    }
    Ok(())
}

fn setup_terminal() -> anyhow::Result<Term> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Term) -> anyhow::Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableBracketedPaste
    )?;
    terminal.show_cursor()?;
    Ok(())
}
