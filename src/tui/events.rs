//! Terminal event polling

use crossterm::event::{self, KeyEvent};
use std::time::Duration;

/// Events the chat screen reacts to
#[derive(Debug, Clone)]
pub enum Event {
    Key(KeyEvent),
    /// Terminal was resized
    Resize(u16, u16),
    /// Bracketed paste
    Paste(String),
    /// Nothing happened within the poll timeout
    Tick,
}

/// Reads crossterm events with a timeout
#[derive(Debug)]
pub struct EventHandler {
    tick_rate: Duration,
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler {
    /// Create a new event handler with default tick rate (100ms)
    pub fn new() -> Self {
        Self {
            tick_rate: Duration::from_millis(100),
        }
    }

    /// Wait up to the tick rate for the next event
    pub fn poll(&self) -> anyhow::Result<Event> {
        if event::poll(self.tick_rate)? {
            Ok(convert_event(event::read()?))
        } else {
            Ok(Event::Tick)
        }
    }
}

fn convert_event(event: event::Event) -> Event {
    match event {
        event::Event::Key(key) => Event::Key(key),
        event::Event::Resize(cols, rows) => Event::Resize(cols, rows),
        event::Event::Paste(text) => Event::Paste(text),
        // Mouse and focus changes are treated as ticks
        _ => Event::Tick,
    }
}
