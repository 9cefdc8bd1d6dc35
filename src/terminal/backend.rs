//! Crossterm-backed terminal.

use std::io::{self, Stdout, Write};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute, queue};

use super::{InputEvent, TerminalBackend};
use crate::TerminalGeometry;

/// Draws on the process's stdout using raw mode and the alternate screen.
pub struct CrosstermTerminal {
    out: Stdout,
    quit_key: char,
    active: bool,
}

impl CrosstermTerminal {
    /// Creates a terminal handle. Nothing changes until [`acquire()`](TerminalBackend::acquire).
    pub fn new(quit_key: char) -> Self {
        Self {
            out: io::stdout(),
            quit_key,
            active: false,
        }
    }

    fn classify_key(&self, key: KeyEvent) -> InputEvent {
        if key.kind != KeyEventKind::Press {
            return InputEvent::Other;
        }
        match key.code {
            KeyCode::Esc => InputEvent::Quit,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => InputEvent::Quit,
            KeyCode::Char(c) if c.eq_ignore_ascii_case(&self.quit_key) => InputEvent::Quit,
            _ => InputEvent::Other,
        }
    }
}

impl TerminalBackend for CrosstermTerminal {
    fn acquire(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        self.active = true;
        if let Err(e) = execute!(self.out, EnterAlternateScreen, cursor::Hide, Clear(ClearType::All)) {
            // The caller never sees an acquired terminal, so undo raw mode here.
            let _ = self.release();
            return Err(e);
        }
        tracing::debug!("Terminal acquired");
        Ok(())
    }

    fn release(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        // Leave raw mode even if the screen commands fail.
        let screen = execute!(self.out, cursor::Show, LeaveAlternateScreen);
        terminal::disable_raw_mode()?;
        tracing::debug!("Terminal released");
        screen
    }

    fn geometry(&self) -> io::Result<TerminalGeometry> {
        let (columns, rows) = terminal::size()?;
        Ok(TerminalGeometry::new(rows, columns))
    }

    fn clear(&mut self) -> io::Result<()> {
        queue!(self.out, Clear(ClearType::All))
    }

    fn draw_glyph(&mut self, row: u16, column: u16, glyph: char) -> io::Result<()> {
        queue!(self.out, cursor::MoveTo(column, row), Print(glyph))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    fn poll_input(&mut self, timeout: Duration) -> io::Result<Option<InputEvent>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        let input = match event::read()? {
            Event::Key(key) => self.classify_key(key),
            Event::Resize(columns, rows) => InputEvent::Resize(TerminalGeometry::new(rows, columns)),
            _ => InputEvent::Other,
        };
        Ok(Some(input))
    }
}

impl Drop for CrosstermTerminal {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!("Failed to restore terminal: {}", e);
        }
    }
}
