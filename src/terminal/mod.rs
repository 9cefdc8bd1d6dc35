//! Terminal abstraction for the bar chart display.
//!
//! A [`TerminalBackend`] is anything that can show a grid of glyphs and report
//! key presses. The crate provides [`CrosstermTerminal`] for real terminals;
//! tests drive the controller with an in-memory implementation.

mod backend;

pub use backend::CrosstermTerminal;

use std::io;
use std::time::Duration;

use crate::TerminalGeometry;

/// User input relevant to the visualizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// The user asked to quit (quit key, Esc or Ctrl-C).
    Quit,
    /// The terminal was resized.
    Resize(TerminalGeometry),
    /// Any other input; ignored.
    Other,
}

/// A character-cell display with keyboard input.
///
/// # Implementation Notes
///
/// - `acquire` puts the terminal in the mode needed for drawing (raw mode,
///   alternate screen, hidden cursor); `release` must undo all of it
/// - `release` is called at most once per successful `acquire`, on every exit path
/// - Rows count from the top, columns from the left, both 0-based
/// - Drawing calls may buffer; nothing is guaranteed visible before `flush`
///
/// # Example
///
/// ```
/// use std::io;
/// use std::time::Duration;
/// use cli_vis::terminal::{InputEvent, TerminalBackend};
/// use cli_vis::TerminalGeometry;
///
/// struct Headless;
///
/// impl TerminalBackend for Headless {
///     fn acquire(&mut self) -> io::Result<()> { Ok(()) }
///     fn release(&mut self) -> io::Result<()> { Ok(()) }
///     fn geometry(&self) -> io::Result<TerminalGeometry> { Ok(TerminalGeometry::new(24, 80)) }
///     fn clear(&mut self) -> io::Result<()> { Ok(()) }
///     fn draw_glyph(&mut self, _row: u16, _column: u16, _glyph: char) -> io::Result<()> { Ok(()) }
///     fn flush(&mut self) -> io::Result<()> { Ok(()) }
///     fn poll_input(&mut self, _timeout: Duration) -> io::Result<Option<InputEvent>> {
///         Ok(Some(InputEvent::Quit))
///     }
/// }
/// ```
pub trait TerminalBackend {
    /// Enters drawing mode.
    ///
    /// Errors here are fatal: the session does not start.
    fn acquire(&mut self) -> io::Result<()>;

    /// Restores the terminal to the state it had before [`acquire()`](Self::acquire).
    fn release(&mut self) -> io::Result<()>;

    /// Current drawable size.
    fn geometry(&self) -> io::Result<TerminalGeometry>;

    /// Clears the whole screen.
    fn clear(&mut self) -> io::Result<()>;

    /// Places one glyph at (`row`, `column`).
    fn draw_glyph(&mut self, row: u16, column: u16, glyph: char) -> io::Result<()>;

    /// Makes everything drawn since the last flush visible.
    fn flush(&mut self) -> io::Result<()>;

    /// Waits up to `timeout` for input. Returns `Ok(None)` if nothing arrived.
    fn poll_input(&mut self, timeout: Duration) -> io::Result<Option<InputEvent>>;
}
