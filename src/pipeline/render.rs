//! Bar layout and drawing.
//!
//! Each terminal column shows one bar. The Nyquist bin is left out, so a
//! window of N samples spreads N/2 bins (DC up to just below Nyquist) across
//! the columns:
//!
//! - More bins than columns: each column shows the loudest bin in its range
//! - Fewer bins than columns: neighbouring columns repeat the same bin
//!
//! Bars grow up from the bottom row; the top row is never filled.

use crate::terminal::TerminalBackend;
use crate::{Bar, PipelineConfig, RenderError, RenderFrame, SpectrumFrame, TerminalGeometry};

/// Maps spectra onto a terminal grid and draws them.
#[derive(Debug)]
pub struct BarRenderer {
    glyph: char,
    frame: RenderFrame,
}

impl BarRenderer {
    /// Creates a renderer drawing with `config.glyph`.
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            glyph: config.glyph,
            frame: RenderFrame::with_capacity(0),
        }
    }

    /// Computes one bar per column for `spectrum` at `geometry`.
    ///
    /// Heights are in `[0, rows - 1]` and never decrease as a level increases.
    pub fn layout(&mut self, spectrum: &SpectrumFrame, geometry: TerminalGeometry) -> &RenderFrame {
        let levels = usable_levels(spectrum.levels());
        let bins = levels.len();
        let columns = usize::from(geometry.columns);
        let max_height = geometry.max_bar_height();

        self.frame.geometry = geometry;
        self.frame.bars.clear();
        self.frame.bars.reserve(columns);

        for column in 0..geometry.columns {
            let c = usize::from(column);
            let level = if bins == 0 {
                0.0
            } else if bins >= columns {
                let start = c * bins / columns;
                let end = ((c + 1) * bins / columns).max(start + 1);
                levels[start..end].iter().copied().fold(0.0, f32::max)
            } else {
                levels[c * bins / columns]
            };
            self.frame.bars.push(Bar {
                column,
                height: bar_height(level, max_height),
            });
        }

        &self.frame
    }

    /// Clears the screen, draws the current layout bottom-up, then flushes.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Terminal`] if any terminal operation fails.
    pub fn draw<T: TerminalBackend + ?Sized>(&self, terminal: &mut T) -> Result<(), RenderError> {
        let bottom = self.frame.geometry.rows.saturating_sub(1);
        terminal.clear()?;
        for bar in &self.frame.bars {
            for j in 0..bar.height {
                terminal.draw_glyph(bottom - j, bar.column, self.glyph)?;
            }
        }
        terminal.flush()?;
        Ok(())
    }

    /// Queries the terminal size, lays out `spectrum` and draws it.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Terminal`] if the size query or drawing fails.
    pub fn render<T: TerminalBackend + ?Sized>(
        &mut self,
        spectrum: &SpectrumFrame,
        terminal: &mut T,
    ) -> Result<&RenderFrame, RenderError> {
        let geometry = terminal.geometry()?;
        self.layout(spectrum, geometry);
        self.draw(terminal)?;
        Ok(&self.frame)
    }
}

/// Drops the Nyquist bin when there is more than one bin.
fn usable_levels(levels: &[f32]) -> &[f32] {
    match levels.len() {
        0 | 1 => levels,
        n => &levels[..n - 1],
    }
}

fn bar_height(level: f32, max_height: u16) -> u16 {
    let level = if level.is_nan() { 0.0 } else { level.clamp(0.0, 1.0) };
    let height = (level * f32::from(max_height)).round();
    (height as u16).min(max_height)
}
