//! Frame types passed along the pipeline.
//!
//! ```text
//! AudioFrame (N mono samples) → SpectrumFrame (N/2 + 1 bins) → RenderFrame (one bar per column)
//! ```

use std::time::Duration;

/// One transform window of mono samples.
///
/// The sample buffer is allocated once and reused: the consumer copies each
/// published queue slot into the same `AudioFrame`.
///
/// # Example
///
/// ```
/// use cli_vis::AudioFrame;
///
/// let frame = AudioFrame::silent(1024);
/// assert_eq!(frame.samples().len(), 1024);
/// assert!(frame.samples().iter().all(|&s| s == 0.0));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    pub(crate) samples: Box<[f32]>,
    pub(crate) sequence: u64,
    pub(crate) timestamp: Duration,
    pub(crate) captured: usize,
}

impl AudioFrame {
    /// Creates a zeroed frame of `window_size` samples.
    pub fn silent(window_size: usize) -> Self {
        Self {
            samples: vec![0.0; window_size].into_boxed_slice(),
            sequence: 0,
            timestamp: Duration::ZERO,
            captured: 0,
        }
    }

    /// Creates a frame from mono samples, zero-padding or truncating to `window_size`.
    pub fn from_samples(samples: &[f32], window_size: usize, sequence: u64) -> Self {
        let mut frame = Self::silent(window_size);
        let captured = samples.len().min(window_size);
        frame.samples[..captured].copy_from_slice(&samples[..captured]);
        frame.captured = captured;
        frame.sequence = sequence;
        frame
    }

    /// Mono samples; always exactly the window size long.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Monotonic sequence number assigned by the capture bridge.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Capture time relative to the first sample of the stream.
    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    /// Number of samples that came from the device; the rest is zero padding.
    pub fn captured_len(&self) -> usize {
        self.captured
    }

    /// Window size N.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` if the frame has no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Magnitude spectrum of one [`AudioFrame`].
///
/// Holds `N/2 + 1` bins: bin 0 is DC, bin `N/2` is Nyquist.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumFrame {
    pub(crate) magnitudes: Box<[f32]>,
    pub(crate) levels: Box<[f32]>,
    pub(crate) sample_rate: u32,
    pub(crate) window_size: usize,
    pub(crate) sequence: u64,
}

impl SpectrumFrame {
    /// Creates an all-zero spectrum for a window of `window_size` samples.
    pub fn zeroed(window_size: usize, sample_rate: u32) -> Self {
        let bins = window_size / 2 + 1;
        Self {
            magnitudes: vec![0.0; bins].into_boxed_slice(),
            levels: vec![0.0; bins].into_boxed_slice(),
            sample_rate,
            window_size,
            sequence: 0,
        }
    }

    /// Builds a spectrum directly from display levels in [0, 1].
    ///
    /// Magnitudes mirror the levels. Useful for driving the renderer without a transform.
    pub fn from_levels(levels: &[f32], sample_rate: u32) -> Self {
        let clamped: Box<[f32]> = levels.iter().map(|l| l.clamp(0.0, 1.0)).collect();
        Self {
            magnitudes: clamped.clone(),
            levels: clamped,
            sample_rate,
            window_size: levels.len().saturating_sub(1) * 2,
            sequence: 0,
        }
    }

    /// Raw, non-negative, finite magnitudes.
    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    /// Scaled display levels, each within [0, 1].
    pub fn levels(&self) -> &[f32] {
        &self.levels
    }

    /// Sample rate of the analyzed audio.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Transform window size N.
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Sequence number of the source [`AudioFrame`].
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Center frequency of bin `k` in Hz (`k · sample_rate / N`).
    pub fn bin_frequency(&self, k: usize) -> f32 {
        if self.window_size == 0 {
            return 0.0;
        }
        k as f32 * self.sample_rate as f32 / self.window_size as f32
    }

    /// Index of the bin with the largest magnitude.
    pub fn peak_bin(&self) -> Option<usize> {
        self.magnitudes
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, _)| i)
    }
}

/// Drawable area of the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TerminalGeometry {
    /// Number of text rows.
    pub rows: u16,
    /// Number of text columns.
    pub columns: u16,
}

impl TerminalGeometry {
    /// Creates a geometry of `rows` × `columns`.
    pub fn new(rows: u16, columns: u16) -> Self {
        Self { rows, columns }
    }

    /// Tallest bar that fits (one row is kept free at the top).
    pub fn max_bar_height(&self) -> u16 {
        self.rows.saturating_sub(1)
    }
}

/// One column of the bar chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bar {
    /// Terminal column, 0-based from the left.
    pub column: u16,
    /// Filled cells counted from the bottom row, in `[0, rows - 1]`.
    pub height: u16,
}

/// Bar layout for one spectrum at one terminal geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderFrame {
    pub(crate) bars: Vec<Bar>,
    pub(crate) geometry: TerminalGeometry,
}

impl RenderFrame {
    /// Creates an empty layout with room for `columns` bars.
    pub fn with_capacity(columns: usize) -> Self {
        Self {
            bars: Vec::with_capacity(columns),
            geometry: TerminalGeometry::new(0, 0),
        }
    }

    /// Bars ordered by column.
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    /// Geometry this layout was computed for.
    pub fn geometry(&self) -> TerminalGeometry {
        self.geometry
    }

    /// Bar heights in column order.
    pub fn heights(&self) -> impl Iterator<Item = u16> + '_ {
        self.bars.iter().map(|bar| bar.height)
    }
}
