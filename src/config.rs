//! Configuration types for the visualizer pipeline.

use std::f32::consts::PI;
use std::time::Duration;

use crate::VisError;

/// Smallest supported transform window.
pub const MIN_WINDOW_SIZE: usize = 16;

/// Largest supported transform window.
pub const MAX_WINDOW_SIZE: usize = 65536;

/// Normalized magnitudes below this are treated as silence by [`Scaling::Decibel`].
const MAGNITUDE_EPSILON: f32 = 1e-10;

/// Window function applied to each frame before the transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum WindowFunction {
    /// Pass-through (no tapering).
    Rectangular,
    /// Raised cosine; good general-purpose leakage suppression.
    #[default]
    Hann,
    /// Raised cosine with a non-zero edge.
    Hamming,
    /// Three-term cosine with stronger sidelobe rejection.
    Blackman,
}

impl WindowFunction {
    /// Returns the coefficient for sample `index` of a window of `len` samples.
    #[must_use]
    pub fn coefficient(self, index: usize, len: usize) -> f32 {
        if len < 2 {
            return 1.0;
        }
        let phase = 2.0 * PI * index as f32 / (len - 1) as f32;
        match self {
            Self::Rectangular => 1.0,
            Self::Hann => 0.5 * (1.0 - phase.cos()),
            Self::Hamming => 0.54 - 0.46 * phase.cos(),
            Self::Blackman => 0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos(),
        }
    }
}

/// Maps a normalized magnitude (≈ 1.0 for a full-scale sine) to a display level in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scaling {
    /// `level = magnitude × gain`, clamped.
    Linear {
        /// Multiplier applied before clamping.
        gain: f32,
    },
    /// Logarithmic compression between `floor_db` (level 0) and 0 dBFS (level 1).
    Decibel {
        /// Level in dB that maps to an empty bar. Must be negative.
        floor_db: f32,
    },
}

impl Default for Scaling {
    fn default() -> Self {
        Self::Decibel { floor_db: -80.0 }
    }
}

impl Scaling {
    /// Applies the scaling. Never returns NaN; the result is always within [0, 1].
    #[must_use]
    pub fn level(self, normalized: f32) -> f32 {
        let normalized = if normalized.is_nan() { 0.0 } else { normalized };
        let level = match self {
            Self::Linear { gain } => normalized * gain,
            Self::Decibel { floor_db } => {
                let db = 20.0 * normalized.max(MAGNITUDE_EPSILON).log10();
                (db - floor_db) / -floor_db
            }
        };
        level.clamp(0.0, 1.0)
    }
}

/// Which audio device feeds the visualizer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeviceSelection {
    /// The host's default input device.
    #[default]
    DefaultInput,
    /// The host's default output device, captured as a loopback where the host supports it.
    DefaultOutput,
    /// An input device by exact name.
    ByName(String),
}

/// Immutable settings for one run of the pipeline.
///
/// Use [`PipelineConfig::default()`] for sensible defaults, or customize as needed.
///
/// # Example
///
/// ```
/// use cli_vis::{PipelineConfig, Scaling};
///
/// let config = PipelineConfig {
///     window_size: 2048,
///     scaling: Scaling::Linear { gain: 4.0 },
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Transform window size N. Must be a power of two.
    ///
    /// Default: 1024
    pub window_size: usize,

    /// Capture sample rate in Hz.
    ///
    /// Default: 44100
    pub sample_rate: u32,

    /// Interleaved channel count delivered by the device.
    ///
    /// Default: 2
    pub channels: u16,

    /// Window applied before the transform.
    pub window: WindowFunction,

    /// Magnitude-to-level mapping.
    pub scaling: Scaling,

    /// Number of frames the capture queue holds before dropping the oldest.
    ///
    /// Default: 8
    pub queue_capacity: usize,

    /// Display refresh rate in frames per second.
    ///
    /// Default: 30
    pub fps: u32,

    /// Device to capture from.
    pub device: DeviceSelection,

    /// Character used to draw bars.
    pub glyph: char,

    /// Key that ends the session (Esc and Ctrl-C always do).
    pub quit_key: char,

    /// Consecutive rejected callbacks tolerated before the stream is declared failed.
    ///
    /// Default: 50
    pub max_consecutive_failures: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_size: 1024,
            sample_rate: 44100,
            channels: 2,
            window: WindowFunction::default(),
            scaling: Scaling::default(),
            queue_capacity: 8,
            fps: 30,
            device: DeviceSelection::default(),
            glyph: '|',
            quit_key: 'q',
            max_consecutive_failures: 50,
        }
    }
}

impl PipelineConfig {
    /// Checks every invariant the pipeline relies on.
    ///
    /// # Errors
    ///
    /// Returns [`VisError::InvalidConfig`] naming the first violated constraint.
    pub fn validate(&self) -> Result<(), VisError> {
        if !self.window_size.is_power_of_two()
            || !(MIN_WINDOW_SIZE..=MAX_WINDOW_SIZE).contains(&self.window_size)
        {
            return Err(VisError::invalid_config(format!(
                "window size {} must be a power of two between {MIN_WINDOW_SIZE} and {MAX_WINDOW_SIZE}",
                self.window_size
            )));
        }
        if self.sample_rate == 0 {
            return Err(VisError::invalid_config("sample rate must be non-zero"));
        }
        if self.channels == 0 {
            return Err(VisError::invalid_config("channel count must be non-zero"));
        }
        if self.queue_capacity == 0 {
            return Err(VisError::invalid_config("queue capacity must be non-zero"));
        }
        if self.fps == 0 {
            return Err(VisError::invalid_config("refresh rate must be non-zero"));
        }
        match self.scaling {
            Scaling::Linear { gain } if !(gain.is_finite() && gain > 0.0) => {
                return Err(VisError::invalid_config("linear gain must be positive"));
            }
            Scaling::Decibel { floor_db } if !(floor_db.is_finite() && floor_db < 0.0) => {
                return Err(VisError::invalid_config("decibel floor must be negative"));
            }
            _ => {}
        }
        if self.glyph.is_control() {
            return Err(VisError::invalid_config("bar glyph must be printable"));
        }
        Ok(())
    }

    /// Number of bins in a spectrum frame (N/2 + 1).
    #[must_use]
    pub fn bin_count(&self) -> usize {
        self.window_size / 2 + 1
    }

    /// Time between display refreshes.
    #[must_use]
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.fps.max(1)
    }
}
