//! # cli-vis
//!
//! Live audio spectrum analyzer for the terminal.
//!
//! `cli-vis` captures audio from a CPAL device, turns fixed-size windows of
//! samples into a magnitude spectrum with a real FFT, and draws the spectrum as
//! a bar chart that fills the terminal.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cli_vis::source::CpalSource;
//! use cli_vis::terminal::CrosstermTerminal;
//! use cli_vis::{Controller, PipelineConfig};
//!
//! let mut config = PipelineConfig::default();
//! let source = CpalSource::open(&config.device)?;
//! let (sample_rate, channels) = source.native_config()?;
//! config.sample_rate = sample_rate;
//! config.channels = channels;
//!
//! let terminal = CrosstermTerminal::new(config.quit_key);
//! let stats = Controller::new(config, source, terminal).run()?;
//! println!("rendered {} frames", stats.frames_rendered);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! The crate maintains a strict thread boundary:
//!
//! - **Audio Thread**: Real-time callback that never blocks, allocates or locks
//! - **Frame Queue**: Lock-free SPSC ring of preallocated windows, drop-oldest when full
//! - **Controller Thread**: Transform, layout, terminal I/O and input at the display rate
//!
//! A slow terminal therefore costs display frames, never audio callbacks.

#![warn(missing_docs)]
// Audio code requires intentional numeric casts between sample formats
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]
// These doc lints are too strict for internal implementation details
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

mod config;
mod controller;
mod error;
pub mod event;
pub mod format;
mod frame;
pub mod pipeline;
mod session;
pub mod source;
pub mod terminal;

pub use config::{DeviceSelection, PipelineConfig, Scaling, WindowFunction, MAX_WINDOW_SIZE, MIN_WINDOW_SIZE};
pub use controller::{Controller, ControllerState};
pub use error::{AcquisitionError, RenderError, VisError};
pub use event::StreamEvent;
pub use frame::{AudioFrame, Bar, RenderFrame, SpectrumFrame, TerminalGeometry};
pub use session::{CancellationToken, SessionStats};
pub use source::{default_input_device_name, list_input_devices, AudioFrameSource};
