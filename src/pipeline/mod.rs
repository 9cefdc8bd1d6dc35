//! Audio pipeline components.
//!
//! The pipeline connects the audio source to the terminal via a frame queue:
//!
//! ```text
//! Audio Thread → Capture Bridge → Frame Queue → Spectrum Engine → Bar Renderer → Terminal
//! ```
//!
//! - **Capture Bridge**: Downmixes each callback into one window and publishes it
//! - **Frame Queue**: Lock-free SPSC ring that drops the oldest frame when full
//! - **Spectrum Engine**: Windowed real FFT and display scaling
//! - **Bar Renderer**: Maps bins to columns and draws the bars
//!
//! The frame queue ensures the audio callback never blocks on the display.

mod capture;
mod queue;
mod render;
mod spectrum;

pub use capture::{BridgeCounters, CallbackStatus, CaptureBridge};
pub use queue::{frame_queue, FrameConsumer, FrameProducer, PushOutcome};
pub use render::BarRenderer;
pub use spectrum::SpectrumEngine;
