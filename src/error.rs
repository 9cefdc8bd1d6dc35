//! Error types for cli-vis.
//!
//! Errors are split into three categories:
//! - **Fatal errors** ([`VisError`]): Prevent the visualizer from starting or end the run
//! - **Per-frame errors** ([`RenderError`]): The current frame is skipped, the loop continues
//! - **Runtime events**: Drops and device hiccups surfaced via [`StreamEvent`](crate::StreamEvent)

/// Failures to obtain or start the audio stream.
///
/// Always fatal: the visualizer exits before the terminal display is set up.
#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    /// The requested audio device was not found.
    #[error("device not found: {name}")]
    DeviceNotFound {
        /// Name of the device that wasn't found.
        name: String,
    },

    /// No default input device is configured on this system.
    #[error("no default input device configured")]
    NoDefaultInputDevice,

    /// No default output device is configured on this system.
    #[error("no default output device configured")]
    NoDefaultOutputDevice,

    /// The device delivers a sample format the capture bridge cannot convert.
    #[error("unsupported sample format: {format}")]
    UnsupportedFormat {
        /// The format that wasn't supported.
        format: String,
    },

    /// An error from the underlying audio library (CPAL).
    #[error("audio backend error: {0}")]
    Backend(String),

    /// The stream was built but refused to start.
    #[error("audio stream failed to start: {0}")]
    StreamStart(String),
}

/// Fatal errors returned from [`Controller::run()`](crate::Controller::run).
///
/// Every variant maps to a non-zero process exit status.
#[derive(Debug, thiserror::Error)]
pub enum VisError {
    /// The audio stream could not be obtained or started.
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    /// The transform plan or its working buffers could not be allocated.
    #[error("failed to allocate {size}-point transform: {reason}")]
    TransformAllocation {
        /// Requested window size.
        size: usize,
        /// Why allocation failed.
        reason: String,
    },

    /// The pipeline configuration is not usable.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Which constraint was violated.
        reason: String,
    },

    /// Terminal control could not be acquired.
    #[error("terminal unavailable: {0}")]
    Terminal(#[source] std::io::Error),

    /// The running stream failed repeatedly or the device went away.
    #[error("audio stream failed: {reason}")]
    StreamFailed {
        /// Description of the failure.
        reason: String,
    },
}

impl VisError {
    /// Creates an invalid configuration error with the given reason.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Creates a stream failure with the given reason.
    pub fn stream_failed(reason: impl Into<String>) -> Self {
        Self::StreamFailed {
            reason: reason.into(),
        }
    }
}

/// Errors that skip a single frame without stopping the loop.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Writing to or querying the terminal failed.
    #[error("terminal write failed: {0}")]
    Terminal(#[from] std::io::Error),

    /// The transform rejected its buffers.
    #[error("transform failed: {reason}")]
    Transform {
        /// Description of what went wrong.
        reason: String,
    },
}

impl RenderError {
    /// Creates a transform error with the given reason.
    pub fn transform(reason: impl Into<String>) -> Self {
        Self::Transform {
            reason: reason.into(),
        }
    }
}
