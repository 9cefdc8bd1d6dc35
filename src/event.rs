//! Runtime events reported by the audio backend.
//!
//! Events are non-fatal notifications unless [`StreamEvent::is_fatal`] says
//! otherwise. They travel from the backend's error callback to the
//! [`Controller`](crate::Controller) through a lock-free SPSC ring so the
//! reporting side never blocks.

use ringbuf::traits::Split;
use ringbuf::HeapRb;

/// Capacity of the event ring. Events beyond this are discarded until the controller drains it.
pub const EVENT_CAPACITY: usize = 64;

/// Producer half of the event ring, owned by the audio backend.
pub type EventProducer = ringbuf::HeapProd<StreamEvent>;

/// Consumer half of the event ring, owned by the controller.
pub type EventConsumer = ringbuf::HeapCons<StreamEvent>;

/// Runtime events emitted while audio is flowing.
///
/// # Example
///
/// ```
/// use cli_vis::StreamEvent;
///
/// fn describe(event: &StreamEvent) -> String {
///     match event {
///         StreamEvent::FramesDropped { total } => format!("{total} frames dropped"),
///         StreamEvent::StreamInterrupted { reason } => format!("interrupted: {reason}"),
///         StreamEvent::DeviceLost { reason } => format!("device lost: {reason}"),
///     }
/// }
///
/// assert_eq!(describe(&StreamEvent::FramesDropped { total: 3 }), "3 frames dropped");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The capture queue overwrote unconsumed frames.
    ///
    /// Emitted by the controller when it notices the drop counter moved.
    FramesDropped {
        /// Total frames dropped since the stream started.
        total: u64,
    },

    /// The backend reported a transient error; capture continues.
    StreamInterrupted {
        /// Description of what went wrong.
        reason: String,
    },

    /// The capture device disappeared. The run cannot continue.
    DeviceLost {
        /// Description reported by the backend.
        reason: String,
    },
}

impl StreamEvent {
    /// Returns `true` if the event ends the session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DeviceLost { .. })
    }
}

/// Creates the ring that carries [`StreamEvent`]s from the backend to the controller.
pub fn event_channel() -> (EventProducer, EventConsumer) {
    HeapRb::<StreamEvent>::new(EVENT_CAPACITY).split()
}
