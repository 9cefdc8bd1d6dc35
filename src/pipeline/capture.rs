//! Capture bridge - the real-time side of the pipeline.
//!
//! The bridge is handed to an [`AudioFrameSource`](crate::source::AudioFrameSource)
//! and called from the audio thread with each batch of interleaved samples. It:
//! - Downmixes the configured channel count to mono
//! - Pads or truncates the batch to exactly one transform window
//! - Publishes the window into the frame queue, dropping the oldest frame if full
//! - Reduces every failure to a [`CallbackStatus`] and a counter
//!
//! Nothing here allocates, locks, logs or panics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cpal::{FromSample, Sample};

use crate::format::downmix;
use crate::pipeline::{FrameProducer, PushOutcome};
use crate::{CancellationToken, PipelineConfig};

/// What happened to one audio callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackStatus {
    /// A frame was published into a free slot.
    Delivered,
    /// A frame was published by overwriting the oldest unconsumed one.
    Overwrote,
    /// Shutdown was requested; the batch was ignored.
    Cancelled,
    /// The batch was malformed and ignored.
    Rejected,
}

impl CallbackStatus {
    /// Returns `true` if a frame reached the queue.
    pub fn is_success(self) -> bool {
        matches!(self, Self::Delivered | Self::Overwrote)
    }
}

/// Counters written by the audio thread and read by the controller.
#[derive(Debug, Default)]
pub struct BridgeCounters {
    callback_failures: AtomicU64,
    consecutive_failures: AtomicU64,
}

impl BridgeCounters {
    /// Total rejected callbacks.
    pub fn callback_failures(&self) -> u64 {
        self.callback_failures.load(Ordering::Relaxed)
    }

    /// Rejected callbacks since the last successful one.
    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    fn record(&self, status: CallbackStatus) {
        match status {
            CallbackStatus::Delivered | CallbackStatus::Overwrote => {
                self.consecutive_failures.store(0, Ordering::Relaxed);
            }
            CallbackStatus::Rejected => {
                self.callback_failures.fetch_add(1, Ordering::Relaxed);
                self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
            }
            CallbackStatus::Cancelled => {}
        }
    }
}

/// Real-time handoff from the audio callback into the frame queue.
pub struct CaptureBridge {
    producer: FrameProducer,
    channels: usize,
    sample_rate: u32,
    frames_seen: u64,
    cancel: CancellationToken,
    counters: Arc<BridgeCounters>,
}

impl CaptureBridge {
    /// Creates a bridge that publishes into `producer`.
    pub fn new(producer: FrameProducer, config: &PipelineConfig, cancel: CancellationToken) -> Self {
        Self {
            producer,
            channels: usize::from(config.channels),
            sample_rate: config.sample_rate,
            frames_seen: 0,
            cancel,
            counters: Arc::new(BridgeCounters::default()),
        }
    }

    /// Shared handle to the failure counters.
    pub fn counters(&self) -> Arc<BridgeCounters> {
        Arc::clone(&self.counters)
    }

    /// Interleaved channel count this bridge expects.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Sample rate the timestamps are computed for.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Handles one batch of `frame_count` interleaved frames from the audio thread.
    ///
    /// Real-time safe: bounded by the window size, no allocation, no locks.
    pub fn on_audio_callback<T>(&mut self, raw_samples: &[T], frame_count: usize) -> CallbackStatus
    where
        T: Sample,
        f32: FromSample<T>,
    {
        let status = self.handle_batch(raw_samples, frame_count);
        self.counters.record(status);
        status
    }

    fn handle_batch<T>(&mut self, raw_samples: &[T], frame_count: usize) -> CallbackStatus
    where
        T: Sample,
        f32: FromSample<T>,
    {
        if self.cancel.is_cancelled() {
            return CallbackStatus::Cancelled;
        }
        let channels = self.channels;
        if channels == 0 || frame_count.checked_mul(channels).map_or(true, |n| raw_samples.len() < n) {
            return CallbackStatus::Rejected;
        }

        let window = self.producer.window_size();
        let captured = frame_count.min(window);
        let timestamp = self.timestamp();
        self.frames_seen += frame_count as u64;

        let outcome = self.producer.publish(timestamp, captured, |i| {
            if i < captured {
                downmix(&raw_samples[i * channels..(i + 1) * channels])
            } else {
                0.0
            }
        });

        match outcome {
            PushOutcome::Enqueued => CallbackStatus::Delivered,
            PushOutcome::Overwrote => CallbackStatus::Overwrote,
        }
    }

    /// Position of the next batch, from the number of frames captured so far.
    fn timestamp(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        let rate = u64::from(self.sample_rate);
        let secs = self.frames_seen / rate;
        let nanos = (self.frames_seen % rate) * 1_000_000_000 / rate;
        Duration::new(secs, nanos as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::frame_queue;

    fn bridge(window_size: usize, channels: u16, capacity: usize) -> (CaptureBridge, crate::pipeline::FrameConsumer) {
        let config = PipelineConfig {
            window_size,
            channels,
            sample_rate: 8000,
            queue_capacity: capacity,
            ..Default::default()
        };
        let (producer, consumer) = frame_queue(config.window_size, config.queue_capacity);
        (
            CaptureBridge::new(producer, &config, CancellationToken::new()),
            consumer,
        )
    }

    #[test]
    fn test_downmixes_and_pads() {
        let (mut bridge, mut consumer) = bridge(16, 2, 4);
        let raw = [0.2f32, 0.4, -0.5, 0.5, 1.0, 0.0];

        assert_eq!(bridge.on_audio_callback(&raw, 3), CallbackStatus::Delivered);

        let frame = consumer.pop().unwrap();
        assert_eq!(frame.len(), 16);
        assert_eq!(frame.captured_len(), 3);
        assert!((frame.samples()[0] - 0.3).abs() < 1e-6);
        assert_eq!(frame.samples()[1], 0.0);
        assert!((frame.samples()[2] - 0.5).abs() < 1e-6);
        assert!(frame.samples()[3..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_truncates_long_batches() {
        let (mut bridge, mut consumer) = bridge(16, 1, 4);
        let raw: Vec<f32> = (0..40).map(|i| i as f32 / 100.0).collect();

        assert!(bridge.on_audio_callback(&raw, 40).is_success());

        let frame = consumer.pop().unwrap();
        assert_eq!(frame.len(), 16);
        assert_eq!(frame.captured_len(), 16);
        assert!((frame.samples()[15] - 0.15).abs() < 1e-6);
    }

    #[test]
    fn test_converts_integer_samples() {
        let (mut bridge, mut consumer) = bridge(16, 2, 4);
        let raw = [i16::MAX, i16::MAX, 0, 0];

        assert!(bridge.on_audio_callback(&raw, 2).is_success());

        let frame = consumer.pop().unwrap();
        assert!((frame.samples()[0] - 1.0).abs() < 0.001);
        assert_eq!(frame.samples()[1], 0.0);
    }

    #[test]
    fn test_sequence_and_timestamp_advance() {
        let (mut bridge, mut consumer) = bridge(16, 1, 4);
        let raw = [0.0f32; 4000];
        bridge.on_audio_callback(&raw, 4000);
        bridge.on_audio_callback(&raw, 4000);

        let first = consumer.pop().unwrap().clone();
        let second = consumer.pop().unwrap();
        assert_eq!(first.sequence(), 0);
        assert_eq!(second.sequence(), 1);
        assert_eq!(first.timestamp(), Duration::ZERO);
        assert_eq!(second.timestamp(), Duration::from_millis(500));
    }

    #[test]
    fn test_rejects_short_buffers() {
        let (mut bridge, mut consumer) = bridge(16, 2, 4);
        let raw = [0.1f32; 3];

        assert_eq!(bridge.on_audio_callback(&raw, 2), CallbackStatus::Rejected);
        assert_eq!(bridge.on_audio_callback(&raw, 2), CallbackStatus::Rejected);
        assert!(consumer.pop().is_none());

        let counters = bridge.counters();
        assert_eq!(counters.callback_failures(), 2);
        assert_eq!(counters.consecutive_failures(), 2);

        assert!(bridge.on_audio_callback(&raw, 1).is_success());
        assert_eq!(counters.consecutive_failures(), 0);
        assert_eq!(counters.callback_failures(), 2);
    }

    #[test]
    fn test_overflow_reports_overwrite() {
        let (mut bridge, consumer) = bridge(16, 1, 2);
        let raw = [0.5f32; 16];

        assert_eq!(bridge.on_audio_callback(&raw, 16), CallbackStatus::Delivered);
        assert_eq!(bridge.on_audio_callback(&raw, 16), CallbackStatus::Delivered);
        assert_eq!(bridge.on_audio_callback(&raw, 16), CallbackStatus::Overwrote);
        assert_eq!(consumer.dropped(), 1);
        assert_eq!(consumer.len(), 2);
    }

    #[test]
    fn test_cancelled_bridge_ignores_audio() {
        let config = PipelineConfig {
            window_size: 16,
            channels: 1,
            ..Default::default()
        };
        let (producer, mut consumer) = frame_queue(16, 2);
        let cancel = CancellationToken::new();
        let mut bridge = CaptureBridge::new(producer, &config, cancel.clone());

        cancel.cancel();
        assert_eq!(bridge.on_audio_callback(&[0.5f32; 16], 16), CallbackStatus::Cancelled);
        assert!(consumer.pop().is_none());
        assert_eq!(bridge.counters().callback_failures(), 0);
    }

    #[test]
    fn test_sanitizes_non_finite_input() {
        let (mut bridge, mut consumer) = bridge(16, 1, 2);
        let raw = [f32::NAN, f32::INFINITY, 4.0, -0.25];

        assert!(bridge.on_audio_callback(&raw, 4).is_success());

        let frame = consumer.pop().unwrap();
        assert_eq!(&frame.samples()[..4], &[0.0, 0.0, 1.0, -0.25]);
    }
}
