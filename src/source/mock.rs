//! Mock audio source for testing without hardware.

use std::f64::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use ringbuf::traits::Producer;

use super::AudioFrameSource;
use crate::event::EventProducer;
use crate::pipeline::CaptureBridge;
use crate::{AcquisitionError, PipelineConfig, StreamEvent};

/// Waveform produced by a [`MockSource`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Signal {
    /// All zeros.
    Silence,
    /// A pure tone, identical on every channel.
    Sine {
        /// Frequency in Hz.
        frequency: f64,
        /// Peak amplitude in [0, 1].
        amplitude: f32,
    },
    /// Deterministic white noise.
    Noise {
        /// Peak amplitude in [0, 1].
        amplitude: f32,
    },
}

/// A synthetic audio source that feeds the bridge from its own thread.
///
/// Batches are paced to the configured sample rate, so the pipeline sees the
/// same timing it would with a device. This allows running the full pipeline
/// without audio hardware, which makes it suitable for CI and demos.
///
/// # Example
///
/// ```
/// use cli_vis::source::{MockSource, Signal};
///
/// let mock = MockSource::new(Signal::Sine { frequency: 440.0, amplitude: 0.5 }, 16000, 2);
///
/// // One second of audio, interleaved
/// let samples = mock.render(16000);
/// assert_eq!(samples.len(), 32000);
/// ```
pub struct MockSource {
    signal: Signal,
    sample_rate: u32,
    channels: u16,
    batch_frames: usize,
    device_lost_after: Option<u64>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl MockSource {
    /// Creates a new mock source with the given format.
    pub fn new(signal: Signal, sample_rate: u32, channels: u16) -> Self {
        Self {
            signal,
            sample_rate,
            channels,
            batch_frames: 256,
            device_lost_after: None,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Creates a source in `config`'s format that delivers one full window per callback.
    pub fn for_config(signal: Signal, config: &PipelineConfig) -> Self {
        Self::new(signal, config.sample_rate, config.channels).with_batch_frames(config.window_size)
    }

    /// Sets the number of frames delivered per callback.
    #[must_use]
    pub fn with_batch_frames(mut self, frames: usize) -> Self {
        self.batch_frames = frames.max(1);
        self
    }

    /// Reports [`StreamEvent::DeviceLost`] after `batches` callbacks and goes quiet.
    #[must_use]
    pub fn with_device_lost_after(mut self, batches: u64) -> Self {
        self.device_lost_after = Some(batches);
        self
    }

    /// Returns the sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the channel count.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Returns `true` while the generator thread is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Generates `frames` interleaved frames from the start of the signal.
    pub fn render(&self, frames: usize) -> Vec<f32> {
        let mut generator = Generator::new(self.signal, self.sample_rate, self.channels);
        let mut samples = vec![0.0; frames * usize::from(self.channels)];
        generator.fill(&mut samples);
        samples
    }
}

impl AudioFrameSource for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    fn start(&mut self, mut bridge: CaptureBridge, mut events: EventProducer) -> Result<(), AcquisitionError> {
        self.stop();
        if self.sample_rate == 0 || self.channels == 0 {
            return Err(AcquisitionError::UnsupportedFormat {
                format: format!("{} Hz, {} channels", self.sample_rate, self.channels),
            });
        }

        let mut generator = Generator::new(self.signal, self.sample_rate, self.channels);
        let channels = usize::from(self.channels);
        let batch_frames = self.batch_frames;
        let pace = Duration::from_secs_f64(batch_frames as f64 / f64::from(self.sample_rate));
        let device_lost_after = self.device_lost_after;
        let running = Arc::clone(&self.running);
        running.store(true, Ordering::Release);

        let worker = thread::Builder::new()
            .name("mock-audio".to_string())
            .spawn(move || {
                let mut buffer = vec![0.0f32; batch_frames * channels];
                let mut batches = 0u64;
                while running.load(Ordering::Acquire) {
                    if device_lost_after == Some(batches) {
                        let _ = events.try_push(StreamEvent::DeviceLost {
                            reason: "mock device unplugged".to_string(),
                        });
                        break;
                    }
                    generator.fill(&mut buffer);
                    let _ = bridge.on_audio_callback(&buffer, buffer.len() / channels);
                    batches += 1;
                    thread::sleep(pace);
                }
            })
            .map_err(|e| AcquisitionError::StreamStart(e.to_string()))?;

        self.worker = Some(worker);
        tracing::info!("Mock source started: {:?} at {} Hz", self.signal, self.sample_rate);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("Mock audio thread panicked");
            }
            tracing::info!("Mock source stopped");
        }
    }
}

impl Drop for MockSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Stateful sample generator; continues the waveform across batches.
struct Generator {
    signal: Signal,
    sample_rate: f64,
    channels: usize,
    position: u64,
    seed: u32,
}

impl Generator {
    fn new(signal: Signal, sample_rate: u32, channels: u16) -> Self {
        Self {
            signal,
            sample_rate: f64::from(sample_rate.max(1)),
            channels: usize::from(channels.max(1)),
            position: 0,
            seed: 12345,
        }
    }

    fn fill(&mut self, interleaved: &mut [f32]) {
        for frame in interleaved.chunks_mut(self.channels) {
            let value = self.next_value();
            frame.fill(value);
        }
    }

    fn next_value(&mut self) -> f32 {
        let value = match self.signal {
            Signal::Silence => 0.0,
            Signal::Sine {
                frequency,
                amplitude,
            } => {
                let t = self.position as f64 / self.sample_rate;
                amplitude * (2.0 * PI * frequency * t).sin() as f32
            }
            Signal::Noise { amplitude } => {
                // Simple LCG for deterministic "random" noise
                self.seed = self.seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
                let random = f32::from((self.seed >> 16) as u16) / 32768.0 - 1.0;
                amplitude * random
            }
        };
        self.position += 1;
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::event_channel;
    use crate::pipeline::frame_queue;
    use crate::CancellationToken;
    use ringbuf::traits::Consumer;
    use std::time::Instant;

    #[test]
    fn test_mock_source_silence() {
        let mock = MockSource::new(Signal::Silence, 16000, 1);
        let samples = mock.render(1600);

        assert_eq!(samples.len(), 1600);
        assert!(samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_mock_source_sine() {
        let mock = MockSource::new(
            Signal::Sine {
                frequency: 440.0,
                amplitude: 1.0,
            },
            16000,
            1,
        );
        let samples = mock.render(1600);

        // Sine wave should have positive and negative values
        assert!(samples.iter().any(|&s| s > 0.5));
        assert!(samples.iter().any(|&s| s < -0.5));
        assert!(samples.iter().all(|&s| s.abs() <= 1.0));
    }

    #[test]
    fn test_mock_source_stereo_is_interleaved() {
        let mock = MockSource::new(
            Signal::Sine {
                frequency: 1000.0,
                amplitude: 0.5,
            },
            48000,
            2,
        );
        let samples = mock.render(4800);

        assert_eq!(samples.len(), 9600);
        for frame in samples.chunks(2) {
            assert_eq!(frame[0], frame[1]);
        }
    }

    #[test]
    fn test_mock_source_noise_is_bounded_and_deterministic() {
        let mock = MockSource::new(Signal::Noise { amplitude: 0.25 }, 8000, 1);
        let first = mock.render(1000);
        let second = mock.render(1000);

        assert_eq!(first, second);
        assert!(first.iter().all(|&s| s.abs() <= 0.25));
        assert!(first.iter().any(|&s| s != 0.0));
    }

    #[test]
    fn test_mock_source_feeds_bridge() {
        let config = PipelineConfig {
            window_size: 256,
            sample_rate: 16000,
            channels: 2,
            ..Default::default()
        };
        let (producer, mut consumer) = frame_queue(config.window_size, config.queue_capacity);
        let (events, _event_rx) = event_channel();
        let bridge = CaptureBridge::new(producer, &config, CancellationToken::new());

        let mut mock = MockSource::new(
            Signal::Sine {
                frequency: 1000.0,
                amplitude: 0.8,
            },
            16000,
            2,
        );
        mock.start(bridge, events).unwrap();
        assert!(mock.is_running());

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut received = None;
        while received.is_none() && Instant::now() < deadline {
            received = consumer.pop().map(|frame| frame.captured_len());
            thread::sleep(Duration::from_millis(1));
        }
        mock.stop();

        assert_eq!(received, Some(256));
        assert!(!mock.is_running());
    }

    #[test]
    fn test_config_source_fills_whole_windows() {
        let config = PipelineConfig {
            window_size: 1024,
            sample_rate: 44100,
            channels: 2,
            ..Default::default()
        };
        let (producer, mut consumer) = frame_queue(config.window_size, config.queue_capacity);
        let (events, _event_rx) = event_channel();
        let bridge = CaptureBridge::new(producer, &config, CancellationToken::new());

        let signal = Signal::Sine {
            frequency: 440.0,
            amplitude: 0.8,
        };
        let mut mock = MockSource::for_config(signal, &config);
        assert_eq!(mock.sample_rate(), 44100);
        assert_eq!(mock.channels(), 2);
        mock.start(bridge, events).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut received = None;
        while received.is_none() && Instant::now() < deadline {
            received = consumer.pop().cloned();
            thread::sleep(Duration::from_millis(1));
        }
        mock.stop();

        let frame = received.unwrap();
        assert_eq!(frame.captured_len(), 1024);
        // No zero padding at the tail of the window
        assert!(frame.samples()[960..].iter().any(|s| s.abs() > 0.1));
    }

    #[test]
    fn test_mock_source_reports_device_loss() {
        let config = PipelineConfig {
            window_size: 64,
            sample_rate: 16000,
            channels: 1,
            ..Default::default()
        };
        let (producer, _consumer) = frame_queue(config.window_size, config.queue_capacity);
        let (events, mut event_rx) = event_channel();
        let bridge = CaptureBridge::new(producer, &config, CancellationToken::new());

        let mut mock = MockSource::new(Signal::Silence, 16000, 1).with_device_lost_after(2);
        mock.start(bridge, events).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut event = None;
        while event.is_none() && Instant::now() < deadline {
            event = event_rx.try_pop();
            thread::sleep(Duration::from_millis(1));
        }
        mock.stop();

        assert!(event.is_some_and(|e| e.is_fatal()));
    }

    #[test]
    fn test_mock_source_rejects_zero_channels() {
        let config = PipelineConfig::default();
        let (producer, _consumer) = frame_queue(config.window_size, config.queue_capacity);
        let (events, _event_rx) = event_channel();
        let bridge = CaptureBridge::new(producer, &config, CancellationToken::new());

        let mut mock = MockSource::new(Signal::Silence, 44100, 0);
        assert!(matches!(
            mock.start(bridge, events),
            Err(AcquisitionError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut mock = MockSource::new(Signal::Silence, 8000, 1);
        mock.stop();
        mock.stop();
        assert!(!mock.is_running());
    }
}
