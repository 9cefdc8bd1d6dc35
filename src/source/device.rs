//! CPAL device wrapper for audio capture.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    Device, FromSample, SampleFormat, SampleRate, SizedSample, Stream, StreamConfig as CpalStreamConfig,
    StreamError, SupportedStreamConfig,
};
use ringbuf::traits::Producer;

use super::AudioFrameSource;
use crate::event::EventProducer;
use crate::pipeline::CaptureBridge;
use crate::{AcquisitionError, DeviceSelection, StreamEvent};

/// Capture from a CPAL device.
///
/// The device handle is opened up front so its native format can be queried
/// before the pipeline is configured. The stream exists only between
/// [`start()`](AudioFrameSource::start) and [`stop()`](AudioFrameSource::stop);
/// dropping the source stops it too.
#[must_use]
pub struct CpalSource {
    device: Device,
    name: String,
    loopback: bool,
    stream: Option<Stream>,
}

impl CpalSource {
    /// Opens the device described by `selection`.
    ///
    /// # Errors
    ///
    /// Returns an error if the device does not exist or the host cannot be queried.
    pub fn open(selection: &DeviceSelection) -> Result<Self, AcquisitionError> {
        match selection {
            DeviceSelection::DefaultInput => Self::open_default(),
            DeviceSelection::DefaultOutput => Self::open_default_output(),
            DeviceSelection::ByName(name) => Self::open_by_name(name),
        }
    }

    /// Opens the default input device.
    ///
    /// # Errors
    ///
    /// Returns `NoDefaultInputDevice` if no default input device is configured.
    pub fn open_default() -> Result<Self, AcquisitionError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(AcquisitionError::NoDefaultInputDevice)?;

        Ok(Self::from_device(device, false))
    }

    /// Opens the default output device for loopback capture.
    ///
    /// Only hosts with loopback support (WASAPI) can build an input stream on
    /// an output device; elsewhere [`start()`](AudioFrameSource::start) fails.
    ///
    /// # Errors
    ///
    /// Returns `NoDefaultOutputDevice` if no default output device is configured.
    pub fn open_default_output() -> Result<Self, AcquisitionError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AcquisitionError::NoDefaultOutputDevice)?;

        Ok(Self::from_device(device, true))
    }

    /// Opens a specific input device by name.
    ///
    /// # Errors
    ///
    /// Returns `DeviceNotFound` if no device with the given name exists.
    pub fn open_by_name(name: &str) -> Result<Self, AcquisitionError> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| AcquisitionError::Backend(e.to_string()))?;

        for device in devices {
            if let Ok(device_name) = device.name() {
                if device_name == name {
                    return Ok(Self::from_device(device, false));
                }
            }
        }

        Err(AcquisitionError::DeviceNotFound {
            name: name.to_string(),
        })
    }

    fn from_device(device: Device, loopback: bool) -> Self {
        let name = device.name().unwrap_or_else(|_| "unknown".to_string());
        tracing::info!("Selected audio device: {} (loopback: {})", name, loopback);
        Self {
            device,
            name,
            loopback,
            stream: None,
        }
    }

    /// Returns the device's native capture format (sample rate, channels).
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot report a default configuration.
    pub fn native_config(&self) -> Result<(u32, u16), AcquisitionError> {
        let config = self.supported_config()?;
        Ok((config.sample_rate().0, config.channels()))
    }

    /// Returns `true` while a stream is running.
    pub fn is_streaming(&self) -> bool {
        self.stream.is_some()
    }

    fn supported_config(&self) -> Result<SupportedStreamConfig, AcquisitionError> {
        let config = if self.loopback {
            self.device.default_output_config()
        } else {
            self.device.default_input_config()
        };
        config.map_err(|e| AcquisitionError::Backend(e.to_string()))
    }

    fn build_stream<T>(
        &self,
        config: &CpalStreamConfig,
        mut bridge: CaptureBridge,
        mut events: EventProducer,
    ) -> Result<Stream, AcquisitionError>
    where
        T: SizedSample,
        f32: FromSample<T>,
    {
        let channels = bridge.channels().max(1);
        let stream = self
            .device
            .build_input_stream(
                config,
                move |data: &[T], _: &cpal::InputCallbackInfo| {
                    // Status is recorded in the bridge counters
                    let _ = bridge.on_audio_callback(data, data.len() / channels);
                },
                move |err| {
                    let _ = events.try_push(stream_event(err));
                },
                None,
            )
            .map_err(|e| AcquisitionError::Backend(e.to_string()))?;

        Ok(stream)
    }
}

impl AudioFrameSource for CpalSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self, bridge: CaptureBridge, events: EventProducer) -> Result<(), AcquisitionError> {
        self.stop();

        let supported_config = self.supported_config()?;
        let sample_format = supported_config.sample_format();
        let mut cpal_config: CpalStreamConfig = supported_config.into();
        cpal_config.channels = u16::try_from(bridge.channels())
            .map_err(|_| AcquisitionError::Backend(format!("{} channels", bridge.channels())))?;
        cpal_config.sample_rate = SampleRate(bridge.sample_rate());

        tracing::info!(
            "Starting capture on {}: {} Hz, {} channels, {:?}",
            self.name,
            cpal_config.sample_rate.0,
            cpal_config.channels,
            sample_format
        );

        let stream = match sample_format {
            SampleFormat::F32 => self.build_stream::<f32>(&cpal_config, bridge, events)?,
            SampleFormat::I16 => self.build_stream::<i16>(&cpal_config, bridge, events)?,
            SampleFormat::U16 => self.build_stream::<u16>(&cpal_config, bridge, events)?,
            format => {
                return Err(AcquisitionError::UnsupportedFormat {
                    format: format!("{format:?}"),
                });
            }
        };

        stream
            .play()
            .map_err(|e| AcquisitionError::StreamStart(e.to_string()))?;

        self.stream = Some(stream);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                tracing::warn!("Failed to pause stream on {}: {}", self.name, e);
            }
            drop(stream);
            tracing::info!("Capture stopped on {}", self.name);
        }
    }
}

impl Drop for CpalSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Classifies a backend error. Only a vanished device is fatal.
fn stream_event(err: StreamError) -> StreamEvent {
    match err {
        StreamError::DeviceNotAvailable => StreamEvent::DeviceLost {
            reason: err.to_string(),
        },
        other => StreamEvent::StreamInterrupted {
            reason: other.to_string(),
        },
    }
}
