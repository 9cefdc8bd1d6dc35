//! Spectrum engine - window, real FFT, magnitude, display scaling.
//!
//! The transform plan, window table and every working buffer are built once in
//! [`SpectrumEngine::new`]. [`SpectrumEngine::analyze`] only reads and writes
//! those buffers.

use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};

use crate::format::sanitize_sample;
use crate::{AudioFrame, PipelineConfig, RenderError, Scaling, SpectrumFrame, VisError};

/// Turns one [`AudioFrame`] into one [`SpectrumFrame`].
pub struct SpectrumEngine {
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    input: Vec<f32>,
    output: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    /// Magnitude of a full-scale sine centered on a bin: `sum(window) / 2`.
    coherent_gain: f32,
    scaling: Scaling,
    spectrum: SpectrumFrame,
}

impl SpectrumEngine {
    /// Plans the transform and preallocates every buffer for `config.window_size`.
    ///
    /// # Errors
    ///
    /// Returns [`VisError::InvalidConfig`] for an unusable configuration and
    /// [`VisError::TransformAllocation`] if the buffers cannot be reserved.
    pub fn new(config: &PipelineConfig) -> Result<Self, VisError> {
        config.validate()?;
        let size = config.window_size;

        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(size);

        let mut window = allocate(size, 0.0f32, size)?;
        for (i, coefficient) in window.iter_mut().enumerate() {
            *coefficient = config.window.coefficient(i, size);
        }
        let coherent_gain = (window.iter().sum::<f32>() / 2.0).max(f32::MIN_POSITIVE);

        let input = allocate(size, 0.0f32, size)?;
        let output = allocate(config.bin_count(), Complex::default(), size)?;
        let scratch = allocate(fft.get_scratch_len(), Complex::default(), size)?;

        tracing::info!(
            "SpectrumEngine ready: {}-point {:?} window, {} bins, scaling={:?}",
            size,
            config.window,
            config.bin_count(),
            config.scaling
        );

        Ok(Self {
            fft,
            window,
            input,
            output,
            scratch,
            coherent_gain,
            scaling: config.scaling,
            spectrum: SpectrumFrame::zeroed(size, config.sample_rate),
        })
    }

    /// Windows the frame, runs the forward transform and scales the magnitudes.
    ///
    /// The returned spectrum is borrowed from the engine and overwritten by the
    /// next call. Magnitudes are non-negative and finite; levels are in [0, 1].
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Transform`] if the frame length does not match
    /// the planned window size.
    pub fn analyze(&mut self, frame: &AudioFrame) -> Result<&SpectrumFrame, RenderError> {
        if frame.len() != self.input.len() {
            return Err(RenderError::transform(format!(
                "frame has {} samples, transform expects {}",
                frame.len(),
                self.input.len()
            )));
        }

        for ((dst, &sample), &coefficient) in self
            .input
            .iter_mut()
            .zip(frame.samples())
            .zip(&self.window)
        {
            *dst = sanitize_sample(sample) * coefficient;
        }

        self.fft
            .process_with_scratch(&mut self.input, &mut self.output, &mut self.scratch)
            .map_err(|e| RenderError::transform(e.to_string()))?;

        for ((magnitude, level), bin) in self
            .spectrum
            .magnitudes
            .iter_mut()
            .zip(self.spectrum.levels.iter_mut())
            .zip(&self.output)
        {
            let raw = (bin.re * bin.re + bin.im * bin.im).sqrt();
            *magnitude = if raw.is_nan() { 0.0 } else { raw.min(f32::MAX) };
            *level = self.scaling.level(*magnitude / self.coherent_gain);
        }
        self.spectrum.sequence = frame.sequence();

        Ok(&self.spectrum)
    }

    /// Most recent result of [`analyze()`](Self::analyze).
    pub fn spectrum(&self) -> &SpectrumFrame {
        &self.spectrum
    }

    /// Transform window size N.
    pub fn window_size(&self) -> usize {
        self.input.len()
    }
}

/// Reserves a buffer without aborting the process when memory is short.
fn allocate<T: Clone>(len: usize, value: T, size: usize) -> Result<Vec<T>, VisError> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|e| VisError::TransformAllocation {
            size,
            reason: e.to_string(),
        })?;
    buffer.resize(len, value);
    Ok(buffer)
}
