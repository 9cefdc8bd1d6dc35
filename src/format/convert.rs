//! Sample format and channel conversion.

use cpal::{FromSample, Sample};

/// Replaces non-finite values with silence and clamps to [-1.0, 1.0].
#[inline]
pub fn sanitize_sample(sample: f32) -> f32 {
    if sample.is_finite() {
        sample.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Averages one interleaved frame (one sample per channel) into a mono `f32`.
///
/// Any sample format CPAL can deliver is converted first. An empty frame is silence.
#[inline]
pub fn downmix<T>(frame: &[T]) -> f32
where
    T: Sample,
    f32: FromSample<T>,
{
    if frame.is_empty() {
        return 0.0;
    }
    let sum: f32 = frame
        .iter()
        .map(|&s| sanitize_sample(f32::from_sample(s)))
        .sum();
    sum / frame.len() as f32
}
