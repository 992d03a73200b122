//! Mixer/Normalizer
//!
//! Sums equal-length layers sample-wise and rescales the result to a target
//! peak. Layers are read by reference; the mix is always a fresh buffer.

use log::{debug, warn};

use crate::engine::buffer::SignalBuffer;
use crate::error::{Result, SynthError};

/// Guard against dividing by the peak of a silent mix
pub const NORMALIZE_EPSILON: f64 = 1e-9;

/// Target peak for Shepard tones and the loop-pattern family
pub const DEFAULT_TONE_PEAK: f64 = 0.8;

/// Target peak for the event-based rhythm family
pub const DEFAULT_EVENT_PEAK: f64 = 1.0;

/// Output of [`mix`]
#[derive(Debug, Clone, PartialEq)]
pub struct MixResult {
    pub buffer: SignalBuffer,
    /// Largest absolute sample of the raw sum, before rescaling
    pub peak_before_normalize: f64,
}

/// Reject targets outside (0, 1]
pub fn validate_target_peak(target_peak: f64) -> Result<()> {
    if !(target_peak > 0.0 && target_peak <= 1.0) {
        return Err(SynthError::invalid(
            "target_peak",
            format!("{} is outside (0, 1]", target_peak),
        ));
    }
    Ok(())
}

/// Sum `layers` and rescale so the peak equals `target_peak`
///
/// All layers must share length and sample rate. An all-zero sum stays all
/// zero.
///
/// # Example
/// ```
/// use endless::dsp::mixer::mix;
/// use endless::engine::SignalBuffer;
///
/// let a = SignalBuffer::from_samples(vec![0.5, -0.25], 44100);
/// let b = SignalBuffer::from_samples(vec![0.5, 0.0], 44100);
/// let result = mix(&[a, b], 0.8).unwrap();
/// assert!((result.buffer.peak() - 0.8).abs() < 1e-6);
/// assert_eq!(result.peak_before_normalize, 1.0);
/// ```
pub fn mix(layers: &[SignalBuffer], target_peak: f64) -> Result<MixResult> {
    validate_target_peak(target_peak)?;

    let first = layers.first().ok_or(SynthError::EmptyMix)?;
    let len = first.len();
    let sample_rate = first.sample_rate();

    for layer in &layers[1..] {
        if layer.len() != len {
            return Err(SynthError::LengthMismatch {
                expected: len,
                found: layer.len(),
            });
        }
        if layer.sample_rate() != sample_rate {
            return Err(SynthError::SampleRateMismatch {
                expected: sample_rate,
                found: layer.sample_rate(),
            });
        }
    }

    let mut sum = vec![0.0_f64; len];
    for layer in layers {
        for (acc, &s) in sum.iter_mut().zip(layer.samples()) {
            *acc += s as f64;
        }
    }

    if let Some(index) = sum.iter().position(|s| !s.is_finite()) {
        return Err(SynthError::non_finite(
            "mix",
            format!("layer sum at sample {} is {}", index, sum[index]),
        ));
    }

    let peak = sum.iter().map(|s| s.abs()).fold(0.0_f64, f64::max);
    if peak == 0.0 {
        warn!("Mixing {} silent layer(s); output stays silent", layers.len());
    }

    let factor = target_peak / (peak + NORMALIZE_EPSILON);
    debug!(
        "Mixed {} layer(s): raw peak {:.4}, gain {:.4}",
        layers.len(),
        peak,
        factor
    );

    let samples = sum.into_iter().map(|s| (s * factor) as f32).collect();

    Ok(MixResult {
        buffer: SignalBuffer::from_samples(samples, sample_rate),
        peak_before_normalize: peak,
    })
}

/// Rescale a single buffer to `target_peak`
pub fn normalize(buffer: &SignalBuffer, target_peak: f64) -> Result<MixResult> {
    mix(std::slice::from_ref(buffer), target_peak)
}
