//! Signal Buffer
//!
//! Mono sample buffer produced by every generator and consumed by the mixer
//! and the export boundary.

use crate::error::{Result, SynthError};

// ============================================================================
// Constants
// ============================================================================

/// Sample rate used by every original stimulus set (44.1kHz)
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Threshold below which a buffer is considered silent (-80dBFS)
pub const SILENCE_THRESHOLD_DB: f32 = -80.0;

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert linear amplitude to decibels
///
/// Returns -f32::INFINITY for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

/// Number of samples covering `duration_secs` at `sample_rate`
///
/// Rounds to the nearest sample so that e.g. 1.0s at 44.1kHz is exactly
/// 44100 samples regardless of floating point noise in the duration.
#[inline]
pub fn sample_count(duration_secs: f64, sample_rate: u32) -> usize {
    (duration_secs * sample_rate as f64).round().max(0.0) as usize
}

/// Reject a sample rate of zero
pub fn validate_sample_rate(sample_rate: u32) -> Result<()> {
    if sample_rate == 0 {
        return Err(SynthError::invalid("sample_rate", "must be positive"));
    }
    Ok(())
}

// ============================================================================
// Signal Buffer
// ============================================================================

/// Mono floating point sample buffer at a fixed sample rate
///
/// A buffer is owned by the generator that filled it until it is handed to
/// the mixer or the export boundary; neither mutates a buffer it receives.
///
/// # Example
/// ```
/// use endless::engine::buffer::{SignalBuffer, DEFAULT_SAMPLE_RATE};
///
/// let buffer = SignalBuffer::silence(DEFAULT_SAMPLE_RATE as usize, DEFAULT_SAMPLE_RATE);
/// assert_eq!(buffer.len(), 44100);
/// assert!((buffer.duration_secs() - 1.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SignalBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl SignalBuffer {
    /// Create a zero-filled buffer
    pub fn silence(num_samples: usize, sample_rate: u32) -> Self {
        Self {
            samples: vec![0.0; num_samples],
            sample_rate,
        }
    }

    /// Wrap existing samples
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Sample rate in Hz
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of samples
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the buffer holds no samples
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[inline]
    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    /// Consume the buffer, returning its samples
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Maximum absolute sample value (0.0 for empty buffers)
    pub fn peak(&self) -> f32 {
        self.samples.iter().map(|s| s.abs()).fold(0.0_f32, f32::max)
    }

    /// RMS level in dB. Returns -f32::INFINITY for empty or silent buffers.
    pub fn rms_db(&self) -> f32 {
        if self.samples.is_empty() {
            return f32::NEG_INFINITY;
        }
        let sum_squares: f64 = self
            .samples
            .iter()
            .map(|&s| (s as f64) * (s as f64))
            .sum();
        linear_to_db((sum_squares / self.samples.len() as f64).sqrt() as f32)
    }

    /// Check if the RMS level is below the silence threshold
    pub fn is_silent(&self) -> bool {
        self.rms_db() <= SILENCE_THRESHOLD_DB
    }

    /// Check if all samples are finite (not NaN or Infinity)
    pub fn is_finite(&self) -> bool {
        self.samples.iter().all(|s| s.is_finite())
    }

    /// Fail with `NonFiniteComputation` if any sample is NaN or infinite
    pub fn ensure_finite(&self, stage: &str) -> Result<()> {
        match self.samples.iter().position(|s| !s.is_finite()) {
            None => Ok(()),
            Some(index) => Err(SynthError::non_finite(
                stage,
                format!("sample {} is {}", index, self.samples[index]),
            )),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_to_db() {
        assert!((linear_to_db(1.0) - 0.0).abs() < 1e-6);
        assert!((linear_to_db(0.5) - (-6.0206)).abs() < 1e-3);
        assert!(linear_to_db(0.0).is_infinite() && linear_to_db(0.0).is_sign_negative());
    }

    #[test]
    fn test_sample_count_rounds() {
        assert_eq!(sample_count(1.0, 44100), 44100);
        assert_eq!(sample_count(0.1, 44100), 4410);
        assert_eq!(sample_count(0.0, 44100), 0);
    }

    #[test]
    fn test_validate_sample_rate() {
        assert!(validate_sample_rate(44100).is_ok());
        assert!(matches!(
            validate_sample_rate(0),
            Err(SynthError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_peak_and_rms() {
        let buffer = SignalBuffer::from_samples(vec![0.0, -0.5, 0.25], 44100);
        assert_eq!(buffer.peak(), 0.5);

        let unity = SignalBuffer::from_samples(vec![1.0; 1000], 44100);
        assert!(unity.rms_db().abs() < 0.01);
    }

    #[test]
    fn test_silence() {
        let buffer = SignalBuffer::silence(1000, 44100);
        assert!(buffer.is_silent());
        assert_eq!(buffer.peak(), 0.0);
        assert!(SignalBuffer::silence(0, 44100).rms_db().is_infinite());
    }

    #[test]
    fn test_ensure_finite() {
        let mut buffer = SignalBuffer::silence(10, 44100);
        assert!(buffer.ensure_finite("test").is_ok());

        buffer.samples_mut()[3] = f32::NAN;
        assert!(!buffer.is_finite());
        let err = buffer.ensure_finite("test").unwrap_err();
        assert_eq!(err.error_code(), "NON_FINITE_COMPUTATION");
    }
}
