//! Envelope Library
//!
//! Pure gain curves mapping a normalized position in [0, 1] to a gain in
//! [0, 1]. Generators evaluate these once per sample or once per onset, so
//! nothing here allocates or keeps state.
//!
//! Inputs outside [0, 1] are the caller's responsibility to clamp.

use serde::{Deserialize, Serialize};

use crate::layers::Direction;

/// Default Gaussian center for Shepard tone layers
pub const DEFAULT_GAUSSIAN_CENTER: f64 = 0.5;

/// Default Gaussian width for Shepard tone layers
pub const DEFAULT_GAUSSIAN_WIDTH: f64 = 0.3;

/// Slope used by the "stronger" event variant's smoothed gate
pub const DEFAULT_GATE_SLOPE: f64 = 1.3;

/// Floor of the loudness emphasis ramp
const LOUDNESS_FLOOR: f64 = 0.6;

// ============================================================================
// Envelope functions
// ============================================================================

/// `exp(-(x - center)² / (2·width²))`
#[inline]
pub fn gaussian(x: f64, center: f64, width: f64) -> f64 {
    let d = x - center;
    (-(d * d) / (2.0 * width * width)).exp()
}

/// `sin(π·phase)`: silent at both band edges, unity in the middle
#[inline]
pub fn sine_shepard(phase: f64) -> f64 {
    // sin(π) is ~1.2e-16, not 0; keep the edges exact
    if phase <= 0.0 || phase >= 1.0 {
        return 0.0;
    }
    (std::f64::consts::PI * phase).sin()
}

/// Trapezoid: ramps up over the first quarter, holds, ramps down over the
/// last quarter
#[inline]
pub fn linear_fade(progress: f64) -> f64 {
    if progress < 0.25 {
        progress / 0.25
    } else if progress > 0.75 {
        (1.0 - progress) / 0.25
    } else {
        1.0
    }
}

/// `clip(p·k, 0, 1) · clip((1 - p)·k, 0, 1)`
#[inline]
pub fn smoothed_gate(progress: f64, slope: f64) -> f64 {
    (progress * slope).clamp(0.0, 1.0) * ((1.0 - progress) * slope).clamp(0.0, 1.0)
}

/// Loudness ramp layered over the envelope in the "stronger" variant
///
/// Rises from 0.6 to 1.0 in the direction of motion, so the layer is
/// loudest where it is heading.
#[inline]
pub fn loudness_emphasis(progress: f64, direction: Direction) -> f64 {
    let p = match direction {
        Direction::Rising => progress,
        Direction::Falling => 1.0 - progress,
    };
    LOUDNESS_FLOOR + (1.0 - LOUDNESS_FLOOR) * p
}

// ============================================================================
// Envelope
// ============================================================================

/// Envelope kind, selectable from configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Envelope {
    Gaussian { center: f64, width: f64 },
    SineShepard,
    LinearFade,
    SmoothedGate { slope: f64 },
    Constant { gain: f64 },
}

impl Envelope {
    /// Gaussian centered in the band, as used by Shepard tones
    pub fn shepard_gaussian() -> Self {
        Envelope::Gaussian {
            center: DEFAULT_GAUSSIAN_CENTER,
            width: DEFAULT_GAUSSIAN_WIDTH,
        }
    }

    /// Unity gain, used by the control stimuli
    pub fn unity() -> Self {
        Envelope::Constant { gain: 1.0 }
    }

    /// Evaluate the envelope at `x` in [0, 1]
    #[inline]
    pub fn evaluate(&self, x: f64) -> f64 {
        match *self {
            Envelope::Gaussian { center, width } => gaussian(x, center, width),
            Envelope::SineShepard => sine_shepard(x),
            Envelope::LinearFade => linear_fade(x),
            Envelope::SmoothedGate { slope } => smoothed_gate(x, slope),
            Envelope::Constant { gain } => gain,
        }
    }

    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Envelope::Gaussian { .. } => "gaussian",
            Envelope::SineShepard => "sine_shepard",
            Envelope::LinearFade => "linear_fade",
            Envelope::SmoothedGate { .. } => "smoothed_gate",
            Envelope::Constant { .. } => "constant",
        }
    }

    /// Reject parameters that would leave [0, 1] or divide by zero
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::SynthError;

        match *self {
            Envelope::Gaussian { center, width } => {
                if !(width > 0.0 && width.is_finite()) {
                    return Err(SynthError::invalid("envelope.width", "must be positive"));
                }
                if !center.is_finite() {
                    return Err(SynthError::invalid("envelope.center", "must be finite"));
                }
            }
            Envelope::SmoothedGate { slope } => {
                if !(slope > 0.0 && slope.is_finite()) {
                    return Err(SynthError::invalid("envelope.slope", "must be positive"));
                }
            }
            Envelope::Constant { gain } => {
                if !(0.0..=1.0).contains(&gain) {
                    return Err(SynthError::invalid("envelope.gain", "must be within [0, 1]"));
                }
            }
            Envelope::SineShepard | Envelope::LinearFade => {}
        }
        Ok(())
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Envelope::SineShepard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use test_case::test_case;

    fn grid() -> impl Iterator<Item = f64> {
        (0..=1000).map(|i| i as f64 / 1000.0)
    }

    #[test_case(Envelope::shepard_gaussian() ; "gaussian")]
    #[test_case(Envelope::SineShepard ; "sine shepard")]
    #[test_case(Envelope::LinearFade ; "linear fade")]
    #[test_case(Envelope::SmoothedGate { slope: 1.3 } ; "smoothed gate")]
    #[test_case(Envelope::SmoothedGate { slope: 8.0 } ; "steep gate")]
    #[test_case(Envelope::unity() ; "constant")]
    fn test_envelope_bounds(envelope: Envelope) {
        for x in grid() {
            let g = envelope.evaluate(x);
            assert!((0.0..=1.0).contains(&g), "{} at {} = {}", envelope.name(), x, g);
        }
    }

    #[test]
    fn test_sine_shepard_edges_and_peak() {
        assert_eq!(sine_shepard(0.0), 0.0);
        assert_eq!(sine_shepard(1.0), 0.0);
        assert_abs_diff_eq!(sine_shepard(0.5), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_gaussian_peak_at_center() {
        assert_abs_diff_eq!(gaussian(0.5, 0.5, 0.3), 1.0, epsilon = 1e-12);
        assert!(gaussian(0.0, 0.5, 0.3) < gaussian(0.25, 0.5, 0.3));
        assert_abs_diff_eq!(gaussian(0.0, 0.5, 0.3), gaussian(1.0, 0.5, 0.3), epsilon = 1e-12);
        // Narrow width fades to near silence at the band edges
        assert!(gaussian(0.0, 0.5, 0.1) < 1e-5);
    }

    #[test]
    fn test_linear_fade_shape() {
        assert_eq!(linear_fade(0.0), 0.0);
        assert_abs_diff_eq!(linear_fade(0.125), 0.5, epsilon = 1e-12);
        assert_eq!(linear_fade(0.25), 1.0);
        assert_eq!(linear_fade(0.5), 1.0);
        assert_eq!(linear_fade(0.75), 1.0);
        assert_abs_diff_eq!(linear_fade(0.875), 0.5, epsilon = 1e-12);
        assert_eq!(linear_fade(1.0), 0.0);
    }

    #[test]
    fn test_smoothed_gate_slope() {
        assert_eq!(smoothed_gate(0.0, 1.3), 0.0);
        assert_eq!(smoothed_gate(1.0, 1.3), 0.0);
        // Steeper gates reach unity over a wider middle region
        assert_eq!(smoothed_gate(0.3, 4.0), 1.0);
        assert!(smoothed_gate(0.3, 1.3) < 1.0);
    }

    #[test]
    fn test_loudness_emphasis_follows_direction() {
        assert_abs_diff_eq!(loudness_emphasis(0.0, Direction::Rising), 0.6);
        assert_abs_diff_eq!(loudness_emphasis(1.0, Direction::Rising), 1.0);
        assert_abs_diff_eq!(loudness_emphasis(0.0, Direction::Falling), 1.0);
        assert_abs_diff_eq!(loudness_emphasis(1.0, Direction::Falling), 0.6);
    }

    #[test]
    fn test_validate() {
        assert!(Envelope::shepard_gaussian().validate().is_ok());
        assert!(Envelope::Gaussian { center: 0.5, width: 0.0 }.validate().is_err());
        assert!(Envelope::SmoothedGate { slope: -1.0 }.validate().is_err());
        assert!(Envelope::Constant { gain: 1.5 }.validate().is_err());
    }

    #[test]
    fn test_serde_tagging() {
        let json = serde_json::to_string(&Envelope::SmoothedGate { slope: 1.3 }).unwrap();
        assert_eq!(json, r#"{"kind":"smoothed_gate","slope":1.3}"#);
        let parsed: Envelope = serde_json::from_str(r#"{"kind":"sine_shepard"}"#).unwrap();
        assert_eq!(parsed, Envelope::SineShepard);
    }
}
