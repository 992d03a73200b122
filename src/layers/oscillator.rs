//! Oscillator Layer Generator
//!
//! One continuous sine layer whose instantaneous frequency follows a
//! [`RateLaw`]. Phase is the running sum of the frequency samples, so the
//! waveform stays continuous however fast the frequency moves.

use std::f64::consts::TAU;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::dsp::envelope::Envelope;
use crate::engine::buffer::{sample_count, validate_sample_rate, SignalBuffer};
use crate::error::{Result, SynthError};
use crate::layers::law::RateLaw;
use crate::layers::spec::{LayerSpacing, LayerSpec};

/// Where a layer's envelope is evaluated
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnvelopeDomain {
    /// Fold the frequency into the layer band:
    /// `(log2(f / base) mod layer_count) / layer_count`
    Band { base: f64, layer_count: usize },
    /// Evaluate at progress through the buffer (control tones)
    Progress,
}

impl EnvelopeDomain {
    #[inline]
    fn position(&self, frequency: f64, progress: f64) -> f64 {
        match *self {
            EnvelopeDomain::Band { base, layer_count } => {
                fold_into_band(frequency, base, layer_count)
            }
            EnvelopeDomain::Progress => progress,
        }
    }
}

/// Position of `frequency` within the `layer_count`-octave band above `base`
#[inline]
pub fn fold_into_band(frequency: f64, base: f64, layer_count: usize) -> f64 {
    let count = layer_count as f64;
    ((frequency / base).log2().rem_euclid(count) / count).clamp(0.0, 1.0)
}

/// Parameters of one Shepard-style oscillator layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OscillatorLayer {
    pub spec: LayerSpec,
    pub spacing: LayerSpacing,
    pub envelope: Envelope,
    pub sample_rate: u32,
}

impl OscillatorLayer {
    /// Octave-spaced layer with the Gaussian Shepard envelope
    pub fn shepard(spec: LayerSpec, sample_rate: u32) -> Self {
        Self {
            spec,
            spacing: LayerSpacing::Octave,
            envelope: Envelope::shepard_gaussian(),
            sample_rate,
        }
    }

    /// Render the layer
    pub fn generate(&self) -> Result<SignalBuffer> {
        validate_sample_rate(self.sample_rate)?;
        self.envelope.validate()?;
        let law = RateLaw::from_spec(&self.spec, self.spacing)?;

        debug!(
            "Oscillator layer {}/{}: {:?}, envelope {}",
            self.spec.layer_index + 1,
            self.spec.layer_count,
            law,
            self.envelope.name()
        );

        render_oscillator(
            &law,
            &self.envelope,
            EnvelopeDomain::Band {
                base: self.spec.base,
                layer_count: self.spec.layer_count,
            },
            self.spec.duration_secs,
            self.sample_rate,
        )
    }
}

/// Render a sine whose frequency follows `law`
///
/// For `N = round(duration · sample_rate)` samples with progress
/// `p[i] = i / N`:
///
/// ```text
/// f[i]     = law.rate_at(p[i] · duration)
/// phase[i] = 2π · (f[0] + … + f[i-1]) / sample_rate
/// out[i]   = sin(phase[i]) · envelope(domain(f[i], p[i]))
/// ```
pub fn render_oscillator(
    law: &RateLaw,
    envelope: &Envelope,
    domain: EnvelopeDomain,
    duration_secs: f64,
    sample_rate: u32,
) -> Result<SignalBuffer> {
    validate_sample_rate(sample_rate)?;
    if !(duration_secs > 0.0 && duration_secs.is_finite()) {
        return Err(SynthError::invalid("duration_secs", "must be positive"));
    }

    let n = sample_count(duration_secs, sample_rate);
    let sr = sample_rate as f64;
    let mut samples = Vec::with_capacity(n);
    let mut cycles = 0.0_f64;

    for i in 0..n {
        let progress = i as f64 / n as f64;
        let frequency = law.checked_rate_at(progress * duration_secs)?;
        let phase = TAU * cycles;
        if !phase.is_finite() {
            return Err(SynthError::non_finite(
                "oscillator phase",
                format!("phase at sample {} is {}", i, phase),
            ));
        }

        let gain = envelope.evaluate(domain.position(frequency, progress));
        samples.push((phase.sin() * gain) as f32);

        // Running sum in cycles, wrapped to [0, 1)
        cycles = (cycles + frequency / sr).fract();
    }

    Ok(SignalBuffer::from_samples(samples, sample_rate))
}

/// Instantaneous frequency at sample `index` of a layer rendered with `law`
pub fn frequency_at_sample(
    law: &RateLaw,
    index: usize,
    duration_secs: f64,
    sample_rate: u32,
) -> f64 {
    let n = sample_count(duration_secs, sample_rate);
    law.rate_at(index as f64 / n as f64 * duration_secs)
}
