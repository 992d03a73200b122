//! Pattern-speedup generator
//!
//! The loop-based Risset family: a short drum pattern is replayed back to
//! back, each repetition resampled to the layer's current tempo. Layer `i`
//! ramps linearly from `base · 2^i` to `base · 2^(i+1)` over the duration
//! and, by default, fades in and out with a linear trapezoid.

use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::dsp::envelope::Envelope;
use crate::dsp::waveform::{drum_pattern, speed_up};
use crate::engine::buffer::{sample_count, validate_sample_rate, SignalBuffer};
use crate::error::{Result, SynthError};
use crate::layers::law::RateLaw;
use crate::layers::spec::{LawKind, LayerSpacing, LayerSpec};

/// One placement of the pattern within a layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Repetition {
    /// First sample of the repetition
    pub start: usize,
    /// Playback speed relative to the base tempo
    pub speed: f64,
    pub gain: f64,
}

/// One voice of a pattern rhythm
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternLayer {
    pub spec: LayerSpec,
    /// Gain per repetition, evaluated at progress through the layer
    pub envelope: Envelope,
    pub sample_rate: u32,
}

impl PatternLayer {
    pub fn new(spec: LayerSpec, sample_rate: u32) -> Self {
        Self {
            spec,
            envelope: Envelope::LinearFade,
            sample_rate,
        }
    }

    /// Linear tempo ramp across one octave band above `base · 2^i`
    pub fn tempo_law(&self) -> Result<RateLaw> {
        if self.spec.law != LawKind::Linear {
            return Err(SynthError::invalid(
                "law",
                format!("pattern layers ramp linearly, got {:?}", self.spec.law),
            ));
        }
        RateLaw::from_spec(&self.spec, LayerSpacing::Octave)
    }

    /// Where each repetition of a `pattern_len`-sample pattern lands
    pub fn plan(&self, pattern_len: usize) -> Result<Vec<Repetition>> {
        validate_sample_rate(self.sample_rate)?;
        self.envelope.validate()?;
        if pattern_len == 0 {
            return Err(SynthError::invalid("pattern", "must not be empty"));
        }
        let law = self.tempo_law()?;

        let duration = self.spec.duration_secs;
        let total = sample_count(duration, self.sample_rate);
        let mut repetitions = Vec::new();
        let mut position = 0;

        while position < total {
            let progress = position as f64 / total as f64;
            let tempo = law.checked_rate_at(progress * duration)?;
            let speed = tempo / self.spec.base;
            let length = (pattern_len as f64 / speed).ceil();
            if !(length >= 1.0 && length.is_finite()) {
                return Err(SynthError::non_finite(
                    "pattern clock",
                    format!("speed {} gives a repetition of {} samples", speed, length),
                ));
            }

            repetitions.push(Repetition {
                start: position,
                speed,
                gain: self.envelope.evaluate(progress),
            });
            position += length as usize;
        }

        Ok(repetitions)
    }

    /// Render the voice from a pre-built `pattern`
    pub fn generate(&self, pattern: &[f32]) -> Result<SignalBuffer> {
        let plan = self.plan(pattern.len())?;
        let mut buffer = SignalBuffer::silence(
            sample_count(self.spec.duration_secs, self.sample_rate),
            self.sample_rate,
        );

        let samples = buffer.samples_mut();
        for repetition in &plan {
            let gain = repetition.gain as f32;
            let sped = speed_up(pattern, repetition.speed);
            for (dst, src) in samples[repetition.start..].iter_mut().zip(&sped) {
                *dst += src * gain;
            }
        }
        buffer.ensure_finite("pattern layer")?;

        debug!(
            "Pattern layer {}/{}: {} repetitions",
            self.spec.layer_index + 1,
            self.spec.layer_count,
            plan.len()
        );

        Ok(buffer)
    }
}

/// Build the kick/snare loop with snare noise drawn from `seed`
pub fn seeded_pattern(seed: u64, sample_rate: u32) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    drum_pattern(sample_rate, &mut rng)
}
