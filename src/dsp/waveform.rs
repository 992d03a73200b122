//! Short waveforms stamped at every onset
//!
//! A waveform is rendered once per layer and reused for each onset in that
//! layer. Only the snare draws noise; it takes an explicit RNG so callers
//! control reproducibility.

use std::f64::consts::PI;

use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SynthError};

/// Number of leading samples that receive the timing transient
const TRANSIENT_SAMPLES: usize = 5;

fn ms_to_samples(duration_ms: f64, sample_rate: u32) -> usize {
    (sample_rate as f64 * duration_ms / 1000.0) as usize
}

/// Scale `samples` so the largest magnitude equals `peak`
fn normalize_to(samples: &mut [f32], peak: f32) {
    let max = samples.iter().map(|s| s.abs()).fold(0.0_f32, f32::max);
    if max > 0.0 {
        let factor = peak / max;
        for s in samples.iter_mut() {
            *s *= factor;
        }
    }
}

// ============================================================================
// Percussive hit
// ============================================================================

/// Parameters of the decaying-sine percussive hit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitParams {
    /// Length of the hit in milliseconds
    pub duration_ms: f64,
    /// Tone frequency of layer 0 in Hz
    pub base_frequency: f64,
    /// Added to the tone frequency per layer index, so layers stay separable
    pub frequency_step: f64,
    /// Exponential decay rate (1/s)
    pub decay: f64,
    /// Offset added to the first few samples for a sharper attack
    pub transient: f64,
}

impl HitParams {
    /// Soft 60ms hit of the plain exponential generator
    pub fn neutral() -> Self {
        Self {
            duration_ms: 60.0,
            base_frequency: 80.0,
            frequency_step: 30.0,
            decay: 30.0,
            transient: 0.0,
        }
    }

    /// Short, clicky hit of the "stronger" exponential generator
    pub fn sharp() -> Self {
        Self {
            duration_ms: 40.0,
            base_frequency: 120.0,
            frequency_step: 40.0,
            decay: 45.0,
            transient: 0.5,
        }
    }

    /// Hit used by the cyclic (loopable) generator
    pub fn cyclic() -> Self {
        Self {
            duration_ms: 35.0,
            base_frequency: 120.0,
            frequency_step: 30.0,
            decay: 45.0,
            transient: 0.5,
        }
    }

    /// Tone frequency for a given layer
    pub fn frequency_for_layer(&self, layer_index: usize) -> f64 {
        self.base_frequency + layer_index as f64 * self.frequency_step
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.duration_ms > 0.0 && self.duration_ms.is_finite()) {
            return Err(SynthError::invalid("hit.duration_ms", "must be positive"));
        }
        if !(self.base_frequency > 0.0 && self.base_frequency.is_finite()) {
            return Err(SynthError::invalid("hit.base_frequency", "must be positive"));
        }
        if !self.frequency_step.is_finite() || !self.decay.is_finite() || !self.transient.is_finite()
        {
            return Err(SynthError::invalid("hit", "parameters must be finite"));
        }
        Ok(())
    }

    /// Render the hit for `layer_index`
    ///
    /// `sin(2π·f·t)` with the transient added to the first samples, all
    /// multiplied by `exp(-decay·t)`.
    pub fn render(&self, layer_index: usize, sample_rate: u32) -> Vec<f32> {
        let length = ms_to_samples(self.duration_ms, sample_rate);
        let frequency = self.frequency_for_layer(layer_index);
        let sr = sample_rate as f64;

        (0..length)
            .map(|i| {
                let t = i as f64 / sr;
                let mut signal = (2.0 * PI * frequency * t).sin();
                if i < TRANSIENT_SAMPLES {
                    signal += self.transient;
                }
                (signal * (-t * self.decay).exp()) as f32
            })
            .collect()
    }
}

impl Default for HitParams {
    fn default() -> Self {
        Self::cyclic()
    }
}

// ============================================================================
// Beep
// ============================================================================

/// Hann-windowed sine burst used by the tempo-ramp control stimuli
pub fn beep(frequency: f64, duration_secs: f64, sample_rate: u32) -> Vec<f32> {
    let length = (duration_secs * sample_rate as f64) as usize;
    let sr = sample_rate as f64;
    let window = hann_window(length);

    (0..length)
        .map(|i| {
            let t = i as f64 / sr;
            ((2.0 * PI * frequency * t).sin() * window[i]) as f32
        })
        .collect()
}

/// Symmetric Hann window, zero at both ends
pub fn hann_window(length: usize) -> Vec<f64> {
    match length {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => {
            let denom = (length - 1) as f64;
            (0..length)
                .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / denom).cos())
                .collect()
        }
    }
}

// ============================================================================
// Drum pattern
// ============================================================================

/// Length of the looped kick/snare pattern
pub const PATTERN_DURATION_MS: f64 = 400.0;

/// Offset of the snare within the pattern
const SNARE_OFFSET_MS: f64 = 200.0;

/// `count` points evenly spaced over [0, end], both ends included
fn linspace_inclusive(end: f64, count: usize) -> impl Iterator<Item = f64> {
    let step = if count > 1 { end / (count - 1) as f64 } else { 0.0 };
    (0..count).map(move |i| i as f64 * step)
}

/// Synthesized kick: a 150Hz→40Hz pitch drop with fast decay, peak 0.8
pub fn kick(sample_rate: u32) -> Vec<f32> {
    let duration_ms = 150.0;
    let length = ms_to_samples(duration_ms, sample_rate);
    let sr = sample_rate as f64;

    let mut phase = 0.0_f64;
    let mut samples: Vec<f32> = linspace_inclusive(duration_ms / 1000.0, length)
        .map(|t| {
            // Integrated frequency sweep
            phase += 2.0 * PI * 150.0 * (-t * 10.0).exp() / sr;
            (phase.sin() * (-t * 7.0).exp()) as f32
        })
        .collect();

    normalize_to(&mut samples, 0.8);
    samples
}

/// Synthesized snare: 200Hz tone plus noise with fast decay, peak 0.6
pub fn snare<R: Rng>(sample_rate: u32, rng: &mut R) -> Vec<f32> {
    let duration_ms = 120.0;
    let length = ms_to_samples(duration_ms, sample_rate);

    let mut samples: Vec<f32> = linspace_inclusive(duration_ms / 1000.0, length)
        .map(|t| {
            let tone = 200.0 * (2.0 * PI * 200.0 * t).sin();
            let noise: f64 = rng.sample::<f64, _>(StandardNormal) * 5000.0;
            ((tone * 0.3 + noise * 0.7) * (-t * 12.0).exp()) as f32
        })
        .collect();

    normalize_to(&mut samples, 0.6);
    samples
}

/// 400ms kick-snare pattern looped by the pattern-speedup generator
pub fn drum_pattern<R: Rng>(sample_rate: u32, rng: &mut R) -> Vec<f32> {
    let mut pattern = vec![0.0_f32; ms_to_samples(PATTERN_DURATION_MS, sample_rate)];
    overlay(&mut pattern, &kick(sample_rate), 0);
    overlay(
        &mut pattern,
        &snare(sample_rate, rng),
        ms_to_samples(SNARE_OFFSET_MS, sample_rate),
    );
    pattern
}

/// Add `source` into `target` starting at `offset`, truncating at the end
pub fn overlay(target: &mut [f32], source: &[f32], offset: usize) {
    if offset >= target.len() {
        return;
    }
    for (dst, src) in target[offset..].iter_mut().zip(source) {
        *dst += *src;
    }
}

// ============================================================================
// Playback speed
// ============================================================================

/// Replay `samples` `speed` times faster using linear interpolation
///
/// The output is `ceil(len / speed)` samples long. Speeds above 1 shorten
/// (and raise the pitch of) the waveform.
pub fn speed_up(samples: &[f32], speed: f64) -> Vec<f32> {
    if samples.is_empty() || !(speed > 0.0) {
        return Vec::new();
    }

    let source_len = samples.len();
    let target_len = ((source_len as f64) / speed).ceil() as usize;
    let mut output = Vec::with_capacity(target_len);

    for i in 0..target_len {
        let src_pos = i as f64 * speed;
        let src_idx = src_pos.floor() as usize;
        let frac = (src_pos - src_idx as f64) as f32;

        let sample = if src_idx + 1 < source_len {
            samples[src_idx] * (1.0 - frac) + samples[src_idx + 1] * frac
        } else if src_idx < source_len {
            samples[src_idx]
        } else {
            0.0
        };

        output.push(sample);
    }

    output
}
