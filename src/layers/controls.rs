//! Control stimuli
//!
//! Single-layer tempo and pitch ramps used as non-illusory baselines. They
//! reuse the event clock and the oscillator but always with a constant
//! envelope, never a band fade.

use serde::{Deserialize, Serialize};

use crate::dsp::envelope::Envelope;
use crate::dsp::waveform::beep;
use crate::engine::buffer::{sample_count, validate_sample_rate, SignalBuffer};
use crate::error::{Result, SynthError};
use crate::layers::event::{stamp_onsets, Onsets};
use crate::layers::law::RateLaw;
use crate::layers::oscillator::{render_oscillator, EnvelopeDomain};

pub const DEFAULT_BEEP_FREQUENCY: f64 = 800.0;
pub const DEFAULT_BEEP_DURATION: f64 = 0.1;
pub const DEFAULT_RAMP_AMPLITUDE: f64 = 0.8;

fn require_positive(name: &str, value: f64) -> Result<()> {
    if !(value > 0.0 && value.is_finite()) {
        return Err(SynthError::invalid(
            name,
            format!("must be positive and finite, got {}", value),
        ));
    }
    Ok(())
}

fn default_beep_frequency() -> f64 {
    DEFAULT_BEEP_FREQUENCY
}

fn default_beep_duration() -> f64 {
    DEFAULT_BEEP_DURATION
}

fn default_amplitude() -> f64 {
    DEFAULT_RAMP_AMPLITUDE
}

/// Beeps on a linear BPM ramp
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoRamp {
    pub start_bpm: f64,
    pub end_bpm: f64,
    pub duration_secs: f64,
    #[serde(default = "default_beep_frequency")]
    pub beep_frequency: f64,
    #[serde(default = "default_beep_duration")]
    pub beep_duration: f64,
}

impl TempoRamp {
    pub fn new(start_bpm: f64, end_bpm: f64, duration_secs: f64) -> Self {
        Self {
            start_bpm,
            end_bpm,
            duration_secs,
            beep_frequency: DEFAULT_BEEP_FREQUENCY,
            beep_duration: DEFAULT_BEEP_DURATION,
        }
    }

    pub fn validate(&self) -> Result<()> {
        require_positive("start_bpm", self.start_bpm)?;
        require_positive("end_bpm", self.end_bpm)?;
        require_positive("duration_secs", self.duration_secs)?;
        require_positive("beep_frequency", self.beep_frequency)?;
        require_positive("beep_duration", self.beep_duration)
    }

    /// Onsets of the ramp, first beep at t = 0
    pub fn onsets(&self) -> Result<Onsets> {
        self.validate()?;
        let law = RateLaw::bpm_ramp(self.start_bpm, self.end_bpm, self.duration_secs);
        Ok(Onsets::new(law, Envelope::unity(), self.duration_secs))
    }

    pub fn generate(&self, sample_rate: u32) -> Result<SignalBuffer> {
        validate_sample_rate(sample_rate)?;
        let onsets = self.onsets()?;

        let waveform = beep(self.beep_frequency, self.beep_duration, sample_rate);
        let mut buffer =
            SignalBuffer::silence(sample_count(self.duration_secs, sample_rate), sample_rate);
        stamp_onsets(&mut buffer, onsets, &waveform)?;
        Ok(buffer)
    }
}

/// Constant-amplitude sine on a linear frequency ramp
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchRamp {
    pub start_hz: f64,
    pub end_hz: f64,
    pub duration_secs: f64,
    #[serde(default = "default_amplitude")]
    pub amplitude: f64,
}

impl PitchRamp {
    pub fn new(start_hz: f64, end_hz: f64, duration_secs: f64) -> Self {
        Self {
            start_hz,
            end_hz,
            duration_secs,
            amplitude: DEFAULT_RAMP_AMPLITUDE,
        }
    }

    pub fn validate(&self) -> Result<()> {
        require_positive("start_hz", self.start_hz)?;
        require_positive("end_hz", self.end_hz)?;
        require_positive("duration_secs", self.duration_secs)?;
        if !(self.amplitude > 0.0 && self.amplitude <= 1.0) {
            return Err(SynthError::invalid("amplitude", "must be within (0, 1]"));
        }
        Ok(())
    }

    pub fn generate(&self, sample_rate: u32) -> Result<SignalBuffer> {
        self.validate()?;
        render_oscillator(
            &RateLaw::linear(self.start_hz, self.end_hz, self.duration_secs),
            &Envelope::Constant {
                gain: self.amplitude,
            },
            EnvelopeDomain::Progress,
            self.duration_secs,
            sample_rate,
        )
    }
}

/// Beeps on a linear tempo ramp from `start_bpm` to `end_bpm`
pub fn tempo_ramp(
    start_bpm: f64,
    end_bpm: f64,
    duration_secs: f64,
    beep_frequency: f64,
    beep_duration: f64,
    sample_rate: u32,
) -> Result<SignalBuffer> {
    TempoRamp {
        start_bpm,
        end_bpm,
        duration_secs,
        beep_frequency,
        beep_duration,
    }
    .generate(sample_rate)
}

/// Sine gliding linearly from `start_hz` to `end_hz`
pub fn pitch_ramp(
    start_hz: f64,
    end_hz: f64,
    duration_secs: f64,
    amplitude: f64,
    sample_rate: u32,
) -> Result<SignalBuffer> {
    PitchRamp {
        start_hz,
        end_hz,
        duration_secs,
        amplitude,
    }
    .generate(sample_rate)
}
