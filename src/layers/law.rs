//! Rate laws
//!
//! A `RateLaw` is the instantaneous rate of one layer as a function of time.
//! Oscillators read it as a frequency in Hz, event layers as onsets per
//! second.

use std::f64::consts::LN_2;

use crate::error::{Result, SynthError};
use crate::layers::spec::{Direction, LawKind, LayerSpacing, LayerSpec};

/// Resolved rate function for one layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateLaw {
    /// `start + (end - start) · t / duration`
    Linear { start: f64, end: f64, duration: f64 },
    /// `start · 2^(octaves · t / duration)`; negative octaves fall
    Exponential {
        start: f64,
        octaves: f64,
        duration: f64,
    },
    /// `base · 2^(span · phase(t))` with
    /// `phase(t) = (direction · t / (cycle_length · span) + phase_offset) mod 1`
    Cyclic {
        base: f64,
        cycle_length: f64,
        direction: Direction,
        phase_offset: f64,
        span: f64,
    },
}

impl RateLaw {
    /// Linear ramp between two explicit rates
    pub fn linear(start: f64, end: f64, duration: f64) -> Self {
        RateLaw::Linear {
            start,
            end,
            duration,
        }
    }

    /// Linear ramp between two tempos given in BPM
    pub fn bpm_ramp(start_bpm: f64, end_bpm: f64, duration: f64) -> Self {
        RateLaw::linear(start_bpm / 60.0, end_bpm / 60.0, duration)
    }

    /// Resolve the law for one layer of `spec`
    pub fn from_spec(spec: &LayerSpec, spacing: LayerSpacing) -> Result<Self> {
        spec.validate()?;

        let start = spec.base * spacing.multiplier(spec.layer_index, spec.layer_count);
        let law = match spec.law {
            LawKind::Exponential => RateLaw::Exponential {
                start,
                octaves: spec.direction.sign() * spec.octave_range,
                duration: spec.duration_secs,
            },
            LawKind::Linear => {
                let top = start * 2f64.powf(spec.octave_range);
                let (start, end) = match spec.direction {
                    Direction::Rising => (start, top),
                    Direction::Falling => (top, start),
                };
                RateLaw::Linear {
                    start,
                    end,
                    duration: spec.duration_secs,
                }
            }
            LawKind::CyclicExponential => RateLaw::Cyclic {
                base: spec.base,
                // Validated above
                cycle_length: spec.cycle_length.unwrap_or_default(),
                direction: spec.direction,
                phase_offset: spec.layer_index as f64 / spec.layer_count as f64,
                span: spacing.cycle_span(spec.layer_count),
            },
        };
        Ok(law)
    }

    /// Instantaneous rate at time `t` seconds
    #[inline]
    pub fn rate_at(&self, t: f64) -> f64 {
        match *self {
            RateLaw::Linear {
                start,
                end,
                duration,
            } => start + (end - start) * (t / duration),
            RateLaw::Exponential {
                start,
                octaves,
                duration,
            } => start * 2f64.powf(octaves * t / duration),
            RateLaw::Cyclic { base, span, .. } => base * 2f64.powf(span * self.cyclic_phase(t)),
        }
    }

    /// Cyclic phase in [0, 1); zero for non-cyclic laws
    #[inline]
    pub fn cyclic_phase(&self, t: f64) -> f64 {
        match *self {
            RateLaw::Cyclic {
                cycle_length,
                direction,
                phase_offset,
                span,
                ..
            } => {
                let phase =
                    (direction.sign() * t / (cycle_length * span) + phase_offset).rem_euclid(1.0);
                // rem_euclid rounds tiny negative inputs up to exactly 1.0
                if phase >= 1.0 {
                    0.0
                } else {
                    phase
                }
            }
            _ => 0.0,
        }
    }

    /// Position fed to an event envelope: cyclic phase, or progress through
    /// the duration, clamped to [0, 1]
    #[inline]
    pub fn envelope_position(&self, t: f64) -> f64 {
        let position = match *self {
            RateLaw::Linear { duration, .. } | RateLaw::Exponential { duration, .. } => {
                t / duration
            }
            RateLaw::Cyclic { .. } => self.cyclic_phase(t),
        };
        position.clamp(0.0, 1.0)
    }

    /// Time after which the law repeats exactly, for cyclic laws
    pub fn period(&self) -> Option<f64> {
        match *self {
            RateLaw::Cyclic {
                cycle_length, span, ..
            } => Some(cycle_length * span),
            _ => None,
        }
    }

    /// Number of events (or cycles) between 0 and `t`: `∫₀ᵗ rate dt`
    pub fn integral(&self, t: f64) -> f64 {
        match *self {
            RateLaw::Linear {
                start,
                end,
                duration,
            } => start * t + (end - start) * t * t / (2.0 * duration),
            RateLaw::Exponential {
                start,
                octaves,
                duration,
            } => {
                if octaves == 0.0 {
                    return start * t;
                }
                let k = octaves * LN_2 / duration;
                start * (k * t).exp_m1() / k
            }
            RateLaw::Cyclic {
                base,
                cycle_length,
                direction,
                phase_offset,
                span,
            } => {
                let period = cycle_length * span;
                let sign = direction.sign();
                let u = sign * t / period + phase_offset;
                sign * base
                    * period
                    * (cyclic_primitive(u, span) - cyclic_primitive(phase_offset, span))
            }
        }
    }

    /// Inverse of [`integral`](Self::integral) for cyclic laws: the time at
    /// which `integral` events have elapsed. `None` for other laws.
    pub fn cyclic_time_at(&self, integral: f64) -> Option<f64> {
        match *self {
            RateLaw::Cyclic {
                base,
                cycle_length,
                direction,
                phase_offset,
                span,
            } => {
                let period = cycle_length * span;
                let sign = direction.sign();
                let cycle = unit_cycle_integral(span);
                let target =
                    cyclic_primitive(phase_offset, span) + sign * integral / (base * period);
                let turns = (target / cycle).floor();
                let rest = (target - turns * cycle).max(0.0);
                let frac = ((rest * span * LN_2).ln_1p() / (span * LN_2)).min(1.0);
                Some((sign * (turns + frac - phase_offset) * period).max(0.0))
            }
            _ => None,
        }
    }

    /// Rate at `t`, failing if it is not a positive finite number
    pub fn checked_rate_at(&self, t: f64) -> Result<f64> {
        let rate = self.rate_at(t);
        if !(rate.is_finite() && rate > 0.0) {
            return Err(SynthError::non_finite(
                "rate law",
                format!("rate at t={:.6}s is {}", t, rate),
            ));
        }
        Ok(rate)
    }
}

/// `∫₀¹ 2^(span·u) du`
fn unit_cycle_integral(span: f64) -> f64 {
    (span * LN_2).exp_m1() / (span * LN_2)
}

/// Antiderivative of `2^(span · frac(u))` in `u`, continuous across wraps
fn cyclic_primitive(u: f64, span: f64) -> f64 {
    let turns = u.floor();
    turns * unit_cycle_integral(span) + (span * LN_2 * (u - turns)).exp_m1() / (span * LN_2)
}
