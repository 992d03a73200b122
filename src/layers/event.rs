//! Event Layer Generator
//!
//! Percussive layers driven by an event clock: the time cursor advances by
//! the reciprocal of the instantaneous rate, so onset spacing follows the
//! integrated rate law instead of a relabelled fixed grid.
//!
//! Onset timing ([`Onsets`]) and stamping ([`stamp_onsets`]) are separate
//! steps so each can be tested on its own.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::dsp::envelope::{loudness_emphasis, Envelope};
use crate::dsp::waveform::HitParams;
use crate::engine::buffer::{sample_count, validate_sample_rate, SignalBuffer};
use crate::error::{Result, SynthError};
use crate::layers::law::RateLaw;
use crate::layers::spec::{Direction, LayerSpacing, LayerSpec};

/// A single scheduled hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Onset {
    /// Onset time in seconds from the start of the buffer
    pub time: f64,
    /// Gain applied to the stamped waveform
    pub gain: f64,
    /// Instantaneous rate (events/s) when the onset fired
    pub rate: f64,
}

/// Lazy onset sequence for one layer
///
/// Yields `Err` once and then stops if the rate law produces a non-finite
/// or non-positive rate. Aperiodic laws step the clock by `1 / rate`.
/// Cyclic laws place a whole number of onsets in each period at equal
/// steps of integrated rate, so every period is an exact copy of the first
/// and the last interval of a period ends on the boundary.
#[derive(Debug, Clone)]
pub struct Onsets {
    law: RateLaw,
    envelope: Envelope,
    emphasis: Option<Direction>,
    duration: f64,
    cycle: Option<CycleClock>,
    /// Clock time since 0 for aperiodic laws
    local: f64,
    /// Onsets emitted so far, for cyclic laws
    index: usize,
    done: bool,
}

/// Onset grid of one period of a cyclic law
#[derive(Debug, Clone, Copy, PartialEq)]
struct CycleClock {
    period: f64,
    events: usize,
    /// Integrated rate between consecutive onsets, close to 1
    step: f64,
}

impl CycleClock {
    fn new(law: &RateLaw, period: f64) -> Self {
        let per_period = law.integral(period);
        let events = per_period.round().max(1.0) as usize;
        Self {
            period,
            events,
            step: per_period / events as f64,
        }
    }

    fn is_valid(&self) -> bool {
        self.period.is_finite() && self.period > 0.0 && self.step.is_finite() && self.step > 0.0
    }
}

impl Onsets {
    pub fn new(law: RateLaw, envelope: Envelope, duration: f64) -> Self {
        Self {
            law,
            envelope,
            emphasis: None,
            duration,
            cycle: law.period().map(|period| CycleClock::new(&law, period)),
            local: 0.0,
            index: 0,
            done: false,
        }
    }

    /// Scale gains by the loudness ramp for `direction`
    pub fn with_loudness_emphasis(mut self, direction: Direction) -> Self {
        self.emphasis = Some(direction);
        self
    }

    fn fail(&mut self, err: SynthError) -> Option<Result<Onset>> {
        self.done = true;
        Some(Err(err))
    }

    /// Absolute time and time within the period of the next onset
    fn next_time(&self, cycle: &CycleClock) -> Result<(f64, f64)> {
        if !cycle.is_valid() {
            return Err(SynthError::non_finite(
                "event clock",
                format!(
                    "period {}s gives an onset step of {}",
                    cycle.period, cycle.step
                ),
            ));
        }
        let turn = (self.index / cycle.events) as f64;
        let slot = self.index % cycle.events;
        let local = if slot == 0 {
            0.0
        } else {
            self.law
                .cyclic_time_at(slot as f64 * cycle.step)
                .filter(|t| t.is_finite())
                .ok_or_else(|| {
                    SynthError::non_finite("event clock", format!("onset {} has no time", slot))
                })?
        };
        Ok((turn * cycle.period + local, local))
    }
}

impl Iterator for Onsets {
    type Item = Result<Onset>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let (time, local) = match self.cycle {
            Some(cycle) => match self.next_time(&cycle) {
                Ok(times) => times,
                Err(err) => return self.fail(err),
            },
            None => (self.local, self.local),
        };
        if !(time < self.duration) {
            self.done = true;
            return None;
        }

        let rate = match self.law.checked_rate_at(local) {
            Ok(rate) => rate,
            Err(err) => return self.fail(err),
        };

        let mut gain = self.envelope.evaluate(self.law.envelope_position(local));
        if let Some(direction) = self.emphasis {
            gain *= loudness_emphasis((time / self.duration).clamp(0.0, 1.0), direction);
        }
        if !gain.is_finite() {
            return self.fail(SynthError::non_finite(
                "event clock",
                format!("gain at t={:.6}s is {}", time, gain),
            ));
        }

        if self.cycle.is_some() {
            self.index += 1;
        } else {
            let next = self.local + 1.0 / rate;
            if !(next > self.local) {
                return self.fail(SynthError::non_finite(
                    "event clock",
                    format!("interval at t={:.6}s does not advance (rate {})", time, rate),
                ));
            }
            self.local = next;
        }

        Some(Ok(Onset { time, gain, rate }))
    }
}

/// Add `gain · waveform` into `buffer` at every onset
///
/// Waveforms that overrun the end of the buffer are truncated. Returns the
/// number of onsets stamped.
pub fn stamp_onsets<I>(buffer: &mut SignalBuffer, onsets: I, waveform: &[f32]) -> Result<usize>
where
    I: IntoIterator<Item = Result<Onset>>,
{
    let sr = buffer.sample_rate() as f64;
    let samples = buffer.samples_mut();
    let mut count = 0;

    for onset in onsets {
        let onset = onset?;
        let start = (onset.time * sr) as usize;
        if start < samples.len() {
            let gain = onset.gain as f32;
            for (dst, src) in samples[start..].iter_mut().zip(waveform) {
                *dst += src * gain;
            }
        }
        count += 1;
    }

    Ok(count)
}

/// Parameters of one Risset-rhythm layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventLayer {
    pub spec: LayerSpec,
    pub spacing: LayerSpacing,
    pub envelope: Envelope,
    pub loudness_emphasis: bool,
    pub hit: HitParams,
    pub sample_rate: u32,
}

impl EventLayer {
    /// Fractionally spaced layer with the sine-Shepard envelope
    pub fn risset(spec: LayerSpec, hit: HitParams, sample_rate: u32) -> Self {
        Self {
            spec,
            spacing: LayerSpacing::Fractional,
            envelope: Envelope::SineShepard,
            loudness_emphasis: false,
            hit,
            sample_rate,
        }
    }

    /// Onset sequence of this layer, without rendering
    pub fn onsets(&self) -> Result<Onsets> {
        let law = RateLaw::from_spec(&self.spec, self.spacing)?;
        let onsets = Onsets::new(law, self.envelope, self.spec.duration_secs);
        Ok(if self.loudness_emphasis {
            onsets.with_loudness_emphasis(self.spec.direction)
        } else {
            onsets
        })
    }

    /// Render the layer
    pub fn generate(&self) -> Result<SignalBuffer> {
        validate_sample_rate(self.sample_rate)?;
        self.envelope.validate()?;
        self.hit.validate()?;
        let onsets = self.onsets()?;

        let hit = self.hit.render(self.spec.layer_index, self.sample_rate);
        let mut buffer = SignalBuffer::silence(
            sample_count(self.spec.duration_secs, self.sample_rate),
            self.sample_rate,
        );
        let count = stamp_onsets(&mut buffer, onsets, &hit)?;
        buffer.ensure_finite("event layer")?;

        debug!(
            "Event layer {}/{}: {} onsets, hit {:.0}Hz",
            self.spec.layer_index + 1,
            self.spec.layer_count,
            count,
            self.hit.frequency_for_layer(self.spec.layer_index)
        );

        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::spec::LawKind;
    use approx::assert_abs_diff_eq;

    fn exponential_spec(octave_range: f64, duration_secs: f64) -> LayerSpec {
        LayerSpec {
            layer_index: 0,
            layer_count: 1,
            base: 80.0 / 60.0,
            direction: Direction::Rising,
            law: LawKind::Exponential,
            duration_secs,
            octave_range,
            cycle_length: None,
        }
    }

    fn collect(onsets: Onsets) -> Vec<Onset> {
        onsets.collect::<Result<Vec<_>>>().unwrap()
    }

    #[test]
    fn test_onsets_follow_integrated_rate() {
        let spec = exponential_spec(1.0, 20.0);
        let layer = EventLayer::risset(spec, HitParams::neutral(), 44100);
        let onsets = collect(layer.onsets().unwrap());

        // Strictly increasing times and rates
        for pair in onsets.windows(2) {
            assert!(pair[1].time > pair[0].time);
            assert!(pair[1].rate > pair[0].rate);
        }

        // ∫ (4/3)·2^(t/20) dt over [0, 20]
        let expected = (80.0 / 60.0) * 20.0 / std::f64::consts::LN_2;
        assert!(
            (onsets.len() as f64 - expected).abs() <= 1.0,
            "{} onsets vs integral {:.2}",
            onsets.len(),
            expected
        );
    }

    #[test]
    fn test_spacing_is_not_a_fixed_grid() {
        let layer = EventLayer::risset(exponential_spec(1.0, 20.0), HitParams::neutral(), 44100);
        let onsets = collect(layer.onsets().unwrap());
        let first = onsets[1].time - onsets[0].time;
        let last = onsets[onsets.len() - 1].time - onsets[onsets.len() - 2].time;
        assert_abs_diff_eq!(first, 0.75, epsilon = 1e-12);
        assert!(last < 0.4);
    }

    #[test]
    fn test_gain_uses_envelope_position() {
        let layer = EventLayer::risset(exponential_spec(1.0, 20.0), HitParams::neutral(), 44100);
        for onset in collect(layer.onsets().unwrap()) {
            let expected = (std::f64::consts::PI * onset.time / 20.0).sin();
            assert_abs_diff_eq!(onset.gain, expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_loudness_emphasis_scales_gain() {
        let mut layer =
            EventLayer::risset(exponential_spec(1.0, 20.0), HitParams::sharp(), 44100);
        let plain = collect(layer.onsets().unwrap());
        layer.loudness_emphasis = true;
        let emphasized = collect(layer.onsets().unwrap());

        assert_eq!(plain.len(), emphasized.len());
        for (p, e) in plain.iter().zip(&emphasized) {
            let ramp = 0.6 + 0.4 * p.time / 20.0;
            assert_abs_diff_eq!(e.gain, p.gain * ramp, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_cyclic_onsets_repeat_each_period() {
        let spec = LayerSpec {
            layer_index: 1,
            layer_count: 3,
            base: 1.5,
            direction: Direction::Rising,
            law: LawKind::CyclicExponential,
            duration_secs: 30.0,
            octave_range: 1.0,
            cycle_length: Some(6.0),
        };
        let layer = EventLayer::risset(spec, HitParams::cyclic(), 44100);
        let onsets = collect(layer.onsets().unwrap());

        let window = |from: f64| -> Vec<Onset> {
            onsets
                .iter()
                .copied()
                .filter(|o| o.time >= from && o.time < from + 6.0)
                .collect()
        };
        let first = window(0.0);
        for k in 1..5 {
            let other = window(6.0 * k as f64);
            assert_eq!(first.len(), other.len());
            for (a, b) in first.iter().zip(&other) {
                assert_abs_diff_eq!(b.time - 6.0 * k as f64, a.time, epsilon = 1e-9);
                assert_abs_diff_eq!(b.gain, a.gain, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_cyclic_gaps_follow_rate_across_seams() {
        for direction in [Direction::Rising, Direction::Falling] {
            for layer_index in 0..6 {
                let spec = LayerSpec {
                    layer_index,
                    layer_count: 6,
                    base: 1.5,
                    direction,
                    law: LawKind::CyclicExponential,
                    duration_secs: 30.0,
                    octave_range: 1.0,
                    cycle_length: Some(6.0),
                };
                let law = RateLaw::from_spec(&spec, LayerSpacing::Fractional).unwrap();
                let layer = EventLayer::risset(spec, HitParams::cyclic(), 44100);
                let onsets = collect(layer.onsets().unwrap());

                for k in 0..5 {
                    let boundary = 6.0 * k as f64;
                    assert!(
                        onsets.iter().any(|o| (o.time - boundary).abs() < 1e-9),
                        "{:?} layer {}: no onset at {}s",
                        direction,
                        layer_index,
                        boundary
                    );
                }

                for pair in onsets.windows(2) {
                    let (a, b) = (pair[0], pair[1]);
                    let gap = b.time - a.time;
                    assert!(
                        gap > 0.3,
                        "{:?} layer {}: {:.4}s gap at {:.3}s",
                        direction,
                        layer_index,
                        gap,
                        a.time
                    );

                    // One event of integrated rate per interval
                    let events = law.integral(b.time) - law.integral(a.time);
                    assert_abs_diff_eq!(events, 1.0, epsilon = 0.05);

                    let (pa, pb) = (law.cyclic_phase(a.time), law.cyclic_phase(b.time));
                    let wrapped = match direction {
                        Direction::Rising => pb < pa,
                        Direction::Falling => pb > pa,
                    };
                    if !wrapped {
                        assert!(
                            (gap * a.rate - 1.0).abs() < 0.1,
                            "{:?} layer {}: gap {:.4}s vs 1/rate {:.4}s",
                            direction,
                            layer_index,
                            gap,
                            1.0 / a.rate
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_zero_duration_yields_no_onsets() {
        let law = RateLaw::bpm_ramp(60.0, 100.0, 0.0);
        let mut onsets = Onsets::new(law, Envelope::unity(), 0.0);
        assert!(onsets.next().is_none());
    }

    #[test]
    fn test_zero_rate_fails_fast() {
        let law = RateLaw::linear(0.0, 0.0, 5.0);
        let results: Vec<_> = Onsets::new(law, Envelope::unity(), 5.0).collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(SynthError::NonFiniteComputation { .. })));
    }

    #[test]
    fn test_stamp_truncates_at_buffer_end() {
        let mut buffer = SignalBuffer::silence(10, 10);
        let onsets = vec![
            Ok(Onset { time: 0.0, gain: 1.0, rate: 1.0 }),
            Ok(Onset { time: 0.8, gain: 0.5, rate: 1.0 }),
        ];
        let count = stamp_onsets(&mut buffer, onsets, &[1.0, 1.0, 1.0, 1.0]).unwrap();
        assert_eq!(count, 2);
        assert_eq!(
            buffer.samples(),
            &[1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.5, 0.5]
        );
    }

    #[test]
    fn test_generate_layer() {
        let layer = EventLayer::risset(exponential_spec(1.0, 2.0), HitParams::neutral(), 44100);
        let buffer = layer.generate().unwrap();
        assert_eq!(buffer.len(), 88200);
        assert!(buffer.is_finite());
        assert!(buffer.peak() > 0.0);
    }

    #[test]
    fn test_generate_rejects_invalid_spec() {
        let mut spec = exponential_spec(1.0, 2.0);
        spec.base = 0.0;
        let layer = EventLayer::risset(spec, HitParams::neutral(), 44100);
        assert!(matches!(layer.generate(), Err(SynthError::InvalidParameter { .. })));
    }
}
