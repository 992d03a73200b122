//! Stimulus Assembler
//!
//! Turns a configuration record into layer specs, renders every layer and
//! mixes them. Each request is independent; sweeps expand into many
//! requests up front.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::dsp::envelope::{Envelope, DEFAULT_GATE_SLOPE};
use crate::dsp::mixer::{
    mix, validate_target_peak, MixResult, DEFAULT_EVENT_PEAK, DEFAULT_TONE_PEAK,
};
use crate::dsp::waveform::HitParams;
use crate::engine::buffer::{validate_sample_rate, SignalBuffer, DEFAULT_SAMPLE_RATE};
use crate::error::{Result, SynthError};
use crate::layers::{
    seeded_pattern, Direction, EventLayer, LawKind, LayerSpacing, LayerSpec, OscillatorLayer,
    PatternLayer, PitchRamp, TempoRamp,
};

/// Family of illusion to synthesize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StimulusKind {
    /// Continuous sine layers, `base` in Hz
    ShepardTone,
    /// Hits on an event clock, `base` in BPM
    RissetRhythm,
    /// Looped drum pattern replayed at a ramping speed, `base` in BPM
    PatternRhythm,
}

impl StimulusKind {
    pub fn default_target_peak(&self) -> f64 {
        match self {
            StimulusKind::ShepardTone | StimulusKind::PatternRhythm => DEFAULT_TONE_PEAK,
            StimulusKind::RissetRhythm => DEFAULT_EVENT_PEAK,
        }
    }

    pub fn default_envelope(&self) -> Envelope {
        match self {
            StimulusKind::ShepardTone => Envelope::shepard_gaussian(),
            StimulusKind::RissetRhythm => Envelope::SineShepard,
            StimulusKind::PatternRhythm => Envelope::LinearFade,
        }
    }

    pub fn default_spacing(&self) -> LayerSpacing {
        match self {
            StimulusKind::ShepardTone | StimulusKind::PatternRhythm => LayerSpacing::Octave,
            StimulusKind::RissetRhythm => LayerSpacing::Fractional,
        }
    }

    pub fn default_law(&self) -> LawKind {
        match self {
            StimulusKind::ShepardTone | StimulusKind::RissetRhythm => LawKind::Exponential,
            StimulusKind::PatternRhythm => LawKind::Linear,
        }
    }

    /// Whether layers are stamped with per-layer hits
    pub fn uses_hits(&self) -> bool {
        *self == StimulusKind::RissetRhythm
    }
}

fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}

fn default_octave_range() -> f64 {
    1.0
}

/// Everything needed to render one illusion
///
/// Optional fields fall back to defaults chosen by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StimulusConfig {
    /// Output name; generated from the parameters when absent
    #[serde(default)]
    pub name: Option<String>,
    pub kind: StimulusKind,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    pub duration_secs: f64,
    /// Hz for tones, BPM for rhythms
    pub base: f64,
    pub layer_count: usize,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub law: Option<LawKind>,
    #[serde(default)]
    pub cycle_length: Option<f64>,
    #[serde(default = "default_octave_range")]
    pub octave_range: f64,
    #[serde(default)]
    pub target_peak: Option<f64>,
    #[serde(default)]
    pub envelope: Option<Envelope>,
    #[serde(default)]
    pub spacing: Option<LayerSpacing>,
    #[serde(default)]
    pub loudness_emphasis: bool,
    #[serde(default)]
    pub hit: Option<HitParams>,
    /// Seed for the snare noise of pattern rhythms
    #[serde(default)]
    pub seed: u64,
}

impl StimulusConfig {
    pub fn new(kind: StimulusKind, duration_secs: f64, base: f64, layer_count: usize) -> Self {
        Self {
            name: None,
            kind,
            sample_rate: DEFAULT_SAMPLE_RATE,
            duration_secs,
            base,
            layer_count,
            direction: Direction::Rising,
            law: None,
            cycle_length: None,
            octave_range: 1.0,
            target_peak: None,
            envelope: None,
            spacing: None,
            loudness_emphasis: false,
            hit: None,
            seed: 0,
        }
    }

    /// Octave-spaced Shepard tone starting at `base_hz`
    pub fn shepard_tone(duration_secs: f64, base_hz: f64, layer_count: usize) -> Self {
        Self::new(StimulusKind::ShepardTone, duration_secs, base_hz, layer_count)
    }

    /// Exponential Risset rhythm starting at `base_bpm`
    pub fn risset_rhythm(duration_secs: f64, base_bpm: f64, layer_count: usize) -> Self {
        Self::new(StimulusKind::RissetRhythm, duration_secs, base_bpm, layer_count)
    }

    /// Loop-based Risset rhythm starting at `base_bpm`; tempo ramps linearly
    pub fn pattern_rhythm(duration_secs: f64, base_bpm: f64, layer_count: usize) -> Self {
        let mut config = Self::new(
            StimulusKind::PatternRhythm,
            duration_secs,
            base_bpm,
            layer_count,
        );
        config.law = Some(LawKind::Linear);
        config
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Switch to the seamlessly loopable law
    pub fn cyclic(mut self, cycle_length: f64) -> Self {
        self.law = Some(LawKind::CyclicExponential);
        self.cycle_length = Some(cycle_length);
        self
    }

    /// The "stronger" rhythm: steep gate, loudness ramp, sharper hits and
    /// a wider tempo range
    pub fn stronger(mut self, octave_range: f64) -> Self {
        self.envelope = Some(Envelope::SmoothedGate {
            slope: DEFAULT_GATE_SLOPE,
        });
        self.loudness_emphasis = true;
        self.hit = Some(HitParams::sharp());
        self.octave_range = octave_range;
        self
    }

    pub fn target_peak(&self) -> f64 {
        self.target_peak
            .unwrap_or_else(|| self.kind.default_target_peak())
    }

    pub fn law(&self) -> LawKind {
        self.law.unwrap_or_else(|| self.kind.default_law())
    }

    pub fn envelope(&self) -> Envelope {
        self.envelope.unwrap_or_else(|| self.kind.default_envelope())
    }

    pub fn spacing(&self) -> LayerSpacing {
        self.spacing.unwrap_or_else(|| self.kind.default_spacing())
    }

    pub fn hit(&self) -> HitParams {
        self.hit.unwrap_or_else(|| match self.law() {
            LawKind::CyclicExponential => HitParams::cyclic(),
            _ => HitParams::neutral(),
        })
    }

    /// Spec of layer 0; event rhythms convert BPM to events per second
    pub fn layer_spec(&self) -> LayerSpec {
        let base = match self.kind {
            StimulusKind::RissetRhythm => self.base / 60.0,
            StimulusKind::ShepardTone | StimulusKind::PatternRhythm => self.base,
        };
        LayerSpec {
            layer_index: 0,
            layer_count: self.layer_count,
            base,
            direction: self.direction,
            law: self.law(),
            duration_secs: self.duration_secs,
            octave_range: self.octave_range,
            cycle_length: self.cycle_length,
        }
    }

    /// Check every parameter before anything is rendered
    pub fn validate(&self) -> Result<()> {
        validate_sample_rate(self.sample_rate)?;
        validate_target_peak(self.target_peak())?;
        self.layer_spec().validate()?;
        self.envelope().validate()?;

        if self.kind == StimulusKind::PatternRhythm {
            if self.law() != LawKind::Linear {
                return Err(SynthError::invalid(
                    "law",
                    format!("pattern rhythms ramp linearly, got {:?}", self.law()),
                ));
            }
            if self.spacing() != LayerSpacing::Octave {
                return Err(SynthError::invalid(
                    "spacing",
                    "pattern rhythm layers are an octave apart",
                ));
            }
        }

        if self.kind.uses_hits() {
            self.hit().validate()?;
        } else {
            if self.hit.is_some() {
                return Err(SynthError::invalid(
                    "hit",
                    format!("{:?} layers have no hits", self.kind),
                ));
            }
            if self.loudness_emphasis {
                return Err(SynthError::invalid(
                    "loudness_emphasis",
                    format!("only applies to event rhythms, not {:?}", self.kind),
                ));
            }
        }
        Ok(())
    }

    /// Name used for the output file
    pub fn file_stem(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        match self.kind {
            StimulusKind::ShepardTone => format!(
                "shepard_{}_{}s_{}Hz_{}layers",
                self.direction.pitch_label(),
                self.duration_secs,
                self.base,
                self.layer_count
            ),
            StimulusKind::RissetRhythm | StimulusKind::PatternRhythm => {
                let suffix = match (self.kind, self.law()) {
                    (StimulusKind::PatternRhythm, _) => "_pattern",
                    (_, LawKind::CyclicExponential) => "_cyclic",
                    (_, LawKind::Linear) => "_linear",
                    (_, LawKind::Exponential) => "",
                };
                format!(
                    "risset_{}_{}s_{}BPM_{}layers{}",
                    self.direction.tempo_label(),
                    self.duration_secs,
                    self.base,
                    self.layer_count,
                    suffix
                )
            }
        }
    }
}

/// Output options shared by the control stimuli
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlRequest<T> {
    #[serde(flatten)]
    pub ramp: T,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default)]
    pub target_peak: Option<f64>,
}

impl<T> ControlRequest<T> {
    pub fn new(ramp: T) -> Self {
        Self {
            ramp,
            name: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
            target_peak: None,
        }
    }
}

/// One unit of work for the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Illusion(StimulusConfig),
    TempoRamp(ControlRequest<TempoRamp>),
    PitchRamp(ControlRequest<PitchRamp>),
}

impl Request {
    pub fn name(&self) -> String {
        match self {
            Request::Illusion(config) => config.file_stem(),
            Request::TempoRamp(request) => request.name.clone().unwrap_or_else(|| {
                let r = &request.ramp;
                format!(
                    "ramp_{}to{}BPM_{}s_{}Hz",
                    r.start_bpm, r.end_bpm, r.duration_secs, r.beep_frequency
                )
            }),
            Request::PitchRamp(request) => request.name.clone().unwrap_or_else(|| {
                let r = &request.ramp;
                format!("pitch_{}to{}_{}s", r.start_hz, r.end_hz, r.duration_secs)
            }),
        }
    }
}

/// A template config rendered across every combination of the listed
/// values. Empty lists keep the template's value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sweep {
    pub template: StimulusConfig,
    #[serde(default)]
    pub durations: Vec<f64>,
    #[serde(default)]
    pub bases: Vec<f64>,
    #[serde(default)]
    pub layer_counts: Vec<usize>,
    #[serde(default)]
    pub directions: Vec<Direction>,
}

fn or_template<T: Copy>(values: &[T], template: T) -> Vec<T> {
    if values.is_empty() {
        vec![template]
    } else {
        values.to_vec()
    }
}

impl Sweep {
    /// Cartesian product of the sweep axes; names are always generated
    pub fn expand(&self) -> Vec<StimulusConfig> {
        let t = &self.template;
        let durations = or_template(&self.durations, t.duration_secs);
        let bases = or_template(&self.bases, t.base);
        let layer_counts = or_template(&self.layer_counts, t.layer_count);
        let directions = or_template(&self.directions, t.direction);

        let mut configs = Vec::new();
        for &direction in &directions {
            for &duration_secs in &durations {
                for &base in &bases {
                    for &layer_count in &layer_counts {
                        configs.push(StimulusConfig {
                            name: None,
                            duration_secs,
                            base,
                            layer_count,
                            direction,
                            ..t.clone()
                        });
                    }
                }
            }
        }
        configs
    }
}

/// Batch of requests read from JSON
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchFile {
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub bit_depth: Option<u16>,
    #[serde(default)]
    pub requests: Vec<Request>,
    #[serde(default)]
    pub sweeps: Vec<Sweep>,
}

impl BatchFile {
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Explicit requests followed by every expanded sweep
    pub fn all_requests(&self) -> Vec<Request> {
        let mut requests = self.requests.clone();
        for sweep in &self.sweeps {
            requests.extend(sweep.expand().into_iter().map(Request::Illusion));
        }
        requests
    }
}

/// A finished, normalized stimulus
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub name: String,
    pub sample_rate: u32,
    pub mix: MixResult,
}

impl Rendered {
    pub fn buffer(&self) -> &SignalBuffer {
        &self.mix.buffer
    }
}

/// Render one request end to end
pub fn render(request: &Request) -> Result<Rendered> {
    let name = request.name();
    let (sample_rate, mix) = match request {
        Request::Illusion(config) => (config.sample_rate, render_illusion(config)?),
        Request::TempoRamp(request) => {
            let peak = request.target_peak.unwrap_or(DEFAULT_EVENT_PEAK);
            validate_target_peak(peak)?;
            let layer = request.ramp.generate(request.sample_rate)?;
            (request.sample_rate, mix(&[layer], peak)?)
        }
        Request::PitchRamp(request) => {
            let peak = request.target_peak.unwrap_or(request.ramp.amplitude);
            validate_target_peak(peak)?;
            let layer = request.ramp.generate(request.sample_rate)?;
            (request.sample_rate, mix(&[layer], peak)?)
        }
    };

    if mix.buffer.is_silent() {
        warn!("{} rendered below the silence threshold", name);
    }
    info!(
        "Rendered {} ({:.2}s, raw peak {:.3})",
        name,
        mix.buffer.duration_secs(),
        mix.peak_before_normalize
    );

    Ok(Rendered {
        name,
        sample_rate,
        mix,
    })
}

/// Render every layer of `config` and mix them
pub fn render_illusion(config: &StimulusConfig) -> Result<MixResult> {
    config.validate()?;

    let spec = config.layer_spec();
    let sample_rate = config.sample_rate;
    let envelope = config.envelope();
    let spacing = config.spacing();

    let layers = match config.kind {
        StimulusKind::ShepardTone => render_layers(spec.layer_count, |i| {
            OscillatorLayer {
                spec: spec.for_layer(i),
                spacing,
                envelope,
                sample_rate,
            }
            .generate()
        })?,
        StimulusKind::RissetRhythm => {
            let hit = config.hit();
            render_layers(spec.layer_count, |i| {
                EventLayer {
                    spec: spec.for_layer(i),
                    spacing,
                    envelope,
                    loudness_emphasis: config.loudness_emphasis,
                    hit,
                    sample_rate,
                }
                .generate()
            })?
        }
        StimulusKind::PatternRhythm => {
            let pattern = seeded_pattern(config.seed, sample_rate);
            render_layers(spec.layer_count, |i| {
                PatternLayer {
                    spec: spec.for_layer(i),
                    envelope,
                    sample_rate,
                }
                .generate(&pattern)
            })?
        }
    };

    mix(&layers, config.target_peak())
}

#[cfg(not(feature = "parallel"))]
fn render_layers<F>(layer_count: usize, render: F) -> Result<Vec<SignalBuffer>>
where
    F: Fn(usize) -> Result<SignalBuffer> + Sync + Send,
{
    (0..layer_count).map(render).collect()
}

#[cfg(feature = "parallel")]
fn render_layers<F>(layer_count: usize, render: F) -> Result<Vec<SignalBuffer>>
where
    F: Fn(usize) -> Result<SignalBuffer> + Sync + Send,
{
    use rayon::prelude::*;

    (0..layer_count).into_par_iter().map(render).collect()
}
