//! Layer specification
//!
//! Parameters shared by the oscillator and event generators. A `LayerSpec`
//! is validated before any buffer is allocated.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SynthError};

/// Direction of the perceived motion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    #[serde(alias = "up", alias = "accelerating")]
    Rising,
    #[serde(alias = "down", alias = "decelerating")]
    Falling,
}

impl Direction {
    /// +1 for rising, -1 for falling
    #[inline]
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Rising => 1.0,
            Direction::Falling => -1.0,
        }
    }

    /// Tag used in rhythm file names
    pub fn tempo_label(&self) -> &'static str {
        match self {
            Direction::Rising => "up",
            Direction::Falling => "down",
        }
    }

    /// Tag used in tone file names
    pub fn pitch_label(&self) -> &'static str {
        match self {
            Direction::Rising => "rising",
            Direction::Falling => "falling",
        }
    }
}

/// Shape of the rate (frequency or tempo) change over time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LawKind {
    /// Rate interpolates linearly across the octave range
    Linear,
    /// Rate doubles every `duration / octave_range` seconds
    #[default]
    Exponential,
    /// Log-periodic: rate climbs one octave per cycle, then wraps
    #[serde(alias = "cyclic")]
    CyclicExponential,
}

/// How layers are spread across the rate axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerSpacing {
    /// Layer `i` starts at `base · 2^i` (Shepard tones)
    Octave,
    /// Layer `i` starts at `base · 2^(i / layer_count)` (Risset rhythms)
    Fractional,
}

impl LayerSpacing {
    /// Rate multiplier applied to layer `layer_index` of `layer_count`
    pub fn multiplier(&self, layer_index: usize, layer_count: usize) -> f64 {
        match self {
            LayerSpacing::Octave => 2f64.powi(layer_index as i32),
            LayerSpacing::Fractional => 2f64.powf(layer_index as f64 / layer_count as f64),
        }
    }

    /// Octaves covered by one full cycle of a cyclic layer
    pub fn cycle_span(&self, layer_count: usize) -> f64 {
        match self {
            LayerSpacing::Octave => layer_count as f64,
            LayerSpacing::Fractional => 1.0,
        }
    }
}

/// One layer of an illusion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub layer_index: usize,
    pub layer_count: usize,
    /// Base frequency in Hz (oscillators) or base rate in events/s
    pub base: f64,
    pub direction: Direction,
    pub law: LawKind,
    pub duration_secs: f64,
    /// Octaves traversed over the duration (linear and exponential laws)
    pub octave_range: f64,
    /// Cycle length in seconds (cyclic law only)
    pub cycle_length: Option<f64>,
}

fn require_positive(name: &str, value: f64) -> Result<()> {
    if !(value > 0.0 && value.is_finite()) {
        return Err(SynthError::invalid(
            name,
            format!("must be positive and finite, got {}", value),
        ));
    }
    Ok(())
}

impl LayerSpec {
    /// Check every invariant; nothing is allocated before this passes
    pub fn validate(&self) -> Result<()> {
        if self.layer_count == 0 {
            return Err(SynthError::invalid("layer_count", "must be at least 1"));
        }
        if self.layer_index >= self.layer_count {
            return Err(SynthError::invalid(
                "layer_index",
                format!(
                    "{} is not below layer_count {}",
                    self.layer_index, self.layer_count
                ),
            ));
        }
        require_positive("base", self.base)?;
        require_positive("duration_secs", self.duration_secs)?;

        match self.law {
            LawKind::Linear | LawKind::Exponential => {
                require_positive("octave_range", self.octave_range)?;
            }
            LawKind::CyclicExponential => match self.cycle_length {
                Some(cycle) => require_positive("cycle_length", cycle)?,
                None => {
                    return Err(SynthError::invalid(
                        "cycle_length",
                        "required by the cyclic law",
                    ))
                }
            },
        }
        Ok(())
    }

    /// Same spec for another layer index
    pub fn for_layer(&self, layer_index: usize) -> Self {
        Self {
            layer_index,
            ..*self
        }
    }
}
