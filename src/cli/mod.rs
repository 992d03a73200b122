//! CLI Module
//!
//! Command-line interface for rendering stimuli to WAV.

pub mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::layers::Direction;

/// Endless - auditory illusion synthesizer
#[derive(Parser, Debug)]
#[command(name = "endless")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub output: OutputArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Options shared by every rendering command
#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Directory for WAV files and the manifest [default: stimuli]
    #[arg(short, long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// WAV bit depth: 16, 24 or 32 (float) [default: 16]
    #[arg(long, global = true)]
    pub bit_depth: Option<u16>,

    /// Sample rate in Hz [default: 44100]
    #[arg(long, global = true)]
    pub sample_rate: Option<u32>,

    /// Peak level after normalization, in (0, 1]
    #[arg(long, global = true)]
    pub target_peak: Option<f64>,
}

/// Direction of motion
#[derive(Args, Debug, Clone, Copy)]
pub struct DirectionArgs {
    /// Fall instead of rise
    #[arg(long)]
    pub falling: bool,
}

impl DirectionArgs {
    pub fn direction(&self) -> Direction {
        if self.falling {
            Direction::Falling
        } else {
            Direction::Rising
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render a Shepard tone
    #[command(name = "shepard")]
    Shepard {
        /// Duration in seconds
        #[arg(short, long, default_value_t = 30.0)]
        duration: f64,

        /// Lowest layer frequency in Hz
        #[arg(short, long, default_value_t = 55.0)]
        base: f64,

        /// Number of octave layers
        #[arg(short, long, default_value_t = 8)]
        layers: usize,

        /// Octaves each layer travels over the duration
        #[arg(long, default_value_t = 1.0)]
        octave_range: f64,

        #[command(flatten)]
        direction: DirectionArgs,

        /// Output name (generated when omitted)
        #[arg(long)]
        name: Option<String>,
    },

    /// Render an event-based Risset rhythm
    #[command(name = "risset")]
    Risset {
        /// Duration in seconds
        #[arg(short, long, default_value_t = 20.0)]
        duration: f64,

        /// Base tempo in BPM
        #[arg(short, long, default_value_t = 80.0)]
        bpm: f64,

        /// Number of layers
        #[arg(short, long, default_value_t = 3)]
        layers: usize,

        /// Use the seamlessly loopable law with this cycle length in seconds
        #[arg(long, conflicts_with = "linear")]
        cycle: Option<f64>,

        /// Ramp the tempo linearly instead of exponentially
        #[arg(long)]
        linear: bool,

        /// Steep gate, loudness emphasis and sharp hits over 3 octaves
        #[arg(long, conflicts_with = "cycle")]
        stronger: bool,

        /// Octaves each layer travels over the duration
        #[arg(long)]
        octave_range: Option<f64>,

        #[command(flatten)]
        direction: DirectionArgs,

        /// Output name (generated when omitted)
        #[arg(long)]
        name: Option<String>,
    },

    /// Render a loop-based Risset rhythm from a drum pattern
    #[command(name = "pattern")]
    Pattern {
        /// Duration in seconds
        #[arg(short, long, default_value_t = 20.0)]
        duration: f64,

        /// Base tempo in BPM
        #[arg(short, long, default_value_t = 80.0)]
        bpm: f64,

        /// Number of layers
        #[arg(short, long, default_value_t = 2)]
        layers: usize,

        /// Seed for the snare noise
        #[arg(long, default_value_t = 0)]
        seed: u64,

        #[command(flatten)]
        direction: DirectionArgs,

        /// Output name (generated when omitted)
        #[arg(long)]
        name: Option<String>,
    },

    /// Render beeps on a linear tempo ramp
    #[command(name = "tempo-ramp")]
    TempoRamp {
        /// Starting tempo in BPM
        start_bpm: f64,

        /// Final tempo in BPM
        end_bpm: f64,

        /// Duration in seconds
        duration: f64,

        /// Beep frequency in Hz
        #[arg(long, default_value_t = 800.0)]
        beep_freq: f64,

        /// Beep length in seconds
        #[arg(long, default_value_t = 0.1)]
        beep_duration: f64,

        /// Output name (generated when omitted)
        #[arg(long)]
        name: Option<String>,
    },

    /// Render a sine on a linear pitch ramp
    #[command(name = "pitch-ramp")]
    PitchRamp {
        /// Starting frequency in Hz
        start_hz: f64,

        /// Final frequency in Hz
        end_hz: f64,

        /// Duration in seconds
        duration: f64,

        /// Sine amplitude
        #[arg(long, default_value_t = 0.8)]
        amplitude: f64,

        /// Output name (generated when omitted)
        #[arg(long)]
        name: Option<String>,
    },

    /// Render every request and sweep in a JSON batch file
    #[command(name = "batch")]
    Batch {
        /// Path to the batch file
        file: PathBuf,
    },
}
