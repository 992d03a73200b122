//! Endless - Auditory Illusion Synthesis
//!
//! Renders perceptually endless pitch and tempo change from finite layers:
//! Shepard tones, Risset rhythms, and the tempo/pitch ramps used as
//! controls.
//!
//! # Architecture
//!
//! Each stimulus is a sum of layers:
//! - Layer generators: oscillator, event clock, looped pattern
//! - DSP: envelopes, short waveforms, mixer/normalizer
//! - Engine: request assembly and WAV export

pub mod cli;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod layers;

pub use error::{Result, SynthError};
