//! DSP building blocks
//!
//! Envelopes, short waveforms and the mixer shared by every layer
//! generator.

pub mod envelope;
pub mod mixer;
pub mod waveform;

pub use envelope::Envelope;
pub use mixer::{mix, normalize, MixResult, DEFAULT_EVENT_PEAK, DEFAULT_TONE_PEAK};
pub use waveform::HitParams;
