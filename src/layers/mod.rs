//! Layer generators
//!
//! Every illusion is a sum of layers; each module here renders one layer
//! from a validated [`LayerSpec`]:
//! - Oscillator layers: continuous sines (Shepard tones, pitch ramps)
//! - Event layers: hits stamped on an event clock (Risset rhythms, tempo ramps)
//! - Pattern layers: a looped drum pattern replayed at a ramping speed

pub mod controls;
pub mod event;
pub mod law;
pub mod oscillator;
pub mod pattern;
pub mod spec;

pub use controls::{pitch_ramp, tempo_ramp, PitchRamp, TempoRamp};
pub use event::{stamp_onsets, EventLayer, Onset, Onsets};
pub use law::RateLaw;
pub use oscillator::{render_oscillator, EnvelopeDomain, OscillatorLayer};
pub use pattern::{seeded_pattern, PatternLayer};
pub use spec::{Direction, LawKind, LayerSpacing, LayerSpec};
