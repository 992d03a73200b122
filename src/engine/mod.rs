//! Synthesis Engine Module
//!
//! Core engine plumbing:
//! - Signal buffers and level measurements
//! - Stimulus assembly (configs, naming, sweeps)
//! - WAV export and manifests

pub mod buffer;
pub mod io;
pub mod stimulus;

pub use buffer::{SignalBuffer, DEFAULT_SAMPLE_RATE};
pub use io::{export_rendered, export_wav, write_manifest, ExportFormat, ManifestEntry};
pub use stimulus::{
    render, render_illusion, BatchFile, ControlRequest, Rendered, Request, StimulusConfig,
    StimulusKind, Sweep,
};
