//! CLI Command Implementations
//!
//! Each command builds one or more requests, renders them and exports the
//! results with a manifest.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::cli::{Commands, OutputArgs};
use crate::engine::io::{export_rendered, write_manifest, ExportFormat};
use crate::engine::stimulus::{render, BatchFile, ControlRequest, Request, StimulusConfig};
use crate::error::{Result, SynthError};
use crate::layers::{LawKind, PitchRamp, TempoRamp};

/// Output directory when neither the CLI nor a batch file names one
pub const DEFAULT_OUTPUT_DIR: &str = "stimuli";

/// Octave range of the "stronger" rhythm when none is given
const STRONGER_OCTAVE_RANGE: f64 = 3.0;

/// Dispatch a parsed command
pub fn run(command: Commands, output: &OutputArgs) -> Result<()> {
    match command {
        Commands::Batch { file } => batch(&file, output),
        single => {
            let request = build_request(single, output)?;
            render_all(&[request], &output_dir(output, None), export_format(output, None))
        }
    }
}

fn output_dir(output: &OutputArgs, batch: Option<&BatchFile>) -> PathBuf {
    output
        .output_dir
        .clone()
        .or_else(|| batch.and_then(|b| b.output_dir.clone()))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR))
}

fn export_format(output: &OutputArgs, batch: Option<&BatchFile>) -> ExportFormat {
    output
        .bit_depth
        .or_else(|| batch.and_then(|b| b.bit_depth))
        .map(ExportFormat::new)
        .unwrap_or_default()
}

fn apply_output(mut config: StimulusConfig, output: &OutputArgs) -> StimulusConfig {
    if let Some(sample_rate) = output.sample_rate {
        config.sample_rate = sample_rate;
    }
    if output.target_peak.is_some() {
        config.target_peak = output.target_peak;
    }
    config
}

fn control<T>(ramp: T, name: Option<String>, output: &OutputArgs) -> ControlRequest<T> {
    let mut request = ControlRequest::new(ramp);
    request.name = name;
    if let Some(sample_rate) = output.sample_rate {
        request.sample_rate = sample_rate;
    }
    request.target_peak = output.target_peak;
    request
}

/// Turn a single-stimulus command into a request
pub fn build_request(command: Commands, output: &OutputArgs) -> Result<Request> {
    let request = match command {
        Commands::Shepard {
            duration,
            base,
            layers,
            octave_range,
            direction,
            name,
        } => {
            let mut config = StimulusConfig::shepard_tone(duration, base, layers)
                .with_direction(direction.direction());
            config.octave_range = octave_range;
            config.name = name;
            Request::Illusion(apply_output(config, output))
        }
        Commands::Risset {
            duration,
            bpm,
            layers,
            cycle,
            linear,
            stronger,
            octave_range,
            direction,
            name,
        } => {
            let mut config = StimulusConfig::risset_rhythm(duration, bpm, layers)
                .with_direction(direction.direction());
            if let Some(cycle_length) = cycle {
                config = config.cyclic(cycle_length);
            } else if linear {
                config.law = Some(LawKind::Linear);
            }
            if stronger {
                config = config.stronger(STRONGER_OCTAVE_RANGE);
            }
            if let Some(range) = octave_range {
                config.octave_range = range;
            }
            config.name = name;
            Request::Illusion(apply_output(config, output))
        }
        Commands::Pattern {
            duration,
            bpm,
            layers,
            seed,
            direction,
            name,
        } => {
            let mut config = StimulusConfig::pattern_rhythm(duration, bpm, layers)
                .with_direction(direction.direction());
            config.seed = seed;
            config.name = name;
            Request::Illusion(apply_output(config, output))
        }
        Commands::TempoRamp {
            start_bpm,
            end_bpm,
            duration,
            beep_freq,
            beep_duration,
            name,
        } => {
            let ramp = TempoRamp {
                start_bpm,
                end_bpm,
                duration_secs: duration,
                beep_frequency: beep_freq,
                beep_duration,
            };
            Request::TempoRamp(control(ramp, name, output))
        }
        Commands::PitchRamp {
            start_hz,
            end_hz,
            duration,
            amplitude,
            name,
        } => {
            let ramp = PitchRamp {
                start_hz,
                end_hz,
                duration_secs: duration,
                amplitude,
            };
            Request::PitchRamp(control(ramp, name, output))
        }
        Commands::Batch { .. } => {
            return Err(SynthError::invalid(
                "command",
                "batch files are rendered with `batch`",
            ))
        }
    };
    Ok(request)
}

/// Render every request in a batch file
pub fn batch(path: &Path, output: &OutputArgs) -> Result<()> {
    info!("Loading batch: {}", path.display());

    let batch = BatchFile::load(path)?;
    let requests: Vec<Request> = batch
        .all_requests()
        .into_iter()
        .map(|request| match request {
            Request::Illusion(config) => Request::Illusion(apply_output(config, output)),
            other => other,
        })
        .collect();

    if requests.is_empty() {
        warn!("Batch {} contains no requests", path.display());
    }

    render_all(
        &requests,
        &output_dir(output, Some(&batch)),
        export_format(output, Some(&batch)),
    )
}

/// Render, export and list `requests` in `dir`
pub fn render_all(requests: &[Request], dir: &Path, format: ExportFormat) -> Result<()> {
    format.validate()?;
    fs::create_dir_all(dir)?;

    let mut entries = Vec::with_capacity(requests.len());
    for request in requests {
        let rendered = render(request)?;
        let entry = export_rendered(&rendered, dir, format)?;
        println!(
            "Created {} ({} samples @ {} Hz)",
            dir.join(&entry.file).display(),
            entry.num_samples,
            entry.sample_rate
        );
        entries.push(entry);
    }

    let manifest = write_manifest(dir, &entries)?;
    println!("Manifest: {}", manifest.display());

    Ok(())
}
