//! Export boundary
//!
//! Writes finished stimuli to WAV and records what was written in a
//! `manifest.json` next to them. The engine never reads its own output back.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use hound::{SampleFormat, WavSpec, WavWriter};
use log::info;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::engine::buffer::SignalBuffer;
use crate::engine::stimulus::Rendered;
use crate::error::{Result, SynthError};

/// Name of the manifest written alongside exported files
pub const MANIFEST_FILE: &str = "manifest.json";

/// Export format configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportFormat {
    /// Bit depth: 16, 24, or 32 (float)
    pub bit_depth: u16,
}

impl Default for ExportFormat {
    fn default() -> Self {
        ExportFormat { bit_depth: 16 }
    }
}

impl ExportFormat {
    pub fn new(bit_depth: u16) -> Self {
        ExportFormat { bit_depth }
    }

    /// 32-bit float, lossless for the engine's internal samples
    pub fn float() -> Self {
        ExportFormat { bit_depth: 32 }
    }

    pub fn validate(&self) -> Result<()> {
        match self.bit_depth {
            16 | 24 | 32 => Ok(()),
            other => Err(SynthError::UnsupportedFormat {
                format: format!("{}-bit audio (only 16, 24, 32 supported)", other),
            }),
        }
    }
}

fn export_error(path: &Path, err: impl std::fmt::Display) -> SynthError {
    SynthError::Export {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

/// Write a mono buffer to a WAV file
///
/// The buffer must be finite and within [-1, 1]; otherwise nothing is
/// written.
pub fn export_wav(buffer: &SignalBuffer, path: &Path, format: ExportFormat) -> Result<()> {
    format.validate()?;
    buffer.ensure_finite("export")?;
    if let Some(index) = buffer.samples().iter().position(|s| s.abs() > 1.0) {
        return Err(SynthError::invalid(
            "buffer",
            format!(
                "sample {} is {} (outside [-1, 1])",
                index,
                buffer.samples()[index]
            ),
        ));
    }

    let spec = WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: format.bit_depth,
        sample_format: if format.bit_depth == 32 {
            SampleFormat::Float
        } else {
            SampleFormat::Int
        },
    };

    let mut writer = WavWriter::create(path, spec).map_err(|e| export_error(path, e))?;

    match format.bit_depth {
        16 => {
            for &sample in buffer.samples() {
                let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                writer
                    .write_sample(scaled)
                    .map_err(|e| export_error(path, e))?;
            }
        }
        24 => {
            for &sample in buffer.samples() {
                // 24-bit stored as i32 in hound
                let scaled = (sample * 8388607.0).clamp(-8388608.0, 8388607.0) as i32;
                writer
                    .write_sample(scaled)
                    .map_err(|e| export_error(path, e))?;
            }
        }
        _ => {
            for &sample in buffer.samples() {
                writer
                    .write_sample(sample)
                    .map_err(|e| export_error(path, e))?;
            }
        }
    }

    writer.finalize().map_err(|e| export_error(path, e))?;
    Ok(())
}

/// One exported stimulus as listed in the manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub file: PathBuf,
    pub sample_rate: u32,
    pub num_samples: usize,
    pub bit_depth: u16,
    pub peak_before_normalize: f64,
    pub sha256: String,
    pub generated_at: DateTime<Utc>,
}

/// Manifest of a batch run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub generator: String,
    pub version: String,
    pub entries: Vec<ManifestEntry>,
}

/// SHA-256 of a file as lowercase hex
pub fn file_checksum(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Export `rendered` as `<dir>/<name>.wav` and describe the result
pub fn export_rendered(
    rendered: &Rendered,
    dir: &Path,
    format: ExportFormat,
) -> Result<ManifestEntry> {
    let file = PathBuf::from(format!("{}.wav", rendered.name));
    let path = dir.join(&file);
    export_wav(rendered.buffer(), &path, format)?;

    info!("Wrote {}", path.display());

    Ok(ManifestEntry {
        name: rendered.name.clone(),
        file,
        sample_rate: rendered.sample_rate,
        num_samples: rendered.buffer().len(),
        bit_depth: format.bit_depth,
        peak_before_normalize: rendered.mix.peak_before_normalize,
        sha256: file_checksum(&path)?,
        generated_at: Utc::now(),
    })
}

/// Write `manifest.json` into `dir`, returning its path
pub fn write_manifest(dir: &Path, entries: &[ManifestEntry]) -> Result<PathBuf> {
    let manifest = Manifest {
        generator: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        entries: entries.to_vec(),
    };
    let path = dir.join(MANIFEST_FILE);
    fs::write(&path, serde_json::to_string_pretty(&manifest)?)?;
    Ok(path)
}

// ============================================================================
// Tests
// ============================================================================
