//! Error handling for Endless
//!
//! Every error carries an error code and recovery suggestions so front ends
//! can surface generation failures verbatim.

use thiserror::Error;

/// Result type alias for Endless operations
pub type Result<T> = std::result::Result<T, SynthError>;

/// Main error type for synthesis and export
#[derive(Error, Debug)]
pub enum SynthError {
    // Parameter Errors
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Layer length mismatch: expected {expected} samples, found {found}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("Sample rate mismatch: expected {expected} Hz, found {found} Hz")]
    SampleRateMismatch { expected: u32, found: u32 },

    #[error("Mix requires at least one layer")]
    EmptyMix,

    // Generation Errors
    #[error("Non-finite value during {stage}: {detail}")]
    NonFiniteComputation { stage: String, detail: String },

    // Export Errors
    #[error("Unsupported export format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Export to {path} failed: {reason}")]
    Export { path: String, reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SynthError {
    /// Shorthand for an `InvalidParameter` error
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        SynthError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a `NonFiniteComputation` error
    pub fn non_finite(stage: impl Into<String>, detail: impl Into<String>) -> Self {
        SynthError::NonFiniteComputation {
            stage: stage.into(),
            detail: detail.into(),
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            SynthError::InvalidParameter { .. } => "INVALID_PARAMETER",
            SynthError::LengthMismatch { .. } => "LENGTH_MISMATCH",
            SynthError::SampleRateMismatch { .. } => "SAMPLE_RATE_MISMATCH",
            SynthError::EmptyMix => "EMPTY_MIX",
            SynthError::NonFiniteComputation { .. } => "NON_FINITE_COMPUTATION",
            SynthError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            SynthError::Export { .. } => "EXPORT_ERROR",
            SynthError::Io(_) => "IO_ERROR",
            SynthError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable by changing the request
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SynthError::InvalidParameter { .. }
                | SynthError::UnsupportedFormat { .. }
                | SynthError::Export { .. }
                | SynthError::Io(_)
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            SynthError::InvalidParameter { .. } => vec![
                "Durations, frequencies, tempos and sample rates must be positive",
                "Layer index must be smaller than the layer count",
                "Cyclic laws need a positive cycle length",
            ],
            SynthError::LengthMismatch { .. } | SynthError::SampleRateMismatch { .. } => vec![
                "Render every layer with the same duration and sample rate before mixing",
            ],
            SynthError::NonFiniteComputation { .. } => vec![
                "Check for a zero base frequency or tempo",
                "Reduce the octave range; very large ranges overflow the rate law",
            ],
            SynthError::UnsupportedFormat { .. } => {
                vec!["Supported WAV bit depths: 16, 24, 32 (float)"]
            }
            SynthError::Export { .. } | SynthError::Io(_) => vec![
                "Check that the output directory exists and is writable",
                "Free up disk space",
            ],
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = SynthError::invalid("duration_secs", "must be positive");
        assert_eq!(err.error_code(), "INVALID_PARAMETER");
        assert_eq!(
            err.to_string(),
            "Invalid parameter 'duration_secs': must be positive"
        );
    }

    #[test]
    fn test_recovery_suggestions() {
        let err = SynthError::non_finite("event clock", "rate is NaN");
        assert!(!err.recovery_suggestions().is_empty());
        assert!(!err.is_recoverable());

        let err = SynthError::UnsupportedFormat {
            format: "8-bit".to_string(),
        };
        assert!(err.is_recoverable());
    }
}
