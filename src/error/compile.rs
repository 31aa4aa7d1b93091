// Compile error types and constants

use crate::error::{ErrorCode, StorageError};
use log::error;
use std::fmt;
use std::path::PathBuf;

/// Compile error code constants
///
/// Error code range: 3001-3010
pub struct CompileErrorCodes {}

impl CompileErrorCodes {
    /// Audio file sample rate differs from the configured pipeline rate
    pub const SAMPLE_RATE_MISMATCH: i32 = 3001;

    /// Audio file could not be opened or decoded
    pub const AUDIO_READ_FAILED: i32 = 3002;

    /// Ground-truth event file is malformed
    pub const MALFORMED_EVENTS: i32 = 3003;

    /// Decay-curve reference table is missing or unreadable
    pub const DECAY_MODEL_UNAVAILABLE: i32 = 3004;

    /// Window size has no precomputed decay normalization
    pub const UNSUPPORTED_WINDOW_SIZE: i32 = 3005;

    /// A label value came out NaN or infinite
    pub const NON_FINITE_LABEL: i32 = 3006;

    /// A feature value came out NaN or infinite
    pub const NON_FINITE_FEATURE: i32 = 3007;

    /// Configuration values are inconsistent
    pub const INVALID_CONFIGURATION: i32 = 3008;

    /// Dataset write failed
    pub const STORAGE: i32 = 3009;

    /// A compile worker stopped before delivering its results
    pub const WORKER_FAILED: i32 = 3010;
}

/// Log a compile error with structured context
///
/// This function logs compile errors with structured fields including:
/// - error_code: Numeric error code for programmatic handling
/// - component: The component where the error occurred
/// - message: Human-readable error message
/// - context: Additional contextual information
pub fn log_compile_error(err: &CompileError, context: &str) {
    error!(
        "Compile error in {}: code={}, component=FeatureCompiler, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised while turning audio and events into windows
///
/// Every variant except `NonFiniteLabel`/`NonFiniteFeature` is fatal for the
/// whole run. The non-finite variants indicate a modeling defect and abort the
/// offending window.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    /// Audio sample rate does not match the configuration
    SampleRateMismatch {
        path: PathBuf,
        actual: f64,
        expected: f64,
    },

    /// Audio file could not be read
    AudioRead { path: PathBuf, reason: String },

    /// A ground-truth row could not be parsed
    MalformedEvents {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// Decay-curve table missing, unreadable or inconsistent
    DecayModelUnavailable { path: PathBuf, reason: String },

    /// Window size outside 1024/2048/4096/8192
    UnsupportedWindowSize { window_size: usize },

    /// Label value is NaN or infinite
    NonFiniteLabel { window_start: usize, detail: String },

    /// Feature value is NaN or infinite
    NonFiniteFeature { window_start: usize },

    /// Configuration failed validation
    InvalidConfiguration { reason: String },

    /// Underlying dataset error
    Storage(StorageError),

    /// Worker thread failed or hung up
    WorkerFailed { reason: String },
}

impl ErrorCode for CompileError {
    fn code(&self) -> i32 {
        match self {
            CompileError::SampleRateMismatch { .. } => CompileErrorCodes::SAMPLE_RATE_MISMATCH,
            CompileError::AudioRead { .. } => CompileErrorCodes::AUDIO_READ_FAILED,
            CompileError::MalformedEvents { .. } => CompileErrorCodes::MALFORMED_EVENTS,
            CompileError::DecayModelUnavailable { .. } => {
                CompileErrorCodes::DECAY_MODEL_UNAVAILABLE
            }
            CompileError::UnsupportedWindowSize { .. } => {
                CompileErrorCodes::UNSUPPORTED_WINDOW_SIZE
            }
            CompileError::NonFiniteLabel { .. } => CompileErrorCodes::NON_FINITE_LABEL,
            CompileError::NonFiniteFeature { .. } => CompileErrorCodes::NON_FINITE_FEATURE,
            CompileError::InvalidConfiguration { .. } => CompileErrorCodes::INVALID_CONFIGURATION,
            CompileError::Storage(_) => CompileErrorCodes::STORAGE,
            CompileError::WorkerFailed { .. } => CompileErrorCodes::WORKER_FAILED,
        }
    }

    fn message(&self) -> String {
        match self {
            CompileError::SampleRateMismatch {
                path,
                actual,
                expected,
            } => format!(
                "Sample rate mismatch: {} => {} != {}",
                path.display(),
                actual,
                expected
            ),
            CompileError::AudioRead { path, reason } => {
                format!("Failed to read audio file {}: {}", path.display(), reason)
            }
            CompileError::MalformedEvents { path, line, reason } => {
                format!("Invalid event file {} line {}: {}", path.display(), line, reason)
            }
            CompileError::DecayModelUnavailable { path, reason } => {
                format!("Decay curve table {} unavailable: {}", path.display(), reason)
            }
            CompileError::UnsupportedWindowSize { window_size } => format!(
                "Invalid window size {} (expected 1024, 2048, 4096 or 8192)",
                window_size
            ),
            CompileError::NonFiniteLabel {
                window_start,
                detail,
            } => format!(
                "Non-finite label in window at sample {}: {}",
                window_start, detail
            ),
            CompileError::NonFiniteFeature { window_start } => {
                format!("Non-finite feature in window at sample {}", window_start)
            }
            CompileError::InvalidConfiguration { reason } => {
                format!("Invalid configuration: {}", reason)
            }
            CompileError::Storage(err) => err.message(),
            CompileError::WorkerFailed { reason } => format!("Compile worker failed: {}", reason),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CompileError (code {}): {}",
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for CompileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CompileError::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StorageError> for CompileError {
    fn from(err: StorageError) -> Self {
        CompileError::Storage(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_error_codes() {
        assert_eq!(
            CompileError::UnsupportedWindowSize { window_size: 3000 }.code(),
            CompileErrorCodes::UNSUPPORTED_WINDOW_SIZE
        );
        assert_eq!(
            CompileError::NonFiniteFeature { window_start: 0 }.code(),
            CompileErrorCodes::NON_FINITE_FEATURE
        );
        assert_eq!(
            CompileError::Storage(StorageError::DatasetNotFound {
                name: "/labels/onset".to_string()
            })
            .code(),
            CompileErrorCodes::STORAGE
        );
    }

    #[test]
    fn test_sample_rate_message_names_file() {
        let err = CompileError::SampleRateMismatch {
            path: PathBuf::from("piano/a.wav"),
            actual: 48000.0,
            expected: 44100.0,
        };
        let message = err.message();
        assert!(message.contains("piano/a.wav"));
        assert!(message.contains("48000"));
        assert!(format!("{}", err).contains("3001"));
    }

    #[test]
    fn test_storage_error_is_source() {
        use std::error::Error;
        let err: CompileError = StorageError::DatasetNotFound {
            name: "/features/flux".to_string(),
        }
        .into();
        assert!(err.source().is_some());
    }
}
