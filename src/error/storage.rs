// Storage error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;
use std::path::{Path, PathBuf};

/// Storage error code constants
///
/// Error code range: 4001-4007
pub struct StorageErrorCodes {}

impl StorageErrorCodes {
    /// Filesystem operation failed
    pub const IO: i32 = 4001;

    /// A required table is missing from the dataset
    pub const DATASET_NOT_FOUND: i32 = 4002;

    /// An existing table has a different shape than expected
    pub const DATASET_NOT_COMPATIBLE: i32 = 4003;

    /// Values of the wrong element type were written or requested
    pub const TYPE_MISMATCH: i32 = 4004;

    /// Value count is not a whole number of rows
    pub const ROW_SHAPE: i32 = 4005;

    /// Row range lies outside the table
    pub const OUT_OF_BOUNDS: i32 = 4006;

    /// Dataset manifest missing or unparsable
    pub const MANIFEST: i32 = 4007;
}

/// Log a storage error with structured context
pub fn log_storage_error(err: &StorageError, context: &str) {
    error!(
        "Storage error in {}: code={}, component=FeatureDatabase, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Dataset and table errors
#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    /// Filesystem failure
    Io { path: PathBuf, reason: String },

    /// Table is not present in the dataset
    DatasetNotFound { name: String },

    /// Table exists but its shape differs
    DatasetNotCompatible { name: String, reason: String },

    /// Element type differs from the table's type
    TypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    /// Value count is not a multiple of the row length
    RowShape {
        name: String,
        values: usize,
        row_len: usize,
    },

    /// Requested rows exceed the table
    OutOfBounds {
        name: String,
        start: usize,
        count: usize,
        rows: usize,
    },

    /// Manifest missing or invalid
    Manifest { path: PathBuf, reason: String },
}

impl StorageError {
    pub(crate) fn io(path: &Path, err: std::io::Error) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }
}

impl ErrorCode for StorageError {
    fn code(&self) -> i32 {
        match self {
            StorageError::Io { .. } => StorageErrorCodes::IO,
            StorageError::DatasetNotFound { .. } => StorageErrorCodes::DATASET_NOT_FOUND,
            StorageError::DatasetNotCompatible { .. } => StorageErrorCodes::DATASET_NOT_COMPATIBLE,
            StorageError::TypeMismatch { .. } => StorageErrorCodes::TYPE_MISMATCH,
            StorageError::RowShape { .. } => StorageErrorCodes::ROW_SHAPE,
            StorageError::OutOfBounds { .. } => StorageErrorCodes::OUT_OF_BOUNDS,
            StorageError::Manifest { .. } => StorageErrorCodes::MANIFEST,
        }
    }

    fn message(&self) -> String {
        match self {
            StorageError::Io { path, reason } => {
                format!("I/O error on {}: {}", path.display(), reason)
            }
            StorageError::DatasetNotFound { name } => {
                format!("Existing file doesn't have a {} dataset", name)
            }
            StorageError::DatasetNotCompatible { name, reason } => {
                format!("Existing dataset '{}' is not compatible: {}", name, reason)
            }
            StorageError::TypeMismatch {
                name,
                expected,
                actual,
            } => format!(
                "Dataset '{}' holds {} values, got {}",
                name, expected, actual
            ),
            StorageError::RowShape {
                name,
                values,
                row_len,
            } => format!(
                "Dataset '{}': {} values is not a whole number of rows of {}",
                name, values, row_len
            ),
            StorageError::OutOfBounds {
                name,
                start,
                count,
                rows,
            } => format!(
                "Dataset '{}': rows {}..{} outside table of {} rows",
                name,
                start,
                start + count,
                rows
            ),
            StorageError::Manifest { path, reason } => {
                format!("Invalid dataset manifest {}: {}", path.display(), reason)
            }
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StorageError (code {}): {}",
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for StorageError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_codes() {
        assert_eq!(
            StorageError::DatasetNotFound {
                name: "/labels/notes".to_string()
            }
            .code(),
            4002
        );
        assert_eq!(
            StorageError::RowShape {
                name: "/labels/notes".to_string(),
                values: 10,
                row_len: 3
            }
            .code(),
            StorageErrorCodes::ROW_SHAPE
        );
    }

    #[test]
    fn test_missing_dataset_message_names_table() {
        let err = StorageError::DatasetNotFound {
            name: "/features/peak_flux".to_string(),
        };
        assert!(err.message().contains("/features/peak_flux"));
    }

    #[test]
    fn test_io_helper_keeps_path() {
        let err = StorageError::io(
            Path::new("/tmp/dataset/manifest.json"),
            std::io::Error::other("disk full"),
        );
        match err {
            StorageError::Io { path, reason } => {
                assert!(path.ends_with("manifest.json"));
                assert!(reason.contains("disk full"));
            }
            other => panic!("Expected Io, got {:?}", other),
        }
    }
}
