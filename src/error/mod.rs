// Error types for the feature compiler
//
// This module defines custom error types for compilation and storage
// operations, providing structured error handling with stable numeric codes
// so the CLI and log consumers can tell failure classes apart.

mod compile;
mod storage;

pub use compile::{log_compile_error, CompileError, CompileErrorCodes};
pub use storage::{log_storage_error, StorageError, StorageErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the library and the command line front end.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
