//! Exit codes for CLI operations following Unix conventions.
//!
//! # Exit Code Semantics
//!
//! - `0`: Success - operation completed (an empty result list is success)
//! - `1`: General error - unspecified failure
//! - `2`: Blocking error - persisted index is unusable, automation should halt
//! - `3-125`: Specific recoverable errors
//! - `126-255`: Reserved by shell

use crate::error::{ErrorKind, RetrieverError};
use crate::persistence::PersistenceError;

/// Standard exit codes for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Operation succeeded (code 0)
    Success = 0,

    /// Unspecified error occurred (code 1)
    GeneralError = 1,

    /// Critical error that should halt automation (code 2)
    BlockingError = 2,

    /// Record or index not found (code 3)
    NotFound = 3,

    /// Caller input rejected (code 4)
    InvalidInput = 4,

    /// File I/O or persistence error (code 5)
    IoError = 5,

    /// Configuration error, including an uninitialized engine (code 6)
    ConfigError = 6,

    /// Embedding backend failure (code 7)
    BackendError = 7,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}

impl ExitCode {
    /// Convert a `RetrieverError` to the appropriate exit code.
    ///
    /// Maps error kinds to semantic exit codes that scripts can use to
    /// decide whether a rebuild is needed.
    pub fn from_error(error: &RetrieverError) -> Self {
        match error {
            RetrieverError::Persistence(PersistenceError::NotFound { .. }) => ExitCode::NotFound,
            RetrieverError::Persistence(
                PersistenceError::IncompleteState { .. }
                | PersistenceError::Mismatch { .. }
                | PersistenceError::UnsupportedVersion { .. },
            ) => ExitCode::BlockingError,
            _ => match error.kind() {
                ErrorKind::Configuration => ExitCode::ConfigError,
                ErrorKind::Validation => ExitCode::InvalidInput,
                ErrorKind::Lookup => ExitCode::NotFound,
                ErrorKind::Persistence => ExitCode::IoError,
                ErrorKind::Backend => ExitCode::BackendError,
            },
        }
    }

    /// Check if this exit code indicates a blocking error.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        matches!(self, ExitCode::BlockingError)
    }

    /// Check if this exit code indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ExitCode::Success)
    }

    /// Get a human-readable description of the exit code.
    pub fn description(&self) -> &str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::GeneralError => "General error",
            ExitCode::BlockingError => "Blocking error - index must be rebuilt",
            ExitCode::NotFound => "Not found",
            ExitCode::InvalidInput => "Invalid input",
            ExitCode::IoError => "I/O error",
            ExitCode::ConfigError => "Configuration error",
            ExitCode::BackendError => "Embedding backend error",
        }
    }
}
