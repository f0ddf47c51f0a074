// Baseline storage error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Storage error code constants
///
/// Error code range: 3001-3004
pub struct StorageErrorCodes {}

impl StorageErrorCodes {
    pub const OPEN: i32 = 3001;
    pub const READ: i32 = 3002;
    pub const WRITE: i32 = 3003;
    pub const CORRUPT: i32 = 3004;
}

/// Log a storage error with structured context
pub fn log_storage_error(err: &StorageError, context: &str) {
    error!(
        "Storage error in {}: code={}, component=BaselineStore, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// BaselineStore failures
///
/// Read failures are treated by the controller as "no baseline found";
/// write failures never block the in-memory baseline.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    /// Backing store could not be opened
    Open { reason: String },

    /// Backing store could not be read
    Read { reason: String },

    /// Record could not be written
    Write { reason: String },

    /// A persisted record could not be parsed
    Corrupt { line: usize, reason: String },
}

impl ErrorCode for StorageError {
    fn code(&self) -> i32 {
        match self {
            StorageError::Open { .. } => StorageErrorCodes::OPEN,
            StorageError::Read { .. } => StorageErrorCodes::READ,
            StorageError::Write { .. } => StorageErrorCodes::WRITE,
            StorageError::Corrupt { .. } => StorageErrorCodes::CORRUPT,
        }
    }

    fn message(&self) -> String {
        match self {
            StorageError::Open { reason } => format!("Failed to open baseline store: {}", reason),
            StorageError::Read { reason } => format!("Failed to read baseline store: {}", reason),
            StorageError::Write { reason } => format!("Failed to write baseline: {}", reason),
            StorageError::Corrupt { line, reason } => {
                format!("Corrupt baseline record on line {}: {}", line, reason)
            }
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StorageError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for StorageError {}
