// Error types for the ambient monitor
//
// This module defines custom error types for capture, calibration, storage and
// monitoring operations, providing structured error handling with numeric codes
// that the UI layer can map to user-facing messages.

mod audio;
mod calibration;
mod monitor;
mod storage;

pub use audio::{log_audio_error, AudioError, AudioErrorCodes};
pub use calibration::{log_calibration_error, CalibrationError, CalibrationErrorCodes};
pub use monitor::{log_monitor_error, MonitorError, MonitorErrorCodes};
pub use storage::{log_storage_error, StorageError, StorageErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// component boundaries.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
