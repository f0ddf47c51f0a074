// Calibration error types and constants

use crate::error::{AudioError, ErrorCode};
use log::error;
use std::fmt;

/// Calibration error code constants
///
/// Error code range: 2001-2004
pub struct CalibrationErrorCodes {}

impl CalibrationErrorCodes {
    /// Decoded audio had zero samples
    pub const EMPTY_SAMPLES: i32 = 2001;

    /// Capture device could not be opened for calibration
    pub const CAPTURE: i32 = 2002;

    /// Captured calibration audio could not be decoded
    pub const DECODE: i32 = 2003;

    /// Calibration already in progress
    pub const ALREADY_IN_PROGRESS: i32 = 2004;
}

/// Log a calibration error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_calibration_error(err: &CalibrationError, context: &str) {
    error!(
        "Calibration error in {}: code={}, component=CalibrationSession, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Calibration-related errors
///
/// Every variant is fatal to the calibration attempt that raised it; there is
/// no automatic retry.
///
/// Error code range: 2001-2004
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// Zero-length decoded audio, RMS is undefined
    EmptySamples,

    /// Capture device could not be opened
    Capture(AudioError),

    /// Captured audio could not be decoded
    Decode(AudioError),

    /// Calibration already in progress
    AlreadyInProgress,
}

impl ErrorCode for CalibrationError {
    fn code(&self) -> i32 {
        match self {
            CalibrationError::EmptySamples => CalibrationErrorCodes::EMPTY_SAMPLES,
            CalibrationError::Capture(_) => CalibrationErrorCodes::CAPTURE,
            CalibrationError::Decode(_) => CalibrationErrorCodes::DECODE,
            CalibrationError::AlreadyInProgress => CalibrationErrorCodes::ALREADY_IN_PROGRESS,
        }
    }

    fn message(&self) -> String {
        match self {
            CalibrationError::EmptySamples => {
                "Calibration captured no samples; RMS undefined".to_string()
            }
            CalibrationError::Capture(inner) => {
                format!("Calibration capture failed: {}", inner.message())
            }
            CalibrationError::Decode(inner) => {
                format!("Calibration decode failed: {}", inner.message())
            }
            CalibrationError::AlreadyInProgress => "Calibration already in progress".to_string(),
        }
    }
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CalibrationError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for CalibrationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CalibrationError::Capture(inner) | CalibrationError::Decode(inner) => Some(inner),
            _ => None,
        }
    }
}
