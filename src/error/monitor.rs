// Monitor controller error types and constants

use crate::error::{AudioError, CalibrationError, ErrorCode};
use log::error;
use std::fmt;

/// Monitor error code constants
///
/// Error code range: 4001-4005
pub struct MonitorErrorCodes {}

impl MonitorErrorCodes {
    /// Start/stop requested while controls are disabled
    pub const CONTROLS_DISABLED: i32 = 4001;

    /// Monitoring requested before a baseline was adopted
    pub const NO_BASELINE: i32 = 4002;

    /// Capture failure while starting monitoring
    pub const AUDIO: i32 = 4003;

    /// Calibration failure during initialize/recalibrate
    pub const CALIBRATION: i32 = 4004;

    /// Controller state lock was poisoned
    pub const STATE_POISONED: i32 = 4005;
}

/// Log a monitor error with structured context
pub fn log_monitor_error(err: &MonitorError, context: &str) {
    error!(
        "Monitor error in {}: code={}, component=MonitorController, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors returned by `MonitorController` commands
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorError {
    ControlsDisabled,
    NoBaseline,
    Audio(AudioError),
    Calibration(CalibrationError),
    StatePoisoned,
}

impl ErrorCode for MonitorError {
    fn code(&self) -> i32 {
        match self {
            MonitorError::ControlsDisabled => MonitorErrorCodes::CONTROLS_DISABLED,
            MonitorError::NoBaseline => MonitorErrorCodes::NO_BASELINE,
            MonitorError::Audio(_) => MonitorErrorCodes::AUDIO,
            MonitorError::Calibration(_) => MonitorErrorCodes::CALIBRATION,
            MonitorError::StatePoisoned => MonitorErrorCodes::STATE_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            MonitorError::ControlsDisabled => {
                "Controls are disabled until calibration completes".to_string()
            }
            MonitorError::NoBaseline => "No baseline available".to_string(),
            MonitorError::Audio(inner) => inner.message(),
            MonitorError::Calibration(inner) => inner.message(),
            MonitorError::StatePoisoned => "Monitor state lock poisoned".to_string(),
        }
    }
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MonitorError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for MonitorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MonitorError::Audio(inner) => Some(inner),
            MonitorError::Calibration(inner) => Some(inner),
            _ => None,
        }
    }
}

impl From<AudioError> for MonitorError {
    fn from(err: AudioError) -> Self {
        MonitorError::Audio(err)
    }
}

impl From<CalibrationError> for MonitorError {
    fn from(err: CalibrationError) -> Self {
        MonitorError::Calibration(err)
    }
}
