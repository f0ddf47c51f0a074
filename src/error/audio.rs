// Audio error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Audio error code constants
///
/// Single source of truth for the numeric codes surfaced in
/// `MonitorSnapshot::last_error` and in logs.
///
/// Error code range: 1001-1004
pub struct AudioErrorCodes {}

impl AudioErrorCodes {
    /// Capture device absent, busy or access denied
    pub const CAPTURE_UNAVAILABLE: i32 = 1001;

    /// Captured audio could not be decoded
    pub const DECODE_FAILED: i32 = 1002;

    /// Stream was used after it was closed
    pub const STREAM_CLOSED: i32 = 1003;

    /// Sampler already running
    pub const ALREADY_RUNNING: i32 = 1004;

}

/// Log an audio error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=Capture, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Audio-related errors
///
/// These errors cover the capture and decode collaborators: opening the
/// input device, reading from it, and turning captured chunks into samples.
///
/// Error code range: 1001-1004
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// Capture device absent, busy or access denied
    CaptureUnavailable { reason: String },

    /// Captured audio is malformed
    DecodeFailed { reason: String },

    /// Stream was used after close
    StreamClosed,

    /// Sampler already running
    AlreadyRunning,
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::CaptureUnavailable { .. } => AudioErrorCodes::CAPTURE_UNAVAILABLE,
            AudioError::DecodeFailed { .. } => AudioErrorCodes::DECODE_FAILED,
            AudioError::StreamClosed => AudioErrorCodes::STREAM_CLOSED,
            AudioError::AlreadyRunning => AudioErrorCodes::ALREADY_RUNNING,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::CaptureUnavailable { reason } => {
                format!("Capture device unavailable: {}", reason)
            }
            AudioError::DecodeFailed { reason } => {
                format!("Failed to decode captured audio: {}", reason)
            }
            AudioError::StreamClosed => "Capture stream already closed".to_string(),
            AudioError::AlreadyRunning => {
                "Sampler already running. Call stop() first.".to_string()
            }
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AudioError {}

/// Convert from std::io::Error to AudioError
impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::CaptureUnavailable {
            reason: err.to_string(),
        }
    }
}

impl From<hound::Error> for AudioError {
    fn from(err: hound::Error) -> Self {
        AudioError::DecodeFailed {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_error_codes() {
        assert_eq!(
            AudioError::CaptureUnavailable {
                reason: "x".to_string()
            }
            .code(),
            1001
        );
        assert_eq!(
            AudioError::DecodeFailed {
                reason: "x".to_string()
            }
            .code(),
            1002
        );
        assert_eq!(AudioError::StreamClosed.code(), 1003);
        assert_eq!(AudioError::AlreadyRunning.code(), 1004);
    }

    #[test]
    fn test_audio_error_messages() {
        let err = AudioError::CaptureUnavailable {
            reason: "permission denied".to_string(),
        };
        assert_eq!(
            err.message(),
            "Capture device unavailable: permission denied"
        );

        let err = AudioError::DecodeFailed {
            reason: "mismatched sample rates".to_string(),
        };
        assert!(err.message().contains("mismatched sample rates"));
    }

    #[test]
    fn test_audio_error_display() {
        let err = AudioError::StreamClosed;
        let display = format!("{}", err);
        assert!(display.contains("AudioError"));
        assert!(display.contains("1003"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no mic");
        let audio_err: AudioError = io_err.into();

        match audio_err {
            AudioError::CaptureUnavailable { reason } => assert!(reason.contains("no mic")),
            other => panic!("Expected CaptureUnavailable, got {:?}", other),
        }
    }
}
