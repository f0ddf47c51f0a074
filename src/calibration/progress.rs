// Progress tracking for the calibration recording
//
// Presentation only: the countdown has no influence on the computed baseline.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Calibration phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationPhase {
    /// No calibration has run on this session
    Idle,
    /// Capturing ambient audio; the room should stay at its normal level
    Recording,
    /// Capture finished, turning chunks into samples
    Decoding,
    /// Baseline computed and handed to the store
    Complete,
    /// Attempt aborted; see the returned error
    Failed,
}

/// Progress snapshot published on every countdown tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationProgress {
    pub phase: CalibrationPhase,
    /// Whole seconds left in the recording
    pub remaining_seconds: u32,
}

impl CalibrationProgress {
    pub fn idle() -> Self {
        Self {
            phase: CalibrationPhase::Idle,
            remaining_seconds: 0,
        }
    }

    pub fn recording(remaining_seconds: u32) -> Self {
        Self {
            phase: CalibrationPhase::Recording,
            remaining_seconds,
        }
    }

    /// Recording with `left` still to go
    pub fn recording_for(left: Duration) -> Self {
        Self::recording(whole_seconds(left))
    }

    pub fn with_phase(self, phase: CalibrationPhase) -> Self {
        Self { phase, ..self }
    }

    /// Countdown derived from the time still left, independent of tick cadence
    pub fn remaining(self, left: Duration) -> Self {
        Self {
            remaining_seconds: whole_seconds(left),
            ..self
        }
    }

    pub fn is_recording(&self) -> bool {
        self.phase == CalibrationPhase::Recording
    }
}

/// Whole seconds, rounded up so a partial second still shows
pub fn whole_seconds(duration: Duration) -> u32 {
    duration.as_millis().div_ceil(1_000) as u32
}

impl Default for CalibrationProgress {
    fn default() -> Self {
        Self::idle()
    }
}
