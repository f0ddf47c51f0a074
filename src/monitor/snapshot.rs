// MonitorSnapshot - read-only UI projection of the controller
//
// The controller never mutates the published snapshot in place: every change
// is expressed as a MonitorEvent and folded in with `reduce`.

use serde::{Deserialize, Serialize};

use super::alert::AlertReason;
use crate::analysis::ThresholdBand;
use crate::error::ErrorCode;

/// Error summary carried in the snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: i32,
    pub message: String,
}

impl ErrorReport {
    pub fn from_error(err: &dyn ErrorCode) -> Self {
        Self {
            code: err.code(),
            message: err.message(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    pub remaining_seconds: u32,
    /// Calibration capture in progress
    pub is_recording: bool,
    /// Live monitoring active
    pub is_capturing: bool,
    pub alert_reason: Option<AlertReason>,
    pub controls_enabled: bool,
    pub live_amplitude: Option<f64>,
    pub band: Option<ThresholdBand>,
    pub baseline_rms: Option<f64>,
    pub last_error: Option<ErrorReport>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    CalibrationStarted { remaining_seconds: u32 },
    CountdownTick { remaining_seconds: u32 },
    CalibrationFailed(ErrorReport),
    /// Baseline loaded from the store or produced by calibration
    BaselineAdopted { rms: f64 },
    CaptureStarted,
    CaptureFailed(ErrorReport),
    CaptureStopped,
    Sampled {
        amplitude: f64,
        band: ThresholdBand,
        alert_reason: Option<AlertReason>,
    },
    AlertChanged(Option<AlertReason>),
}

pub fn reduce(snapshot: &MonitorSnapshot, event: MonitorEvent) -> MonitorSnapshot {
    let mut next = snapshot.clone();
    match event {
        MonitorEvent::CalibrationStarted { remaining_seconds } => {
            next.controls_enabled = false;
            next.is_recording = true;
            next.remaining_seconds = remaining_seconds;
            next.last_error = None;
        }
        MonitorEvent::CountdownTick { remaining_seconds } => {
            if next.is_recording {
                next.remaining_seconds = remaining_seconds;
            }
        }
        MonitorEvent::CalibrationFailed(report) => {
            next.is_recording = false;
            next.remaining_seconds = 0;
            next.last_error = Some(report);
        }
        MonitorEvent::BaselineAdopted { rms } => {
            next.is_recording = false;
            next.remaining_seconds = 0;
            next.baseline_rms = Some(rms);
            next.controls_enabled = true;
        }
        MonitorEvent::CaptureStarted => {
            next.is_capturing = true;
            next.last_error = None;
        }
        MonitorEvent::CaptureFailed(report) => {
            next.is_capturing = false;
            next.last_error = Some(report);
        }
        MonitorEvent::CaptureStopped => {
            next.is_capturing = false;
            next.alert_reason = None;
            next.live_amplitude = None;
            next.band = None;
        }
        MonitorEvent::Sampled {
            amplitude,
            band,
            alert_reason,
        } => {
            next.live_amplitude = Some(amplitude);
            next.band = Some(band);
            next.alert_reason = alert_reason;
        }
        MonitorEvent::AlertChanged(reason) => {
            next.alert_reason = reason;
        }
    }
    next
}
