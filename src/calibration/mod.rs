// Calibration module - learns the ambient noise floor
//
// The calibration workflow:
// 1. Create CalibrationSession with capture, decode and store collaborators
// 2. run() records for the configured audio length (countdown published on a
//    watch channel)
// 3. The RMS of the recording becomes the new BaselineRecord

pub mod progress;
pub mod session;

pub use progress::{whole_seconds, CalibrationPhase, CalibrationProgress};
pub use session::{compute_result, CalibrationResult, CalibrationSession, CalibrationStopper};
