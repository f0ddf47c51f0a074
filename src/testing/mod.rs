//! Test harness utilities.
//!
//! Scripted collaborators that let calibration and monitoring run without
//! audio hardware. Used by unit tests, the integration suite under `tests/`,
//! and anyone embedding the monitor who wants a deterministic input.

pub mod scripted;

pub use scripted::ScriptedCaptureDevice;
