//! Configuration management for monitor tuning
//!
//! This module provides runtime configuration loading from JSON files so
//! calibration length, sampling cadence and alert timing can be adjusted
//! without recompilation.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub calibration: CalibrationConfig,
    pub sampler: SamplerConfig,
    pub alerts: AlertConfig,
    pub threshold: ThresholdConfig,
    pub storage: StorageConfig,
}

/// Calibration recording parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Wall-clock cap on the calibration capture ("audio length")
    pub audio_length_ms: u64,
    /// Ceiling on decoded audio fed into the RMS computation
    pub max_decode_seconds: u32,
    /// How often chunks are drained and the countdown refreshed; the
    /// displayed seconds always come from the time left, not the tick count
    pub countdown_tick_ms: u64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            audio_length_ms: 10_000,
            max_decode_seconds: 10,
            countdown_tick_ms: 1_000,
        }
    }
}

impl CalibrationConfig {
    pub fn audio_length(&self) -> Duration {
        Duration::from_millis(self.audio_length_ms)
    }

    /// Countdown start value in whole seconds (rounded up)
    pub fn countdown_seconds(&self) -> u32 {
        crate::calibration::whole_seconds(self.audio_length())
    }
}

/// Live amplitude sampling parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub interval_ms: u64,
    /// Number of most recent samples averaged per tick
    pub window_size: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1_000,
            window_size: 2_048,
        }
    }
}

impl SamplerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Alert display and debounce parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// How long an alert stays visible
    pub display_ms: u64,
    /// Minimum gap between alerts; only applied when `enforce_min_gap` is set
    pub min_gap_ms: u64,
    /// Off by default: the gap is tracked but does not block alerts
    pub enforce_min_gap: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            display_ms: 2_000,
            min_gap_ms: 5_000,
            enforce_min_gap: false,
        }
    }
}

/// Threshold band constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Bounds at or below this value are replaced by the widened fallback
    pub clamp_floor: f64,
    /// Adjustment used when the sample has no non-zero decimal digit
    pub not_found_adjustment: f64,
    /// Multiplier applied to the adjustment for a clamped upper bound
    pub upper_widen_factor: f64,
    /// Fixed decimal places used to format and quantise samples
    pub decimal_places: usize,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            clamp_floor: 0.05,
            not_found_adjustment: 1e-9,
            upper_widen_factor: 50.0,
            decimal_places: 9,
        }
    }
}

/// Baseline persistence parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("baseline.jsonl"),
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or defaults if the file is missing, is not
    /// valid JSON, or fails validation.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<AppConfig>(&contents) {
                Ok(config) => match config.validate() {
                    Ok(()) => {
                        log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                        config
                    }
                    Err(reason) => {
                        log::warn!(
                            "[Config] Invalid configuration in {:?}: {}. Using defaults.",
                            path.as_ref(),
                            reason
                        );
                        Self::default()
                    }
                },
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Reject values that would stall timers or divide by zero
    pub fn validate(&self) -> Result<(), String> {
        if self.calibration.audio_length_ms == 0 {
            return Err("calibration.audio_length_ms must be > 0".to_string());
        }
        if self.calibration.countdown_tick_ms == 0 {
            return Err("calibration.countdown_tick_ms must be > 0".to_string());
        }
        if self.calibration.max_decode_seconds == 0 {
            return Err("calibration.max_decode_seconds must be > 0".to_string());
        }
        if self.sampler.interval_ms == 0 {
            return Err("sampler.interval_ms must be > 0".to_string());
        }
        if self.sampler.window_size == 0 {
            return Err("sampler.window_size must be > 0".to_string());
        }
        if self.alerts.display_ms == 0 {
            return Err("alerts.display_ms must be > 0".to_string());
        }
        if self.threshold.decimal_places == 0 {
            return Err("threshold.decimal_places must be > 0".to_string());
        }
        Ok(())
    }
}
