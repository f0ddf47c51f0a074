// ThresholdCalculator - turns the scalar baseline into a comparison band
//
// The band is centred on the calibrated baseline, but its half-width is
// derived from the decimal precision of the *live* sample: the later the first
// significant decimal digit, the tighter the band. Bounds that fall at or
// below the clamp floor are replaced (lower) or widened (upper) so quiet rooms
// do not collapse into a degenerate band.

use serde::{Deserialize, Serialize};

use crate::config::ThresholdConfig;

/// Comparison band for one tick; superseded by the next computation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdBand {
    pub lower: f64,
    pub higher: f64,
}

/// Stateless band calculator
#[derive(Debug, Clone, Default)]
pub struct ThresholdCalculator {
    config: ThresholdConfig,
}

impl ThresholdCalculator {
    pub fn new(config: ThresholdConfig) -> Self {
        Self { config }
    }

    /// Index of the first non-zero digit after the decimal point of the
    /// fixed-precision rendering of `sample`.
    ///
    /// `0.000000500` -> `Some(6)`, `0.000000000` -> `None`.
    pub fn first_non_zero_decimal(&self, sample: f64) -> Option<usize> {
        let formatted = format!("{:.*}", self.config.decimal_places, sample);
        let decimal_part = formatted.split_once('.').map(|(_, d)| d).unwrap_or("");
        decimal_part.chars().position(|c| matches!(c, '1'..='9'))
    }

    /// Half-width of the band for a given live sample.
    ///
    /// With the first significant digit at index `k` this is the decimal
    /// `0.` + `k` zeros + `09`, i.e. `9 * 10^-(k + 2)`.
    pub fn adjustment(&self, sample: f64) -> f64 {
        match self.first_non_zero_decimal(sample) {
            Some(index) => format!("0.{}09", "0".repeat(index))
                .parse::<f64>()
                .unwrap_or(self.config.not_found_adjustment),
            None => self.config.not_found_adjustment,
        }
    }

    /// Band around `baseline_rms` for the sample that triggered this tick.
    pub fn compute_band(&self, baseline_rms: f64, current_sample: f64) -> ThresholdBand {
        let adjustment = self.adjustment(current_sample);
        let floor = self.config.clamp_floor;

        let lower = if baseline_rms - adjustment > floor {
            baseline_rms - adjustment
        } else {
            adjustment
        };
        let higher = if baseline_rms + adjustment > floor {
            baseline_rms + adjustment
        } else {
            baseline_rms + adjustment * self.config.upper_widen_factor
        };

        ThresholdBand { lower, higher }
    }
}
