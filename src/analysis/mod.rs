// Analysis module - amplitude statistics and the adaptive threshold band
//
// Everything here is pure: no clocks, no I/O, no shared state.

pub mod amplitude;
pub mod threshold;

pub use amplitude::{mean_abs, quantize, rms};
pub use threshold::{ThresholdBand, ThresholdCalculator};
