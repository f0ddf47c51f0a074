// Alert state machine - debounced show/hide decisions for live samples
//
// States: Idle -> Showing(reason) -> Idle after `display_ms`. While Showing no
// new alert can start. The time of the last alert is always recorded; the
// minimum gap between alerts only takes effect with `enforce_min_gap`, in
// which case Showing is followed by a Cooldown lasting until
// `last_shown_ms + min_gap_ms`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::analysis::ThresholdBand;
use crate::config::AlertConfig;

/// Why an alert is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertReason {
    LargerNoise,
    SmallerNoise,
    NoSoundDetected,
}

impl AlertReason {
    /// Text shown in the popup
    pub fn label(self) -> &'static str {
        match self {
            AlertReason::LargerNoise => "Larger Noise",
            AlertReason::SmallerNoise => "Smaller Noise",
            AlertReason::NoSoundDetected => "No Sound Detected",
        }
    }
}

impl fmt::Display for AlertReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Compare one sample against its band.
///
/// Exact silence always wins over "too quiet", whatever the band says.
pub fn classify(sample: f64, band: &ThresholdBand) -> Option<AlertReason> {
    if sample > band.higher {
        Some(AlertReason::LargerNoise)
    } else if sample < band.lower && sample != 0.0 {
        Some(AlertReason::SmallerNoise)
    } else if sample == 0.0 {
        Some(AlertReason::NoSoundDetected)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AlertState {
    Idle,
    Showing { reason: AlertReason, since_ms: u64 },
    Cooldown { until_ms: u64 },
}

/// Input to the reducer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlertEvent {
    /// A sample tick, with the band computed from that same sample
    Sample {
        value: f64,
        band: ThresholdBand,
        at_ms: u64,
    },
    /// Timer fired; applies any due expiry
    Tick { at_ms: u64 },
    /// Monitoring stopped; hide immediately
    Reset,
}

/// Alert state plus the time the last alert was shown
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertMachine {
    pub state: AlertState,
    pub last_shown_ms: Option<u64>,
}

impl Default for AlertMachine {
    fn default() -> Self {
        Self {
            state: AlertState::Idle,
            last_shown_ms: None,
        }
    }
}

impl AlertMachine {
    pub fn reason(&self) -> Option<AlertReason> {
        match self.state {
            AlertState::Showing { reason, .. } => Some(reason),
            _ => None,
        }
    }

    pub fn is_showing(&self) -> bool {
        matches!(self.state, AlertState::Showing { .. })
    }

    /// Time at which the current state ends on its own, if it does
    pub fn deadline_ms(&self, config: &AlertConfig) -> Option<u64> {
        match self.state {
            AlertState::Idle => None,
            AlertState::Showing { since_ms, .. } => Some(since_ms + config.display_ms),
            AlertState::Cooldown { until_ms } => Some(until_ms),
        }
    }

    /// Apply expiries due at `now_ms`
    fn settle(self, now_ms: u64, config: &AlertConfig) -> Self {
        let state = match self.state {
            AlertState::Showing { since_ms, .. } if now_ms >= since_ms + config.display_ms => {
                let gap_end = self.last_shown_ms.map(|t| t + config.min_gap_ms);
                match gap_end {
                    Some(until_ms) if config.enforce_min_gap && until_ms > now_ms => {
                        AlertState::Cooldown { until_ms }
                    }
                    _ => AlertState::Idle,
                }
            }
            AlertState::Cooldown { until_ms } if now_ms >= until_ms => AlertState::Idle,
            other => other,
        };
        Self { state, ..self }
    }
}

/// Pure transition function; at most one transition into Showing per event.
pub fn reduce(machine: AlertMachine, event: AlertEvent, config: &AlertConfig) -> AlertMachine {
    match event {
        AlertEvent::Reset => AlertMachine {
            state: AlertState::Idle,
            ..machine
        },
        AlertEvent::Tick { at_ms } => machine.settle(at_ms, config),
        AlertEvent::Sample { value, band, at_ms } => {
            let settled = machine.settle(at_ms, config);
            if settled.state != AlertState::Idle {
                return settled;
            }
            match classify(value, &band) {
                Some(reason) => AlertMachine {
                    state: AlertState::Showing {
                        reason,
                        since_ms: at_ms,
                    },
                    last_shown_ms: Some(at_ms),
                },
                None => settled,
            }
        }
    }
}
