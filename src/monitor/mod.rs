// Monitor module - live amplitude monitoring against the learned baseline
//
// Data flow per tick:
// AmplitudeSampler -> ThresholdCalculator -> alert reducer -> MonitorSnapshot

pub mod alert;
pub mod controller;
pub mod sampler;
pub mod snapshot;

pub use alert::{classify, AlertEvent, AlertMachine, AlertReason, AlertState};
pub use controller::{MonitorController, MonitorDeps};
pub use sampler::{AmplitudeSample, AmplitudeSampler, SamplerHandle};
pub use snapshot::{ErrorReport, MonitorEvent, MonitorSnapshot};
