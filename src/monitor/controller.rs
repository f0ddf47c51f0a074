// MonitorController: lifecycle orchestration for calibration and live monitoring
//
// Owns the baseline, the alert machine and the running sampler. The UI only
// sees `MonitorSnapshot` values published on a watch channel and drives the
// controller through its async command methods.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;

use super::alert::{self, AlertEvent, AlertMachine};
use super::sampler::{AmplitudeSample, AmplitudeSampler, SamplerHandle};
use super::snapshot::{reduce, ErrorReport, MonitorEvent, MonitorSnapshot};
use crate::analysis::ThresholdCalculator;
use crate::calibration::{CalibrationSession, CalibrationStopper};
use crate::capture::{AudioDecoder, CaptureDevice, Clock};
use crate::config::AppConfig;
use crate::error::{log_monitor_error, log_storage_error, MonitorError};
use crate::storage::{BaselineRecord, BaselineStore};

/// External collaborators the controller is wired to
pub struct MonitorDeps {
    pub device: Arc<dyn CaptureDevice>,
    pub decoder: Arc<dyn AudioDecoder>,
    pub store: Arc<dyn BaselineStore>,
    pub clock: Arc<dyn Clock>,
}

struct ControllerState {
    baseline: Option<BaselineRecord>,
    alert: AlertMachine,
    sampler: Option<SamplerHandle>,
    expiry_task: Option<JoinHandle<()>>,
    /// Bumped on every start/stop; ticks from an older session are ignored
    generation: u64,
}

struct Inner {
    config: AppConfig,
    calibration: CalibrationSession,
    sampler: AmplitudeSampler,
    thresholds: ThresholdCalculator,
    store: Arc<dyn BaselineStore>,
    clock: Arc<dyn Clock>,
    snapshot_tx: watch::Sender<MonitorSnapshot>,
    state: Mutex<ControllerState>,
}

/// Orchestrates calibration and monitoring
///
/// # Example
/// ```ignore
/// let controller = MonitorController::new(deps, AppConfig::default());
/// controller.initialize().await?;
/// controller.start_monitoring().await?;
/// let mut snapshots = controller.subscribe();
/// // ...
/// controller.stop_monitoring().await?;
/// ```
pub struct MonitorController {
    inner: Arc<Inner>,
    /// Serialises commands so start/stop/recalibrate never interleave
    commands: tokio::sync::Mutex<()>,
}

impl MonitorController {
    pub fn new(deps: MonitorDeps, config: AppConfig) -> Self {
        let calibration = CalibrationSession::new(
            config.calibration.clone(),
            Arc::clone(&deps.device),
            deps.decoder,
            Arc::clone(&deps.store),
            Arc::clone(&deps.clock),
        )
        .with_decimal_places(config.threshold.decimal_places);
        let sampler = AmplitudeSampler::new(
            deps.device,
            Arc::clone(&deps.clock),
            config.sampler.clone(),
            config.threshold.decimal_places,
        );
        let thresholds = ThresholdCalculator::new(config.threshold.clone());
        let (snapshot_tx, _) = watch::channel(MonitorSnapshot::default());

        Self {
            inner: Arc::new(Inner {
                config,
                calibration,
                sampler,
                thresholds,
                store: deps.store,
                clock: deps.clock,
                snapshot_tx,
                state: Mutex::new(ControllerState {
                    baseline: None,
                    alert: AlertMachine::default(),
                    sampler: None,
                    expiry_task: None,
                    generation: 0,
                }),
            }),
            commands: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Adopt the most recent stored baseline, or calibrate if there is none.
    ///
    /// Store read failures are logged and handled as "no baseline".
    pub async fn initialize(&self) -> Result<BaselineRecord, MonitorError> {
        let _command = self.commands.lock().await;

        match self.inner.store.latest().await {
            Ok(Some(record)) => {
                tracing::info!(
                    "[MonitorController] Using stored baseline #{} (rms={:.9})",
                    record.id,
                    record.rms
                );
                self.inner.adopt(record.clone())?;
                return Ok(record);
            }
            Ok(None) => {
                tracing::info!("[MonitorController] No stored baseline, calibrating");
            }
            Err(err) => {
                log_storage_error(&err, "initialize");
                tracing::warn!("[MonitorController] Baseline unreadable, calibrating");
            }
        }

        self.calibrate().await
    }

    /// Begin live monitoring against the adopted baseline.
    ///
    /// A no-op when already monitoring.
    pub async fn start_monitoring(&self) -> Result<(), MonitorError> {
        let _command = self.commands.lock().await;
        let inner = &self.inner;

        let generation = {
            let mut state = inner.lock_state()?;
            if state.sampler.is_some() {
                return Ok(());
            }
            if !inner.snapshot_tx.borrow().controls_enabled {
                let err = MonitorError::ControlsDisabled;
                log_monitor_error(&err, "start_monitoring");
                return Err(err);
            }
            if state.baseline.is_none() {
                let err = MonitorError::NoBaseline;
                log_monitor_error(&err, "start_monitoring");
                return Err(err);
            }
            state.generation += 1;
            state.alert = alert::reduce(state.alert, AlertEvent::Reset, &inner.config.alerts);
            state.generation
        };

        let weak = Arc::downgrade(inner);
        let started = inner
            .sampler
            .start(move |sample| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_sample(generation, sample);
                }
            })
            .await;

        match started {
            Ok(handle) => {
                inner.lock_state()?.sampler = Some(handle);
                inner.publish(MonitorEvent::CaptureStarted);
                tracing::info!("[MonitorController] Monitoring started");
                Ok(())
            }
            Err(err) => {
                inner.publish(MonitorEvent::CaptureFailed(ErrorReport::from_error(&err)));
                let err = MonitorError::from(err);
                log_monitor_error(&err, "start_monitoring");
                Err(err)
            }
        }
    }

    /// Stop live monitoring and release the capture stream.
    ///
    /// Safe to call repeatedly; only the first call after a start releases
    /// anything.
    pub async fn stop_monitoring(&self) -> Result<(), MonitorError> {
        let _command = self.commands.lock().await;
        self.stop_sampler().await
    }

    /// Stop monitoring, record a fresh baseline and adopt it.
    pub async fn recalibrate(&self) -> Result<BaselineRecord, MonitorError> {
        let _command = self.commands.lock().await;
        self.stop_sampler().await?;
        self.calibrate().await
    }

    /// Ends a running calibration early with the audio captured so far
    pub fn calibration_stopper(&self) -> CalibrationStopper {
        self.inner.calibration.stopper()
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        self.inner.snapshot_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<MonitorSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Snapshot updates as a `Stream`, starting with the current value
    pub fn snapshot_stream(&self) -> WatchStream<MonitorSnapshot> {
        WatchStream::new(self.subscribe())
    }

    pub fn baseline(&self) -> Option<BaselineRecord> {
        self.inner
            .lock_state()
            .ok()
            .and_then(|state| state.baseline.clone())
    }

    pub fn is_monitoring(&self) -> bool {
        self.inner
            .lock_state()
            .map(|state| state.sampler.is_some())
            .unwrap_or(false)
    }

    // ========================================================================
    // HELPER METHODS - callers hold the command lock
    // ========================================================================

    async fn calibrate(&self) -> Result<BaselineRecord, MonitorError> {
        let inner = &self.inner;
        inner.publish(MonitorEvent::CalibrationStarted {
            remaining_seconds: inner.config.calibration.countdown_seconds(),
        });
        let forwarder = inner.forward_countdown();

        let result = inner.calibration.run_default().await;
        forwarder.abort();

        match result {
            Ok(record) => {
                inner.adopt(record.clone())?;
                tracing::info!(
                    "[MonitorController] Calibrated baseline rms={:.9}",
                    record.rms
                );
                Ok(record)
            }
            Err(err) => {
                inner.publish(MonitorEvent::CalibrationFailed(ErrorReport::from_error(&err)));
                let err = MonitorError::from(err);
                log_monitor_error(&err, "calibrate");
                Err(err)
            }
        }
    }

    async fn stop_sampler(&self) -> Result<(), MonitorError> {
        let inner = &self.inner;
        let handle = {
            let mut state = inner.lock_state()?;
            state.generation += 1;
            if let Some(task) = state.expiry_task.take() {
                task.abort();
            }
            state.alert = alert::reduce(state.alert, AlertEvent::Reset, &inner.config.alerts);
            state.sampler.take()
        };

        let Some(mut handle) = handle else {
            return Ok(());
        };
        handle.stop().await;
        inner.publish(MonitorEvent::CaptureStopped);
        tracing::info!("[MonitorController] Monitoring stopped");
        Ok(())
    }
}

impl Drop for MonitorController {
    fn drop(&mut self) {
        if let Ok(mut state) = self.inner.state.lock() {
            state.generation += 1;
            if let Some(task) = state.expiry_task.take() {
                task.abort();
            }
            // dropping the handle signals the sampling task, which closes the stream
            if state.sampler.take().is_some() {
                tracing::info!("[MonitorController] Teardown stopped monitoring");
            }
        }
    }
}

impl Inner {
    /// Safely acquire the controller state lock
    fn lock_state(&self) -> Result<MutexGuard<'_, ControllerState>, MonitorError> {
        self.state.lock().map_err(|_| MonitorError::StatePoisoned)
    }

    fn publish(&self, event: MonitorEvent) {
        self.snapshot_tx
            .send_modify(|snapshot| *snapshot = reduce(snapshot, event));
    }

    fn adopt(&self, record: BaselineRecord) -> Result<(), MonitorError> {
        let rms = record.rms;
        self.lock_state()?.baseline = Some(record);
        self.publish(MonitorEvent::BaselineAdopted { rms });
        Ok(())
    }

    /// Mirror the calibration countdown into the snapshot
    fn forward_countdown(self: &Arc<Self>) -> JoinHandle<()> {
        let mut progress_rx = self.calibration.subscribe();
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            while progress_rx.changed().await.is_ok() {
                let progress = *progress_rx.borrow_and_update();
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                if progress.is_recording() {
                    inner.publish(MonitorEvent::CountdownTick {
                        remaining_seconds: progress.remaining_seconds,
                    });
                }
            }
        })
    }

    /// One sampler tick: band from this sample, then at most one alert transition
    fn on_sample(self: &Arc<Self>, generation: u64, sample: AmplitudeSample) {
        let mut state = match self.lock_state() {
            Ok(state) => state,
            Err(err) => {
                log_monitor_error(&err, "on_sample");
                return;
            }
        };
        if state.generation != generation {
            return;
        }
        let Some(baseline_rms) = state.baseline.as_ref().map(|b| b.rms) else {
            return;
        };

        let value = sample.mean_abs_amplitude;
        let band = self.thresholds.compute_band(baseline_rms, value);
        let previous = state.alert;
        state.alert = alert::reduce(
            previous,
            AlertEvent::Sample {
                value,
                band,
                at_ms: sample.tick_ms,
            },
            &self.config.alerts,
        );

        tracing::debug!(
            "[MonitorController] sample={:.9} band=[{:.9}, {:.9}] state={:?}",
            value,
            band.lower,
            band.higher,
            state.alert.state
        );

        if state.alert.last_shown_ms != previous.last_shown_ms {
            if let Some(reason) = state.alert.reason() {
                tracing::info!("[MonitorController] Alert: {}", reason);
            }
            if let Some(task) = state.expiry_task.take() {
                task.abort();
            }
            state.expiry_task = Some(self.spawn_expiry(generation));
        }

        self.publish(MonitorEvent::Sampled {
            amplitude: value,
            band,
            alert_reason: state.alert.reason(),
        });
    }

    /// Timer that walks the alert back to Idle once its deadline passes
    fn spawn_expiry(self: &Arc<Self>, generation: u64) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                let wait_ms = {
                    let Some(inner) = weak.upgrade() else {
                        return;
                    };
                    match inner.alert_deadline(generation) {
                        Some(deadline) => deadline.saturating_sub(inner.clock.now_ms()),
                        None => return,
                    }
                };
                tokio::time::sleep(Duration::from_millis(wait_ms)).await;

                let Some(inner) = weak.upgrade() else {
                    return;
                };
                inner.expire_alert(generation);
            }
        })
    }

    fn alert_deadline(&self, generation: u64) -> Option<u64> {
        let state = self.lock_state().ok()?;
        if state.generation != generation {
            return None;
        }
        state.alert.deadline_ms(&self.config.alerts)
    }

    fn expire_alert(&self, generation: u64) {
        let Ok(mut state) = self.lock_state() else {
            return;
        };
        if state.generation != generation {
            return;
        }

        let previous = state.alert;
        state.alert = alert::reduce(
            previous,
            AlertEvent::Tick {
                at_ms: self.clock.now_ms(),
            },
            &self.config.alerts,
        );
        if state.alert.reason() != previous.reason() {
            tracing::debug!("[MonitorController] Alert cleared");
            self.publish(MonitorEvent::AlertChanged(state.alert.reason()));
        }
    }
}
