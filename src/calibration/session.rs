// CalibrationSession - records ambient audio and persists its RMS as the baseline
//
// Workflow:
// 1. Open a recording stream
// 2. Drain chunks once per countdown tick until the audio-length cap elapses
//    or the session is stopped early
// 3. Close the stream, decode, truncate to the decode ceiling
// 4. RMS over the truncated sequence, rounded to the sample precision, then
//    appended to the baseline store

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};

use super::progress::{CalibrationPhase, CalibrationProgress};
use crate::analysis::{quantize, rms};
use crate::capture::{
    AudioDecoder, CaptureDevice, CaptureStream, Clock, DecodedAudio, RawChunk, StreamPurpose,
};
use crate::config::{CalibrationConfig, ThresholdConfig};
use crate::error::{log_calibration_error, log_storage_error, CalibrationError};
use crate::storage::{BaselineRecord, BaselineStore};

/// Outcome of one calibration before it is persisted
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationResult {
    pub rms: f64,
    pub sample_rate: u32,
    /// Samples that went into the RMS (after truncation)
    pub samples_used: usize,
    /// Samples the decoder produced
    pub samples_captured: usize,
}

/// Compute the baseline RMS from decoded audio, ignoring anything past
/// `max_seconds`.
pub fn compute_result(
    mut decoded: DecodedAudio,
    max_seconds: u32,
) -> Result<CalibrationResult, CalibrationError> {
    let samples_captured = decoded.samples.len();
    decoded.truncate_to_seconds(max_seconds);

    let value = rms(&decoded.samples).ok_or(CalibrationError::EmptySamples)?;
    Ok(CalibrationResult {
        rms: value,
        sample_rate: decoded.sample_rate,
        samples_used: decoded.samples.len(),
        samples_captured,
    })
}

/// Ends a running calibration early; the audio captured so far is used.
#[derive(Clone)]
pub struct CalibrationStopper {
    tx: Arc<watch::Sender<bool>>,
}

impl CalibrationStopper {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }
}

/// Clears the in-progress flag however `run` exits
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct CalibrationSession {
    config: CalibrationConfig,
    device: Arc<dyn CaptureDevice>,
    decoder: Arc<dyn AudioDecoder>,
    store: Arc<dyn BaselineStore>,
    clock: Arc<dyn Clock>,
    progress_tx: watch::Sender<CalibrationProgress>,
    stop_tx: Arc<watch::Sender<bool>>,
    in_progress: AtomicBool,
    /// Precision the baseline is stored and compared at
    decimal_places: usize,
}

impl CalibrationSession {
    pub fn new(
        config: CalibrationConfig,
        device: Arc<dyn CaptureDevice>,
        decoder: Arc<dyn AudioDecoder>,
        store: Arc<dyn BaselineStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (progress_tx, _) = watch::channel(CalibrationProgress::idle());
        let (stop_tx, _) = watch::channel(false);
        Self {
            config,
            device,
            decoder,
            store,
            clock,
            progress_tx,
            stop_tx: Arc::new(stop_tx),
            in_progress: AtomicBool::new(false),
            decimal_places: ThresholdConfig::default().decimal_places,
        }
    }

    /// Round baselines to `decimal_places`, the precision live samples use
    pub fn with_decimal_places(mut self, decimal_places: usize) -> Self {
        self.decimal_places = decimal_places;
        self
    }

    /// Countdown updates for the UI
    pub fn subscribe(&self) -> watch::Receiver<CalibrationProgress> {
        self.progress_tx.subscribe()
    }

    pub fn progress(&self) -> CalibrationProgress {
        *self.progress_tx.borrow()
    }

    pub fn stopper(&self) -> CalibrationStopper {
        CalibrationStopper {
            tx: Arc::clone(&self.stop_tx),
        }
    }

    pub fn is_running(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// Record for the configured audio length
    pub async fn run_default(&self) -> Result<BaselineRecord, CalibrationError> {
        self.run(self.config.audio_length()).await
    }

    /// Record for up to `max_duration`, compute the RMS baseline and persist it.
    ///
    /// A failed store write is logged and the baseline is still returned
    /// (with `id == 0`) so the current session can use it.
    pub async fn run(&self, max_duration: Duration) -> Result<BaselineRecord, CalibrationError> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            let err = CalibrationError::AlreadyInProgress;
            log_calibration_error(&err, "run");
            return Err(err);
        }
        let _guard = RunGuard(&self.in_progress);

        let result = self.run_inner(max_duration).await;
        if let Err(ref err) = result {
            self.progress_tx
                .send_modify(|p| *p = p.with_phase(CalibrationPhase::Failed));
            log_calibration_error(err, "run");
        }
        result
    }

    async fn run_inner(&self, max_duration: Duration) -> Result<BaselineRecord, CalibrationError> {
        self.stop_tx.send_replace(false);
        let mut stop_rx = self.stop_tx.subscribe();

        let mut stream = self
            .device
            .open_stream(StreamPurpose::Record)
            .await
            .map_err(CalibrationError::Capture)?;

        self.progress_tx
            .send_replace(CalibrationProgress::recording_for(max_duration));
        tracing::info!(
            "[Calibration] Recording ambient audio for {} ms",
            max_duration.as_millis()
        );

        let chunks = self
            .record(stream.as_mut(), max_duration, &mut stop_rx)
            .await;
        stream.close();

        self.progress_tx
            .send_modify(|p| *p = p.with_phase(CalibrationPhase::Decoding));

        let decoded = self
            .decoder
            .decode(chunks)
            .await
            .map_err(CalibrationError::Decode)?;
        let result = compute_result(decoded, self.config.max_decode_seconds)?;
        let baseline = quantize(result.rms, self.decimal_places);
        tracing::info!(
            "[Calibration] Baseline RMS {:.9} from {} of {} samples @ {} Hz",
            baseline,
            result.samples_used,
            result.samples_captured,
            result.sample_rate
        );

        let captured_at_ms = self.clock.wall_clock_ms();
        let record = match self.store.insert(baseline, captured_at_ms).await {
            Ok(record) => record,
            Err(err) => {
                log_storage_error(&err, "calibration_insert");
                BaselineRecord {
                    id: 0,
                    rms: baseline,
                    captured_at_ms,
                }
            }
        };

        self.progress_tx.send_replace(CalibrationProgress {
            phase: CalibrationPhase::Complete,
            remaining_seconds: 0,
        });
        Ok(record)
    }

    async fn record(
        &self,
        stream: &mut dyn CaptureStream,
        max_duration: Duration,
        stop_rx: &mut watch::Receiver<bool>,
    ) -> Vec<RawChunk> {
        let start = Instant::now();
        let end = start + max_duration;
        let tick = Duration::from_millis(self.config.countdown_tick_ms);
        let deadline = sleep_until(end);
        tokio::pin!(deadline);
        let mut ticker = interval_at(start + tick, tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut chunks = Vec::new();
        loop {
            tokio::select! {
                biased;
                Ok(()) = stop_rx.changed() => {
                    if *stop_rx.borrow() {
                        tracing::info!("[Calibration] Stopped early");
                        break;
                    }
                }
                _ = &mut deadline => break,
                _ = ticker.tick() => {
                    chunks.extend(stream.drain_chunks());
                    let left = end.saturating_duration_since(Instant::now());
                    self.progress_tx.send_modify(|p| *p = p.remaining(left));
                    tracing::debug!(
                        "[Calibration] {}s remaining",
                        self.progress_tx.borrow().remaining_seconds
                    );
                }
            }
        }

        chunks.extend(stream.drain_chunks());
        self.progress_tx
            .send_modify(|p| p.remaining_seconds = 0);
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{ManualClock, PcmDecoder};
    use crate::error::{AudioError, StorageError};
    use crate::storage::MemoryBaselineStore;
    use crate::testing::ScriptedCaptureDevice;

    fn session_with(
        device: Arc<ScriptedCaptureDevice>,
        store: Arc<MemoryBaselineStore>,
    ) -> CalibrationSession {
        CalibrationSession::new(
            CalibrationConfig::default(),
            device,
            Arc::new(PcmDecoder::new()),
            store,
            Arc::new(ManualClock::new(1_700_000_000_000)),
        )
    }

    #[test]
    fn test_compute_result_constant_signal() {
        let decoded = DecodedAudio {
            sample_rate: 100,
            samples: vec![-0.02; 500],
        };
        let result = compute_result(decoded, 10).unwrap();
        assert!((result.rms - 0.02).abs() < 1e-12);
        assert_eq!(result.samples_used, 500);
    }

    #[test]
    fn test_compute_result_ignores_samples_past_ceiling() {
        let mut long = vec![0.1; 1_000];
        long.extend(vec![0.9; 500]);
        let truncated = vec![0.1; 1_000];

        let a = compute_result(
            DecodedAudio {
                sample_rate: 100,
                samples: long,
            },
            10,
        )
        .unwrap();
        let b = compute_result(
            DecodedAudio {
                sample_rate: 100,
                samples: truncated,
            },
            10,
        )
        .unwrap();

        assert_eq!(a.rms, b.rms);
        assert_eq!(a.samples_captured, 1_500);
        assert_eq!(a.samples_used, 1_000);
    }

    #[test]
    fn test_compute_result_empty_is_error() {
        let decoded = DecodedAudio {
            sample_rate: 0,
            samples: Vec::new(),
        };
        assert_eq!(
            compute_result(decoded, 10),
            Err(CalibrationError::EmptySamples)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_persists_baseline() {
        let device = Arc::new(ScriptedCaptureDevice::constant(100, 0.25));
        let store = Arc::new(MemoryBaselineStore::new());
        let session = session_with(device.clone(), store.clone());

        let record = session.run(Duration::from_millis(3_000)).await.unwrap();
        assert_eq!(record.id, 1);
        assert!((record.rms - 0.25).abs() < 1e-6);
        assert_eq!(record.captured_at_ms, 1_700_000_000_000);

        assert_eq!(store.latest().await.unwrap(), Some(record));
        assert_eq!(device.open_count(), 1);
        assert_eq!(device.close_count(), 1);
        assert_eq!(session.progress().phase, CalibrationPhase::Complete);
        assert!(!session.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_decrements_each_second() {
        let device = Arc::new(ScriptedCaptureDevice::constant(100, 0.1));
        let store = Arc::new(MemoryBaselineStore::new());
        let session = Arc::new(session_with(device, store));
        let mut progress_rx = session.subscribe();

        let runner = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.run(Duration::from_millis(3_000)).await })
        };

        let mut seen: Vec<u32> = Vec::new();
        while progress_rx.changed().await.is_ok() {
            let progress = *progress_rx.borrow_and_update();
            if progress.is_recording() || progress.phase == CalibrationPhase::Complete {
                if seen.last() != Some(&progress.remaining_seconds) {
                    seen.push(progress.remaining_seconds);
                }
            }
            if progress.phase == CalibrationPhase::Complete {
                break;
            }
        }
        runner.await.unwrap().unwrap();

        assert_eq!(seen, vec![3, 2, 1, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_follows_elapsed_time_with_faster_ticks() {
        let config = CalibrationConfig {
            countdown_tick_ms: 500,
            ..CalibrationConfig::default()
        };
        let session = Arc::new(CalibrationSession::new(
            config,
            Arc::new(ScriptedCaptureDevice::constant(100, 0.1)),
            Arc::new(PcmDecoder::new()),
            Arc::new(MemoryBaselineStore::new()),
            Arc::new(ManualClock::default()),
        ));

        let runner = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.run(Duration::from_millis(3_000)).await })
        };

        // two half-second ticks have fired, but only one second has passed
        tokio::time::sleep(Duration::from_millis(1_200)).await;
        assert_eq!(session.progress().remaining_seconds, 2);
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(session.progress().remaining_seconds, 1);

        runner.await.unwrap().unwrap();
        assert_eq!(session.progress().remaining_seconds, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_baseline_rounded_to_sample_precision() {
        let store = Arc::new(MemoryBaselineStore::new());
        let session = session_with(
            Arc::new(ScriptedCaptureDevice::constant(100, 0.199_999_999_6)),
            store.clone(),
        );

        let record = session.run(Duration::from_millis(1_000)).await.unwrap();
        // capture hands over f32 frames, so round what the device delivered
        let captured = 0.199_999_999_6f32 as f64;
        let expected = quantize(captured, 9);
        assert_ne!(captured, expected);
        assert_eq!(record.rms, expected);
        assert_eq!(format!("{:.9}", record.rms).parse::<f64>().unwrap(), record.rms);
        assert_eq!(store.latest().await.unwrap().unwrap().rms, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_baseline_precision_follows_configured_places() {
        let session = session_with(
            Arc::new(ScriptedCaptureDevice::constant(100, 0.123_456_789)),
            Arc::new(MemoryBaselineStore::new()),
        )
        .with_decimal_places(3);

        let record = session.run(Duration::from_millis(1_000)).await.unwrap();
        assert_eq!(record.rms, 0.123);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopper_ends_recording_early() {
        let device = Arc::new(ScriptedCaptureDevice::constant(100, 0.5));
        let store = Arc::new(MemoryBaselineStore::new());
        let session = Arc::new(session_with(device.clone(), store));
        let stopper = session.stopper();

        let runner = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.run(Duration::from_millis(10_000)).await })
        };
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        stopper.stop();

        let started = Instant::now();
        let record = runner.await.unwrap().unwrap();
        assert!(started.elapsed() < Duration::from_millis(1_000));
        assert!((record.rms - 0.5).abs() < 1e-6);
        assert_eq!(device.close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_unavailable() {
        let device = Arc::new(ScriptedCaptureDevice::unavailable("permission denied"));
        let store = Arc::new(MemoryBaselineStore::new());
        let session = session_with(device, store.clone());

        let result = session.run(Duration::from_millis(1_000)).await;
        assert!(matches!(
            result,
            Err(CalibrationError::Capture(AudioError::CaptureUnavailable { .. }))
        ));
        assert!(store.is_empty());
        assert_eq!(session.progress().phase, CalibrationPhase::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_device_is_empty_sample_error() {
        let device = Arc::new(ScriptedCaptureDevice::no_input(100));
        let store = Arc::new(MemoryBaselineStore::new());
        let session = session_with(device, store.clone());

        let result = session.run(Duration::from_millis(2_000)).await;
        assert_eq!(result, Err(CalibrationError::EmptySamples));
        assert!(store.is_empty());
    }

    struct ReadOnlyStore;

    #[async_trait::async_trait]
    impl BaselineStore for ReadOnlyStore {
        async fn insert(&self, _rms: f64, _at: u64) -> Result<BaselineRecord, StorageError> {
            Err(StorageError::Write {
                reason: "read-only filesystem".to_string(),
            })
        }

        async fn latest(&self) -> Result<Option<BaselineRecord>, StorageError> {
            Ok(None)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_write_failure_still_returns_baseline() {
        let session = CalibrationSession::new(
            CalibrationConfig::default(),
            Arc::new(ScriptedCaptureDevice::constant(100, 0.125)),
            Arc::new(PcmDecoder::new()),
            Arc::new(ReadOnlyStore),
            Arc::new(ManualClock::new(42)),
        );

        let record = session.run(Duration::from_millis(1_000)).await.unwrap();
        assert_eq!(record.id, 0);
        assert_eq!(record.rms, 0.125);
        assert_eq!(record.captured_at_ms, 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_run_rejected() {
        let device = Arc::new(ScriptedCaptureDevice::constant(100, 0.1));
        let store = Arc::new(MemoryBaselineStore::new());
        let session = Arc::new(session_with(device, store));

        let runner = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.run(Duration::from_millis(2_000)).await })
        };
        tokio::time::sleep(Duration::from_millis(500)).await;

        let second = session.run(Duration::from_millis(2_000)).await;
        assert_eq!(second, Err(CalibrationError::AlreadyInProgress));
        assert!(runner.await.unwrap().is_ok());
    }
}
