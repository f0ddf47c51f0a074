//! Integration tests for the calibration workflow
//!
//! These tests run CalibrationSession against real collaborators (PCM
//! decoder, JSON-lines store, WAV replay) under paused tokio time:
//! - RMS of a constant input equals its magnitude
//! - Audio past the decode ceiling does not affect the baseline
//! - Baselines persist across store instances, even past a corrupt row
//! - Failures leave the store untouched

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ambient_monitor::calibration::{CalibrationPhase, CalibrationSession};
use ambient_monitor::capture::{ManualClock, PcmDecoder, SystemClock, WavReplayDevice};
use ambient_monitor::config::CalibrationConfig;
use ambient_monitor::error::{AudioError, CalibrationError};
use ambient_monitor::storage::{JsonlBaselineStore, MemoryBaselineStore};
use ambient_monitor::testing::ScriptedCaptureDevice;
use ambient_monitor::{BaselineStore, CaptureDevice, Clock};

fn session(
    config: CalibrationConfig,
    device: Arc<dyn CaptureDevice>,
    store: Arc<dyn BaselineStore>,
    clock: Arc<dyn Clock>,
) -> CalibrationSession {
    CalibrationSession::new(config, device, Arc::new(PcmDecoder::new()), store, clock)
}

fn write_float_wav(path: &Path, rate: u32, samples: &[f32]) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for &s in samples {
        writer.write_sample(s).unwrap();
    }
    writer.finalize().unwrap();
}

/// RMS of an all-equal sequence is its absolute value, for either sign
#[tokio::test(start_paused = true)]
async fn test_constant_input_rms_is_magnitude() {
    for value in [0.5, -0.5, 0.125, -0.03125] {
        let device = Arc::new(ScriptedCaptureDevice::constant(200, value));
        let store = Arc::new(MemoryBaselineStore::new());
        let calibration = session(
            CalibrationConfig::default(),
            device,
            store,
            Arc::new(ManualClock::default()),
        );

        let record = calibration
            .run(Duration::from_millis(2_000))
            .await
            .unwrap();
        assert!(
            (record.rms - f64::abs(value)).abs() < 1e-9,
            "value {} gave rms {}",
            value,
            record.rms
        );
    }
}

/// Recording for longer than the decode ceiling yields the same baseline as
/// recording for exactly the ceiling
#[tokio::test(start_paused = true)]
async fn test_decode_ceiling_truncates_recording() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("room.wav");
    // 2 s of quiet followed by 2 s of loud
    let mut samples = vec![0.1f32; 2_000];
    samples.extend(vec![0.8f32; 2_000]);
    write_float_wav(&path, 1_000, &samples);

    let config = CalibrationConfig {
        max_decode_seconds: 2,
        ..CalibrationConfig::default()
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let device = Arc::new(WavReplayDevice::new(&path, Arc::clone(&clock)));
    let long_run = session(
        config.clone(),
        device.clone(),
        Arc::new(MemoryBaselineStore::new()),
        Arc::clone(&clock),
    )
    .run(Duration::from_millis(4_000))
    .await
    .unwrap();

    let exact_run = session(
        config,
        device,
        Arc::new(MemoryBaselineStore::new()),
        Arc::clone(&clock),
    )
    .run(Duration::from_millis(2_000))
    .await
    .unwrap();

    assert!((long_run.rms - 0.1).abs() < 1e-6, "rms {}", long_run.rms);
    assert!((long_run.rms - exact_run.rms).abs() < 1e-12);
}

/// A baseline written by one session is the latest for the next process
#[tokio::test(start_paused = true)]
async fn test_baseline_persists_in_jsonl_store() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("baseline.jsonl");
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(1_690_000_000_000));

    let store = Arc::new(JsonlBaselineStore::new(&store_path));
    let first = session(
        CalibrationConfig::default(),
        Arc::new(ScriptedCaptureDevice::constant(100, 0.25)),
        store.clone(),
        Arc::clone(&clock),
    )
    .run(Duration::from_millis(1_000))
    .await
    .unwrap();
    let second = session(
        CalibrationConfig::default(),
        Arc::new(ScriptedCaptureDevice::constant(100, 0.5)),
        store,
        Arc::clone(&clock),
    )
    .run(Duration::from_millis(1_000))
    .await
    .unwrap();

    assert_eq!(first.id, 1);
    assert_eq!(second.id, 2);

    let reopened = JsonlBaselineStore::new(&store_path);
    let latest = reopened.latest().await.unwrap().unwrap();
    assert_eq!(latest, second);
    assert_eq!(latest.captured_at_ms, 1_690_000_000_000);

    let contents = std::fs::read_to_string(&store_path).unwrap();
    assert_eq!(contents.lines().count(), 2);
    assert!(contents.contains(r#""timestamp":1690000000000"#));
}

/// A corrupt row left in the store does not stop new baselines being saved
#[tokio::test(start_paused = true)]
async fn test_calibration_appends_past_corrupt_store_line() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("baseline.jsonl");
    std::fs::write(&store_path, "garbage\n").unwrap();

    let store = Arc::new(JsonlBaselineStore::new(&store_path));
    let record = session(
        CalibrationConfig::default(),
        Arc::new(ScriptedCaptureDevice::constant(100, 0.25)),
        store.clone(),
        Arc::new(ManualClock::new(7)),
    )
    .run(Duration::from_millis(1_000))
    .await
    .unwrap();

    assert_eq!(record.id, 1);
    assert_eq!(store.latest().await.unwrap(), Some(record));
    let contents = std::fs::read_to_string(&store_path).unwrap();
    assert_eq!(contents.lines().count(), 2);
}

/// Capture and decode failures abort the attempt without writing anything
#[tokio::test(start_paused = true)]
async fn test_failures_do_not_write_baseline() {
    let store = Arc::new(MemoryBaselineStore::new());

    let unavailable = session(
        CalibrationConfig::default(),
        Arc::new(ScriptedCaptureDevice::unavailable("no microphone")),
        store.clone(),
        Arc::new(ManualClock::default()),
    );
    let err = unavailable
        .run(Duration::from_millis(1_000))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CalibrationError::Capture(AudioError::CaptureUnavailable { .. })
    ));
    assert_eq!(unavailable.progress().phase, CalibrationPhase::Failed);

    let silent = session(
        CalibrationConfig::default(),
        Arc::new(ScriptedCaptureDevice::no_input(48_000)),
        store.clone(),
        Arc::new(ManualClock::default()),
    );
    assert_eq!(
        silent.run(Duration::from_millis(1_000)).await,
        Err(CalibrationError::EmptySamples)
    );

    assert!(store.is_empty());
}

/// Missing replay files surface as an unavailable capture device
#[tokio::test(start_paused = true)]
async fn test_missing_replay_file_is_capture_unavailable() {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let calibration = session(
        CalibrationConfig::default(),
        Arc::new(WavReplayDevice::new("/no/such/recording.wav", Arc::clone(&clock))),
        Arc::new(MemoryBaselineStore::new()),
        clock,
    );

    let err = calibration.run_default().await.unwrap_err();
    assert!(matches!(
        err,
        CalibrationError::Capture(AudioError::CaptureUnavailable { .. })
    ));
}
