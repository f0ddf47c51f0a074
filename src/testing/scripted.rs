// ScriptedCaptureDevice - deterministic capture source for tests and demos
//
// Recording streams produce frames paced by tokio time (so paused-time tests
// control how much audio a calibration captures). Monitoring streams answer
// each `read_window` with the next scripted level.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::Instant;

use crate::capture::{
    CaptureDevice, CaptureStream, RawChunk, StreamFormat, StreamPurpose,
};
use crate::error::AudioError;

#[derive(Debug, Clone)]
enum Signal {
    /// Every sample has the same value
    Constant(f64),
    /// One level per `read_window` call; the last level repeats
    Levels(Vec<f64>),
    /// Uniform noise in `[-amplitude, amplitude]`
    Noise { amplitude: f64, seed: u64 },
    /// Device opens but never delivers a frame
    NoInput,
}

#[derive(Default)]
struct Counters {
    opened: AtomicUsize,
    closed: AtomicUsize,
}

/// Scripted [`CaptureDevice`] with open/close bookkeeping
pub struct ScriptedCaptureDevice {
    sample_rate: u32,
    signal: Signal,
    open_error: Mutex<Option<String>>,
    counters: Arc<Counters>,
}

impl ScriptedCaptureDevice {
    fn with_signal(sample_rate: u32, signal: Signal) -> Self {
        Self {
            sample_rate,
            signal,
            open_error: Mutex::new(None),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn constant(sample_rate: u32, value: f64) -> Self {
        Self::with_signal(sample_rate, Signal::Constant(value))
    }

    /// Monitoring windows read `levels` in order, then keep the last one
    pub fn levels(sample_rate: u32, levels: Vec<f64>) -> Self {
        Self::with_signal(sample_rate, Signal::Levels(levels))
    }

    pub fn noise(sample_rate: u32, amplitude: f64, seed: u64) -> Self {
        Self::with_signal(sample_rate, Signal::Noise { amplitude, seed })
    }

    pub fn no_input(sample_rate: u32) -> Self {
        Self::with_signal(sample_rate, Signal::NoInput)
    }

    /// Every `open_stream` fails with `CaptureUnavailable`
    pub fn unavailable(reason: &str) -> Self {
        let device = Self::no_input(48_000);
        device.fail_open(Some(reason));
        device
    }

    /// Toggle open failures; `None` makes the device available again
    pub fn fail_open(&self, reason: Option<&str>) {
        if let Ok(mut guard) = self.open_error.lock() {
            *guard = reason.map(str::to_string);
        }
    }

    pub fn open_count(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }

    /// Streams opened and not yet closed
    pub fn open_streams(&self) -> usize {
        self.open_count().saturating_sub(self.close_count())
    }
}

#[async_trait]
impl CaptureDevice for ScriptedCaptureDevice {
    async fn open_stream(
        &self,
        purpose: StreamPurpose,
    ) -> Result<Box<dyn CaptureStream>, AudioError> {
        let open_error = self.open_error.lock().ok().and_then(|g| g.clone());
        if let Some(reason) = open_error {
            return Err(AudioError::CaptureUnavailable { reason });
        }

        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        let rng = match self.signal {
            Signal::Noise { seed, .. } => Some(StdRng::seed_from_u64(seed)),
            _ => None,
        };
        Ok(Box::new(ScriptedStream {
            format: StreamFormat {
                sample_rate: self.sample_rate,
                channels: 1,
            },
            purpose,
            signal: self.signal.clone(),
            rng,
            level_index: 0,
            opened_at: Instant::now(),
            frames_emitted: 0,
            closed: false,
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct ScriptedStream {
    format: StreamFormat,
    purpose: StreamPurpose,
    signal: Signal,
    rng: Option<StdRng>,
    level_index: usize,
    opened_at: Instant,
    frames_emitted: u64,
    closed: bool,
    counters: Arc<Counters>,
}

impl ScriptedStream {
    fn next_sample(&mut self, level: f64) -> f64 {
        match (&self.signal, self.rng.as_mut()) {
            (Signal::Noise { amplitude, .. }, Some(rng)) => rng.gen_range(-*amplitude..=*amplitude),
            _ => level,
        }
    }

    fn current_level(&self) -> f64 {
        match &self.signal {
            Signal::Constant(value) => *value,
            Signal::Levels(levels) => levels
                .get(self.level_index.min(levels.len().saturating_sub(1)))
                .copied()
                .unwrap_or(0.0),
            Signal::Noise { amplitude, .. } => *amplitude,
            Signal::NoInput => 0.0,
        }
    }
}

impl CaptureStream for ScriptedStream {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn read_window(&mut self, len: usize) -> Vec<f64> {
        if self.closed || matches!(self.signal, Signal::NoInput) {
            return Vec::new();
        }
        let level = self.current_level();
        self.level_index += 1;
        (0..len).map(|_| self.next_sample(level)).collect()
    }

    fn drain_chunks(&mut self) -> Vec<RawChunk> {
        if self.closed
            || self.purpose != StreamPurpose::Record
            || matches!(self.signal, Signal::NoInput)
        {
            return Vec::new();
        }

        let elapsed_ms = self.opened_at.elapsed().as_millis() as u64;
        let due = elapsed_ms * self.format.sample_rate as u64 / 1_000;
        let count = due.saturating_sub(self.frames_emitted);
        if count == 0 {
            return Vec::new();
        }
        self.frames_emitted = due;

        let level = self.current_level();
        let samples = (0..count).map(|_| self.next_sample(level) as f32).collect();
        vec![RawChunk::new(self.format, samples)]
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for ScriptedStream {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::mean_abs;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_record_stream_paced_by_time() {
        let device = ScriptedCaptureDevice::constant(1_000, 0.5);
        let mut stream = device.open_stream(StreamPurpose::Record).await.unwrap();

        tokio::time::sleep(Duration::from_millis(250)).await;
        let chunks = stream.drain_chunks();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].samples.len(), 250);

        // nothing new without time passing
        assert!(stream.drain_chunks().is_empty());
    }

    #[tokio::test]
    async fn test_monitor_stream_reads_levels_in_order() {
        let device = ScriptedCaptureDevice::levels(48_000, vec![0.1, 0.0, 0.3]);
        let mut stream = device.open_stream(StreamPurpose::Monitor).await.unwrap();

        let levels: Vec<f64> = (0..5).map(|_| mean_abs(&stream.read_window(16))).collect();
        for (level, expected) in levels.iter().zip([0.1, 0.0, 0.3, 0.3, 0.3]) {
            assert!((level - expected).abs() < 1e-12, "{:?}", levels);
        }
        assert!(stream.drain_chunks().is_empty());
    }

    #[tokio::test]
    async fn test_noise_stays_within_amplitude() {
        let device = ScriptedCaptureDevice::noise(48_000, 0.2, 7);
        let mut stream = device.open_stream(StreamPurpose::Monitor).await.unwrap();
        let window = stream.read_window(2_048);
        assert_eq!(window.len(), 2_048);
        assert!(window.iter().all(|s| s.abs() <= 0.2));
    }

    #[tokio::test]
    async fn test_close_counted_once() {
        let device = ScriptedCaptureDevice::constant(48_000, 0.1);
        let mut stream = device.open_stream(StreamPurpose::Monitor).await.unwrap();
        stream.close();
        stream.close();
        drop(stream);

        assert_eq!(device.open_count(), 1);
        assert_eq!(device.close_count(), 1);
        assert_eq!(device.open_streams(), 0);
    }

    #[tokio::test]
    async fn test_fail_open_toggle() {
        let device = ScriptedCaptureDevice::unavailable("denied");
        assert!(matches!(
            device.open_stream(StreamPurpose::Record).await,
            Err(AudioError::CaptureUnavailable { .. })
        ));

        device.fail_open(None);
        assert!(device.open_stream(StreamPurpose::Record).await.is_ok());
    }
}
