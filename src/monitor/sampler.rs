// AmplitudeSampler - periodic mean-absolute-amplitude readings of a live stream
//
// Each tick reads the most recent `window_size` samples synchronously; nothing
// is accumulated between ticks. The stream is owned by the sampling task and
// closed by it exactly once, whichever way the task ends.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::analysis::{mean_abs, quantize};
use crate::capture::{CaptureDevice, CaptureStream, Clock, StreamPurpose};
use crate::config::SamplerConfig;
use crate::error::{log_audio_error, AudioError};

/// One sampling tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmplitudeSample {
    pub mean_abs_amplitude: f64,
    pub tick_ms: u64,
}

pub struct AmplitudeSampler {
    device: Arc<dyn CaptureDevice>,
    clock: Arc<dyn Clock>,
    config: SamplerConfig,
    decimal_places: usize,
    active: Arc<AtomicBool>,
}

impl AmplitudeSampler {
    pub fn new(
        device: Arc<dyn CaptureDevice>,
        clock: Arc<dyn Clock>,
        config: SamplerConfig,
        decimal_places: usize,
    ) -> Self {
        Self {
            device,
            clock,
            config,
            decimal_places,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Open a monitoring stream and call `on_sample` once per interval until
    /// the returned handle is stopped or dropped.
    ///
    /// The first sample arrives one full interval after start.
    pub async fn start<F>(&self, on_sample: F) -> Result<SamplerHandle, AudioError>
    where
        F: Fn(AmplitudeSample) + Send + 'static,
    {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AudioError::AlreadyRunning);
        }

        let stream = match self.device.open_stream(StreamPurpose::Monitor).await {
            Ok(stream) => stream,
            Err(err) => {
                self.active.store(false, Ordering::SeqCst);
                log_audio_error(&err, "sampler_start");
                return Err(err);
            }
        };

        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(run_sampler(
            stream,
            stop_rx,
            on_sample,
            Arc::clone(&self.clock),
            self.config.clone(),
            self.decimal_places,
            Arc::clone(&self.active),
        ));

        tracing::info!(
            "[AmplitudeSampler] Started ({} ms interval, {} sample window)",
            self.config.interval_ms,
            self.config.window_size
        );
        Ok(SamplerHandle {
            stop_tx: Some(stop_tx),
            task: Some(task),
        })
    }
}

async fn run_sampler<F>(
    mut stream: Box<dyn CaptureStream>,
    mut stop_rx: oneshot::Receiver<()>,
    on_sample: F,
    clock: Arc<dyn Clock>,
    config: SamplerConfig,
    decimal_places: usize,
    active: Arc<AtomicBool>,
) where
    F: Fn(AmplitudeSample) + Send + 'static,
{
    let period = config.interval();
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            // fires on explicit stop and when the handle is dropped
            _ = &mut stop_rx => break,
            _ = ticker.tick() => {
                if stream.is_closed() {
                    log_audio_error(&AudioError::StreamClosed, "sampler_tick");
                    break;
                }
                let window = stream.read_window(config.window_size);
                let sample = AmplitudeSample {
                    mean_abs_amplitude: quantize(mean_abs(&window), decimal_places),
                    tick_ms: clock.now_ms(),
                };
                tracing::debug!(
                    "[AmplitudeSampler] tick={} amplitude={:.9} window={}",
                    sample.tick_ms,
                    sample.mean_abs_amplitude,
                    window.len()
                );
                on_sample(sample);
            }
        }
    }

    stream.close();
    active.store(false, Ordering::SeqCst);
    tracing::info!("[AmplitudeSampler] Stopped, stream released");
}

/// Running sampler. Dropping the handle also stops sampling.
pub struct SamplerHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SamplerHandle {
    /// Stop sampling and wait until the stream is released. Calling it again
    /// is a no-op.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                tracing::warn!("[AmplitudeSampler] Sampling task ended abnormally: {}", err);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for SamplerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}
