//! WAV replay capture device.
//!
//! Replays a WAV file as if it were arriving from a microphone, paced by the
//! injected clock. Once the file is exhausted the stream delivers nothing,
//! which the sampler reports as silence.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use super::buffer::CaptureBuffer;
use super::{CaptureDevice, CaptureStream, Clock, RawChunk, StreamFormat, StreamPurpose};
use crate::error::{log_audio_error, AudioError};

pub struct WavReplayDevice {
    path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl WavReplayDevice {
    pub fn new(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            clock,
        }
    }
}

#[async_trait]
impl CaptureDevice for WavReplayDevice {
    async fn open_stream(
        &self,
        purpose: StreamPurpose,
    ) -> Result<Box<dyn CaptureStream>, AudioError> {
        let path = self.path.clone();
        let (samples, sample_rate) = tokio::task::spawn_blocking(move || read_wav(&path))
            .await
            .map_err(|err| AudioError::CaptureUnavailable {
                reason: format!("replay loader failed: {}", err),
            })?
            .map_err(|err| match err {
                AudioError::DecodeFailed { reason } => AudioError::CaptureUnavailable { reason },
                other => other,
            })
            .inspect_err(|err| log_audio_error(err, "open_replay"))?;

        tracing::info!(
            "[Replay] Opened {} ({} samples @ {} Hz)",
            self.path.display(),
            samples.len(),
            sample_rate
        );

        let format = StreamFormat {
            sample_rate,
            channels: 1,
        };
        Ok(Box::new(ReplayStream {
            format,
            samples,
            position: 0,
            opened_at_ms: self.clock.now_ms(),
            clock: Arc::clone(&self.clock),
            buffer: CaptureBuffer::new(format, purpose, sample_rate as usize * 4),
            closed: false,
        }))
    }
}

/// Read the first channel of a WAV file as normalised f32 samples.
pub(crate) fn read_wav(path: &Path) -> Result<(Vec<f32>, u32), AudioError> {
    let mut reader = hound::WavReader::open(path).map_err(|err| AudioError::DecodeFailed {
        reason: format!("opening {}: {}", path.display(), err),
    })?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<f32>, _>>()?,
        hound::SampleFormat::Int => {
            let max = ((1i64 << (spec.bits_per_sample - 1)) - 1) as f32;
            match spec.bits_per_sample {
                8 | 16 => reader
                    .samples::<i16>()
                    .map(|sample| sample.map(|value| value as f32 / max))
                    .collect::<Result<Vec<f32>, _>>()?,
                24 | 32 => reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|value| value as f32 / max))
                    .collect::<Result<Vec<f32>, _>>()?,
                other => {
                    return Err(AudioError::DecodeFailed {
                        reason: format!(
                            "Unsupported bits per sample {} in {}",
                            other,
                            path.display()
                        ),
                    })
                }
            }
        }
    };

    let mono = interleaved.chunks(channels).map(|frame| frame[0]).collect();
    Ok((mono, spec.sample_rate))
}

struct ReplayStream {
    format: StreamFormat,
    samples: Vec<f32>,
    position: usize,
    opened_at_ms: u64,
    clock: Arc<dyn Clock>,
    buffer: CaptureBuffer,
    closed: bool,
}

impl ReplayStream {
    /// Feed the buffer with everything "recorded" up to the current instant.
    fn pump(&mut self) {
        if self.closed {
            return;
        }
        let elapsed_ms = self.clock.now_ms().saturating_sub(self.opened_at_ms);
        let due = (elapsed_ms as u128 * self.format.sample_rate as u128 / 1_000) as usize;
        let end = due.min(self.samples.len());
        if end > self.position {
            self.buffer
                .extend_from_slice(&self.samples[self.position..end]);
            self.position = end;
        }
    }
}

impl CaptureStream for ReplayStream {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn read_window(&mut self, len: usize) -> Vec<f64> {
        let before = self.position;
        self.pump();
        if self.position == before && self.position >= self.samples.len() {
            // file exhausted: nothing new arrived this tick
            return Vec::new();
        }
        self.buffer.window(len)
    }

    fn drain_chunks(&mut self) -> Vec<RawChunk> {
        self.pump();
        self.buffer.take_recorded()
    }

    fn close(&mut self) {
        if !self.closed {
            self.pump();
            self.closed = true;
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
