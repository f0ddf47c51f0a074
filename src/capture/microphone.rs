//! CPAL-based capture device for desktop platforms (Linux, macOS, Windows)
//!
//! `cpal::Stream` is not `Send` on every host, so each opened stream lives on
//! its own OS thread. The input callback de-interleaves the first channel into
//! a lock-free `rtrb` ring; the async side drains the ring whenever it reads a
//! window or drains recorded chunks.

use std::sync::mpsc;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use tokio::sync::oneshot;

use super::buffer::CaptureBuffer;
use super::{CaptureDevice, CaptureStream, RawChunk, StreamFormat, StreamPurpose};
use crate::error::{log_audio_error, AudioError};

/// Seconds of audio the ring and the rolling history can hold
const DEFAULT_RING_SECONDS: u32 = 4;

/// Default system input device
pub struct CpalCaptureDevice {
    ring_seconds: u32,
}

impl CpalCaptureDevice {
    pub fn new() -> Self {
        Self {
            ring_seconds: DEFAULT_RING_SECONDS,
        }
    }
}

impl Default for CpalCaptureDevice {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureDevice for CpalCaptureDevice {
    async fn open_stream(
        &self,
        purpose: StreamPurpose,
    ) -> Result<Box<dyn CaptureStream>, AudioError> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (close_tx, close_rx) = mpsc::channel::<()>();
        let ring_seconds = self.ring_seconds;

        std::thread::Builder::new()
            .name("ambient-capture".to_string())
            .spawn(move || match open_input(ring_seconds) {
                Ok((stream, format, consumer)) => {
                    if ready_tx.send(Ok((format, consumer))).is_err() {
                        return;
                    }
                    // Parked until close() or the stream handle is dropped
                    let _ = close_rx.recv();
                    drop(stream);
                    tracing::info!("[Capture] Input stream released");
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                }
            })?;

        let (format, consumer) = ready_rx
            .await
            .map_err(|_| AudioError::CaptureUnavailable {
                reason: "capture thread exited before the stream opened".to_string(),
            })?
            .inspect_err(|err| log_audio_error(err, "open_stream"))?;

        tracing::info!(
            "[Capture] Input stream open: {} Hz, purpose {:?}",
            format.sample_rate,
            purpose
        );

        let history = (format.sample_rate * ring_seconds) as usize;
        Ok(Box::new(CpalStream {
            format,
            consumer,
            buffer: CaptureBuffer::new(format, purpose, history),
            close_tx: Some(close_tx),
        }))
    }
}

fn open_input(
    ring_seconds: u32,
) -> Result<(cpal::Stream, StreamFormat, rtrb::Consumer<f32>), AudioError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| AudioError::CaptureUnavailable {
            reason: "No default input device found".to_string(),
        })?;

    let config = device
        .default_input_config()
        .map_err(|e| AudioError::CaptureUnavailable {
            reason: format!("Failed to get default input config: {:?}", e),
        })?;

    let stream_config: cpal::StreamConfig = config.clone().into();
    let format = StreamFormat {
        sample_rate: stream_config.sample_rate.0,
        channels: 1,
    };
    let capacity = (format.sample_rate * ring_seconds) as usize;
    let (producer, consumer) = rtrb::RingBuffer::new(capacity);

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => build_input::<f32>(&device, &stream_config, producer),
        cpal::SampleFormat::I16 => build_input::<i16>(&device, &stream_config, producer),
        cpal::SampleFormat::U16 => build_input::<u16>(&device, &stream_config, producer),
        other => {
            return Err(AudioError::CaptureUnavailable {
                reason: format!("Unsupported input sample format {:?}", other),
            })
        }
    }?;

    stream.play().map_err(|e| AudioError::CaptureUnavailable {
        reason: format!("Input start failed: {}", e),
    })?;

    Ok((stream, format, consumer))
}

fn build_input<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut producer: rtrb::Producer<f32>,
) -> Result<cpal::Stream, AudioError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = config.channels.max(1) as usize;
    let err_fn = |err| tracing::warn!("[Capture] Input stream error: {}", err);

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                // De-interleave: take first channel. A full ring drops frames
                // until the consumer catches up.
                for frame in data.chunks(channels) {
                    if let Some(&first) = frame.first() {
                        let _ = producer.push(f32::from_sample(first));
                    }
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| AudioError::CaptureUnavailable {
            reason: format!("{:?}", e),
        })
}

struct CpalStream {
    format: StreamFormat,
    consumer: rtrb::Consumer<f32>,
    buffer: CaptureBuffer,
    close_tx: Option<mpsc::Sender<()>>,
}

impl CpalStream {
    fn pump(&mut self) {
        while let Ok(sample) = self.consumer.pop() {
            self.buffer.push(sample);
        }
    }
}

impl CaptureStream for CpalStream {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn read_window(&mut self, len: usize) -> Vec<f64> {
        self.pump();
        self.buffer.window(len)
    }

    fn drain_chunks(&mut self) -> Vec<RawChunk> {
        self.pump();
        self.buffer.take_recorded()
    }

    fn close(&mut self) {
        if let Some(close_tx) = self.close_tx.take() {
            self.pump();
            let _ = close_tx.send(());
        }
    }

    fn is_closed(&self) -> bool {
        self.close_tx.is_none()
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        self.close();
    }
}
