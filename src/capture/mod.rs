//! Capture and decode abstractions.
//!
//! The core never touches an audio device directly. Calibration and live
//! sampling go through [`CaptureDevice`] / [`CaptureStream`], and calibration
//! recordings are turned into samples by an [`AudioDecoder`]. Timestamps come
//! from an injected [`Clock`].

use async_trait::async_trait;

use crate::error::AudioError;

mod buffer;
mod clock;
mod decoder;
mod microphone;
mod replay;

pub use clock::{Clock, ManualClock, SystemClock};
pub use decoder::PcmDecoder;
pub use microphone::CpalCaptureDevice;
pub use replay::WavReplayDevice;

/// Why a stream is opened.
///
/// Recording streams retain every captured frame until drained; monitoring
/// streams only keep a rolling history for [`CaptureStream::read_window`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPurpose {
    Record,
    Monitor,
}

/// Native format of a capture stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// A block of raw interleaved frames as delivered by the capture device.
#[derive(Debug, Clone, PartialEq)]
pub struct RawChunk {
    pub format: StreamFormat,
    pub samples: Vec<f32>,
}

impl RawChunk {
    pub fn new(format: StreamFormat, samples: Vec<f32>) -> Self {
        Self { format, samples }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Single-channel audio produced by a decoder.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub sample_rate: u32,
    pub samples: Vec<f64>,
}

impl DecodedAudio {
    /// Keep at most `seconds` worth of samples.
    pub fn truncate_to_seconds(&mut self, seconds: u32) {
        let ceiling = self.sample_rate as usize * seconds as usize;
        self.samples.truncate(ceiling);
    }
}

/// Source of capture streams (microphone, file replay, test script).
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Open a new stream; fails with `AudioError::CaptureUnavailable` when the
    /// device is absent or access is denied.
    async fn open_stream(
        &self,
        purpose: StreamPurpose,
    ) -> Result<Box<dyn CaptureStream>, AudioError>;
}

/// An open capture stream, exclusively owned by one session at a time.
pub trait CaptureStream: Send {
    fn format(&self) -> StreamFormat;

    /// Up to `len` of the most recent mono samples, oldest first.
    fn read_window(&mut self, len: usize) -> Vec<f64>;

    /// Chunks recorded since the previous drain. Always empty for
    /// monitoring streams.
    fn drain_chunks(&mut self) -> Vec<RawChunk>;

    /// Release the underlying device. Calling it again is a no-op.
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

/// Turns recorded chunks into one mono sample sequence.
#[async_trait]
pub trait AudioDecoder: Send + Sync {
    async fn decode(&self, chunks: Vec<RawChunk>) -> Result<DecodedAudio, AudioError>;
}
