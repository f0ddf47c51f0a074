use async_trait::async_trait;

use super::{AudioDecoder, DecodedAudio, RawChunk, StreamFormat};
use crate::error::AudioError;

/// Decoder for raw interleaved f32 chunks.
///
/// All chunks must share one format. Only the first channel is kept.
#[derive(Debug, Default, Clone, Copy)]
pub struct PcmDecoder;

impl PcmDecoder {
    pub fn new() -> Self {
        Self
    }

    fn decode_sync(chunks: &[RawChunk]) -> Result<DecodedAudio, AudioError> {
        let mut format: Option<StreamFormat> = None;
        let mut samples = Vec::new();

        for (index, chunk) in chunks.iter().enumerate() {
            if chunk.format.sample_rate == 0 || chunk.format.channels == 0 {
                return Err(AudioError::DecodeFailed {
                    reason: format!(
                        "chunk {} has invalid format {:?}",
                        index, chunk.format
                    ),
                });
            }
            match format {
                Some(expected) if expected != chunk.format => {
                    return Err(AudioError::DecodeFailed {
                        reason: format!(
                            "chunk {} format {:?} does not match {:?}",
                            index, chunk.format, expected
                        ),
                    });
                }
                Some(_) => {}
                None => format = Some(chunk.format),
            }

            let channels = chunk.format.channels as usize;
            if chunk.samples.len() % channels != 0 {
                return Err(AudioError::DecodeFailed {
                    reason: format!(
                        "chunk {} has {} samples, not a multiple of {} channels",
                        index,
                        chunk.samples.len(),
                        channels
                    ),
                });
            }

            for frame in chunk.samples.chunks(channels) {
                let value = frame[0];
                if !value.is_finite() {
                    return Err(AudioError::DecodeFailed {
                        reason: format!("chunk {} contains a non-finite sample", index),
                    });
                }
                samples.push(value as f64);
            }
        }

        Ok(DecodedAudio {
            sample_rate: format.map(|f| f.sample_rate).unwrap_or(0),
            samples,
        })
    }
}

#[async_trait]
impl AudioDecoder for PcmDecoder {
    async fn decode(&self, chunks: Vec<RawChunk>) -> Result<DecodedAudio, AudioError> {
        let total: usize = chunks.iter().map(|c| c.samples.len()).sum();
        tracing::debug!("[Decoder] Decoding {} chunks ({} samples)", chunks.len(), total);
        Self::decode_sync(&chunks)
    }
}
