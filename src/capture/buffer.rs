// CaptureBuffer - consumer-side sample storage shared by the stream backends
//
// Backends push mono samples as they arrive from the device. A rolling history
// serves `read_window`; recording streams additionally keep every sample until
// the next drain.

use std::collections::VecDeque;

use super::{RawChunk, StreamFormat, StreamPurpose};

pub(crate) struct CaptureBuffer {
    format: StreamFormat,
    purpose: StreamPurpose,
    history: VecDeque<f32>,
    history_capacity: usize,
    recorded: Vec<f32>,
}

impl CaptureBuffer {
    pub(crate) fn new(format: StreamFormat, purpose: StreamPurpose, history_capacity: usize) -> Self {
        Self {
            format,
            purpose,
            history: VecDeque::with_capacity(history_capacity),
            history_capacity: history_capacity.max(1),
            recorded: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, sample: f32) {
        if self.history.len() == self.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(sample);

        if self.purpose == StreamPurpose::Record {
            self.recorded.push(sample);
        }
    }

    pub(crate) fn extend_from_slice(&mut self, samples: &[f32]) {
        for &sample in samples {
            self.push(sample);
        }
    }

    /// Most recent `len` samples, oldest first.
    pub(crate) fn window(&self, len: usize) -> Vec<f64> {
        let start = self.history.len().saturating_sub(len);
        self.history.range(start..).map(|&s| s as f64).collect()
    }

    pub(crate) fn take_recorded(&mut self) -> Vec<RawChunk> {
        if self.recorded.is_empty() {
            return Vec::new();
        }
        let samples = std::mem::take(&mut self.recorded);
        vec![RawChunk::new(self.format, samples)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format() -> StreamFormat {
        StreamFormat {
            sample_rate: 8_000,
            channels: 1,
        }
    }

    #[test]
    fn test_window_returns_most_recent_samples() {
        let mut buffer = CaptureBuffer::new(format(), StreamPurpose::Monitor, 4);
        buffer.extend_from_slice(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);

        let window = buffer.window(3);
        assert_eq!(window.len(), 3);
        assert!((window[0] - 0.4).abs() < 1e-6);
        assert!((window[2] - 0.6).abs() < 1e-6);

        // larger than the history returns everything retained
        assert_eq!(buffer.window(100).len(), 4);
    }

    #[test]
    fn test_monitor_buffer_never_records() {
        let mut buffer = CaptureBuffer::new(format(), StreamPurpose::Monitor, 4);
        buffer.extend_from_slice(&[0.1; 16]);
        assert!(buffer.take_recorded().is_empty());
    }

    #[test]
    fn test_record_buffer_drains_once() {
        let mut buffer = CaptureBuffer::new(format(), StreamPurpose::Record, 2);
        buffer.extend_from_slice(&[0.1, 0.2, 0.3]);

        let chunks = buffer.take_recorded();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].samples.len(), 3);
        assert_eq!(chunks[0].format, format());
        assert!(buffer.take_recorded().is_empty());
    }
}
