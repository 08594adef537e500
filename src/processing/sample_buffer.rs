/// Bit-depth-generic PCM sample storage.
///
/// Samples are kept interleaved across channels, one signed integer per channel
/// per frame, decoded little-endian from the data chunk.
use std::ops::Range;

use thiserror::Error;

// Full-scale reference per width, used as the 0 dBFS point
const FULL_SCALE_8: f64 = 128.0;
const FULL_SCALE_16: f64 = 32768.0;
const FULL_SCALE_32: f64 = 2147483648.0;

type Result<T> = std::result::Result<T, SampleError>;

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("Unsupported sample width of {bytes_per_sample} bytes (expected 1, 2 or 4)")]
    UnsupportedWidth { bytes_per_sample: u16 },

    #[error("Sample index {index} is out of range for buffer of {len} samples")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Sample range [{start}:{end}] is invalid for buffer of {len} samples")]
    RangeOutOfBounds { start: usize, end: usize, len: usize },
}

/// Decoded samples, tagged by integer width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleBuffer {
    Eight(Vec<i8>),
    Sixteen(Vec<i16>),
    ThirtyTwo(Vec<i32>),
}

impl SampleBuffer {
    /// Reinterprets `raw` as contiguous little-endian samples of `bytes_per_sample` bytes.
    /// A trailing partial sample is dropped.
    pub fn from_bytes(raw: &[u8], bytes_per_sample: u16) -> Result<Self> {
        let buffer = match bytes_per_sample {
            1 => SampleBuffer::Eight(raw.iter().map(|&b| i8::from_le_bytes([b])).collect()),
            2 => SampleBuffer::Sixteen(raw.chunks_exact(2).map(|c| i16::from_le_bytes([c[0], c[1]])).collect()),
            4 => SampleBuffer::ThirtyTwo(raw.chunks_exact(4).map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect()),
            _ => return Err(SampleError::UnsupportedWidth { bytes_per_sample }),
        };

        Ok(buffer)
    }

    pub fn len(&self) -> usize {
        match self {
            SampleBuffer::Eight(samples) => samples.len(),
            SampleBuffer::Sixteen(samples) => samples.len(),
            SampleBuffer::ThirtyTwo(samples) => samples.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleBuffer::Eight(_) => 1,
            SampleBuffer::Sixteen(_) => 2,
            SampleBuffer::ThirtyTwo(_) => 4,
        }
    }

    fn full_scale(&self) -> f64 {
        match self {
            SampleBuffer::Eight(_) => FULL_SCALE_8,
            SampleBuffer::Sixteen(_) => FULL_SCALE_16,
            SampleBuffer::ThirtyTwo(_) => FULL_SCALE_32,
        }
    }

    /// Sample value at `index`, widened so `abs()` cannot overflow.
    pub fn sample(&self, index: usize) -> Result<i64> {
        let value = match self {
            SampleBuffer::Eight(samples) => samples.get(index).map(|&s| i64::from(s)),
            SampleBuffer::Sixteen(samples) => samples.get(index).map(|&s| i64::from(s)),
            SampleBuffer::ThirtyTwo(samples) => samples.get(index).map(|&s| i64::from(s)),
        };

        value.ok_or(SampleError::IndexOutOfRange { index, len: self.len() })
    }

    /// Level of the sample at `index` relative to full scale: `20 * log10(|s| / full_scale)`.
    ///
    /// A zero sample yields negative infinity, which never compares `>=` to a
    /// finite threshold.
    pub fn decibels(&self, index: usize) -> Result<f64> {
        let magnitude = self.sample(index)?.unsigned_abs();
        if magnitude == 0 {
            return Ok(f64::NEG_INFINITY);
        }

        Ok(20.0 * (magnitude as f64 / self.full_scale()).log10())
    }

    /// Encodes samples in `range` back to little-endian bytes of the native width.
    pub fn encode_range(&self, range: Range<usize>) -> Result<Vec<u8>> {
        if range.start > range.end || range.end > self.len() {
            return Err(SampleError::RangeOutOfBounds {
                start: range.start,
                end: range.end,
                len: self.len(),
            });
        }

        let mut bytes = Vec::with_capacity(range.len() * self.bytes_per_sample());
        match self {
            SampleBuffer::Eight(samples) => samples[range].iter().for_each(|s| bytes.extend_from_slice(&s.to_le_bytes())),
            SampleBuffer::Sixteen(samples) => samples[range].iter().for_each(|s| bytes.extend_from_slice(&s.to_le_bytes())),
            SampleBuffer::ThirtyTwo(samples) => samples[range].iter().for_each(|s| bytes.extend_from_slice(&s.to_le_bytes())),
        }

        Ok(bytes)
    }
}
