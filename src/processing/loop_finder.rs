/// Loop point detection by decibel threshold.
///
/// The scan is a two-phase forward search over channel 0 of every frame. A loud
/// sample before the buffer midpoint moves the loop start and sends the search
/// to the frame after the end hint; a loud sample at or after the midpoint fixes
/// the loop end.
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::processing::sample_buffer::{SampleBuffer, SampleError};

pub const DEFAULT_THRESHOLD_DB: f64 = -6.0;

type Result<T> = std::result::Result<T, LoopError>;

#[derive(Debug, Error)]
pub enum LoopError {
    #[error("Channel count is 0, cannot step through frames")]
    ZeroChannels,

    #[error("Threshold must be a finite number of decibels, got {0}")]
    InvalidThreshold(f64),

    #[error(transparent)]
    Sample(#[from] SampleError),
}

/// Detected (or fallback) splice pair.
///
/// Always satisfies `start <= list_size / 2 <= end <= list_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoopPoints {
    pub start: usize,
    pub end: usize,
    pub found: bool,
}

impl LoopPoints {
    pub fn body_len(&self) -> usize {
        self.end - self.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanPhase {
    SearchingStart,
    SearchingEnd,
}

/// Threshold scanner for one interleaved buffer layout.
#[derive(Debug, Clone, Copy)]
pub struct LoopPointFinder {
    threshold_db: f64,
    num_channels: usize,
}

impl LoopPointFinder {
    pub fn new(threshold_db: f64, num_channels: u16) -> Result<Self> {
        if num_channels == 0 {
            return Err(LoopError::ZeroChannels);
        }
        if !threshold_db.is_finite() {
            return Err(LoopError::InvalidThreshold(threshold_db));
        }

        let finder = Self {
            threshold_db,
            num_channels: usize::from(num_channels),
        };
        if !finder.can_match() {
            warn!("Threshold {threshold_db} dB is above full scale and can never match, loop points will fall back to the hints");
        }

        Ok(finder)
    }

    /// Levels are relative to full scale, so no sample ever exceeds 0 dB.
    pub fn can_match(&self) -> bool {
        self.threshold_db <= 0.0
    }

    /// Clamps raw hint indices into `[0, half]` and `[half, list_size]`, then
    /// snaps them to frame boundaries so the loop body is whole frames.
    pub fn search_bounds(&self, list_size: usize, start_hint: usize, end_hint: usize) -> (usize, usize) {
        let half = list_size / 2;
        let channels = self.num_channels;

        let start = start_hint.min(half);
        let start = start - start % channels;

        let end = end_hint.clamp(half, list_size);
        let end = end.next_multiple_of(channels).min(list_size);

        (start, end)
    }

    /// Runs the scan. When no sample reaches the threshold the clamped hint
    /// bounds come back with `found == false`.
    pub fn find(&self, buffer: &SampleBuffer, start_hint: usize, end_hint: usize) -> Result<LoopPoints> {
        let list_size = buffer.len();
        let half = list_size / 2;
        let (hint_start, hint_end) = self.search_bounds(list_size, start_hint, end_hint);

        debug!("Scanning {list_size} samples from {hint_start} (end hint {hint_end}, midpoint {half}) at {} dB", self.threshold_db);

        let mut start = hint_start;
        let mut phase = ScanPhase::SearchingStart;
        // The end hint frame itself is skipped once a start is found
        let resume_at = hint_end.saturating_add(self.num_channels);

        loop {
            let from = match phase {
                ScanPhase::SearchingStart => start,
                ScanPhase::SearchingEnd => resume_at,
            };

            let Some(index) = self.next_crossing(buffer, from)? else {
                break;
            };

            match phase {
                ScanPhase::SearchingStart if index < half => {
                    debug!("Loop start refined to sample {index}, resuming at {resume_at}");
                    start = index;
                    phase = ScanPhase::SearchingEnd;
                }
                _ => {
                    debug!("Loop end fixed at sample {index}");
                    return Ok(LoopPoints { start, end: index, found: true });
                }
            }
        }

        Ok(LoopPoints {
            start: hint_start,
            end: hint_end,
            found: false,
        })
    }

    /// First index at or after `from`, stepping by frame, whose level reaches the threshold.
    fn next_crossing(&self, buffer: &SampleBuffer, from: usize) -> Result<Option<usize>> {
        for index in (from..buffer.len()).step_by(self.num_channels) {
            if buffer.decibels(index)? >= self.threshold_db {
                return Ok(Some(index));
            }
        }

        Ok(None)
    }
}

/// Converts a timestamp in seconds to an interleaved sample index, truncating.
pub fn seconds_to_index(seconds: f64, byte_rate: u32, bytes_per_sample: u16) -> usize {
    if bytes_per_sample == 0 || seconds.is_nan() || seconds <= 0.0 {
        return 0;
    }

    // Float-to-int `as` saturates, so huge hints land at usize::MAX and get clamped later
    (seconds * f64::from(byte_rate) / f64::from(bytes_per_sample)) as usize
}
