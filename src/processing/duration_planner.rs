/// Repeat-count planning for the extended output.
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::media::wav::RIFF_SIZE_OVERHEAD;
use crate::processing::loop_finder::LoopPoints;

const SECONDS_PER_MINUTE: u64 = 60;

type Result<T> = std::result::Result<T, PlanError>;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Loop segment is empty (start == end == {index}), cannot extend duration")]
    DegenerateLoop { index: usize },

    #[error("Loop points [{start}:{end}] are invalid for {list_size} samples")]
    InvalidLoopPoints { start: usize, end: usize, list_size: usize },

    #[error("Sample width is 0 bytes")]
    ZeroSampleWidth,

    #[error("Planned output of {bytes} data bytes does not fit in a WAVE file")]
    OutputTooLarge { bytes: u64 },
}

/// How many times the loop body repeats and the resulting output size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoopPlan {
    pub samples_per_second: u64,
    pub minutes: u32,
    pub loops: u64,
    /// Output sample count: prefix + loops * body + suffix.
    pub total_samples: u64,
    /// New `subchunk2_size`.
    pub data_size: u32,
    /// New `chunk_size`.
    pub chunk_size: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct DurationPlanner {
    byte_rate: u32,
    bytes_per_sample: u16,
}

impl DurationPlanner {
    pub fn new(byte_rate: u32, bytes_per_sample: u16) -> Self {
        Self { byte_rate, bytes_per_sample }
    }

    /// Finds the smallest loop count whose output reaches `minutes`.
    pub fn plan(&self, points: &LoopPoints, list_size: usize, minutes: u32) -> Result<LoopPlan> {
        if self.bytes_per_sample == 0 {
            return Err(PlanError::ZeroSampleWidth);
        }
        if points.start > points.end || points.end > list_size {
            return Err(PlanError::InvalidLoopPoints {
                start: points.start,
                end: points.end,
                list_size,
            });
        }
        if points.start == points.end {
            return Err(PlanError::DegenerateLoop { index: points.start });
        }

        let samples_per_second = u64::from(self.byte_rate / u32::from(self.bytes_per_sample));
        let target = samples_per_second * SECONDS_PER_MINUTE * u64::from(minutes);

        let body = points.body_len() as u64;
        let base = (points.start + (list_size - points.end)) as u64;

        // Closed form of "add one body at a time until the target is reached"
        let loops = target.saturating_sub(base).div_ceil(body);
        let total_samples = base + loops * body;

        let bytes = total_samples * u64::from(self.bytes_per_sample);
        let data_size = u32::try_from(bytes)
            .ok()
            .filter(|size| size.checked_add(RIFF_SIZE_OVERHEAD).is_some())
            .ok_or(PlanError::OutputTooLarge { bytes })?;

        debug!("Planned {loops} loops of {body} samples: {total_samples} samples, {data_size} bytes");

        Ok(LoopPlan {
            samples_per_second,
            minutes,
            loops,
            total_samples,
            data_size,
            chunk_size: data_size + RIFF_SIZE_OVERHEAD,
        })
    }
}
