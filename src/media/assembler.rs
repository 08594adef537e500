/// Writes the extended container: header, prefix, repeated loop body, suffix.
///
/// File output goes through a temp file in the destination directory that is
/// renamed over the target only after every sample is written and counted, so a
/// failed write never leaves a partial file behind.
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::media::wav::WaveHeader;
use crate::processing::duration_planner::LoopPlan;
use crate::processing::loop_finder::LoopPoints;
use crate::processing::sample_buffer::{SampleBuffer, SampleError};

type Result<T> = std::result::Result<T, AssembleError>;

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("Could not create output file in {dir:?}: {source}")]
    Create {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed writing output: {0}")]
    Write(#[from] std::io::Error),

    #[error("Could not move output into place at {path:?}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Wrote {written} samples but planned {planned}")]
    SampleCountMismatch { written: u64, planned: u64 },

    #[error(transparent)]
    Sample(#[from] SampleError),
}

/// Assembles output from an input header and its decoded samples.
pub struct OutputAssembler<'a> {
    header: WaveHeader,
    buffer: &'a SampleBuffer,
}

impl<'a> OutputAssembler<'a> {
    pub fn new(header: WaveHeader, buffer: &'a SampleBuffer) -> Self {
        Self { header, buffer }
    }

    /// Streams the full output to `writer`, returning the number of samples the
    /// writer accepted after the header.
    pub fn write_to<W: Write>(&self, writer: &mut W, points: &LoopPoints, plan: &LoopPlan) -> Result<u64> {
        let header = self.header.with_data_size(plan.data_size);
        writer.write_all(&header.serialize())?;

        let prefix = self.buffer.encode_range(0..points.start)?;
        // Body is encoded once and reused for every repetition
        let body = self.buffer.encode_range(points.start..points.end)?;
        let suffix = self.buffer.encode_range(points.end..self.buffer.len())?;

        let mut counter = CountingWriter::new(&mut *writer);
        counter.write_all(&prefix)?;
        for _ in 0..plan.loops {
            counter.write_all(&body)?;
        }
        counter.write_all(&suffix)?;
        counter.flush()?;

        let written = counter.bytes_written() / self.buffer.bytes_per_sample() as u64;

        if written != plan.total_samples {
            return Err(AssembleError::SampleCountMismatch {
                written,
                planned: plan.total_samples,
            });
        }

        Ok(written)
    }

    /// Writes the output to `path`, replacing any existing file only on success.
    pub fn write_file(&self, path: &Path, points: &LoopPoints, plan: &LoopPlan) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        // Dropping the temp file on any error path deletes it
        let tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|source| AssembleError::Create { dir: dir.clone(), source })?;
        debug!("Writing output through temp file {:?}", tmp.path());

        let mut writer = BufWriter::new(tmp);
        let written = self.write_to(&mut writer, points, plan)?;
        let tmp = writer.into_inner().map_err(|e| AssembleError::Write(e.into_error()))?;

        tmp.persist(path).map_err(|e| AssembleError::Persist {
            path: path.to_path_buf(),
            source: e.error,
        })?;

        info!("Wrote {} samples ({} bytes of data) to {:?}", written, plan.data_size, path);

        Ok(())
    }
}

/// Passes writes through to `inner`, counting the bytes it accepts.
struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    fn bytes_written(&self) -> u64 {
        self.written
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::wav::tests::pcm_header;
    use crate::media::wav::{WaveFile, HEADER_LEN};
    use crate::processing::duration_planner::DurationPlanner;

    fn fixture() -> (WaveHeader, SampleBuffer) {
        let samples: Vec<i16> = (0..10).collect();
        let header = pcm_header(1, 2, 16, 20);
        (header, SampleBuffer::Sixteen(samples))
    }

    #[test]
    fn test_prefix_loops_suffix_order() {
        let (header, buffer) = fixture();
        let points = LoopPoints { start: 2, end: 5, found: true };
        // 2 samples per second, one minute: 120 samples
        let plan = DurationPlanner::new(header.byte_rate, 2).plan(&points, buffer.len(), 1).unwrap();

        let mut out = Vec::new();
        let written = OutputAssembler::new(header, &buffer).write_to(&mut out, &points, &plan).unwrap();

        assert_eq!(written, plan.total_samples);
        assert_eq!(written, 2 + plan.loops * 3 + 5);
        assert_eq!(out.len(), HEADER_LEN + plan.data_size as usize);

        let output = WaveFile::parse(&out).unwrap();
        let decoded = SampleBuffer::from_bytes(&output.data, 2).unwrap();
        let SampleBuffer::Sixteen(samples) = decoded else {
            panic!("expected 16-bit samples");
        };

        assert_eq!(&samples[..2], &[0, 1]);
        assert_eq!(&samples[2..8], &[2, 3, 4, 2, 3, 4]);
        assert_eq!(&samples[samples.len() - 5..], &[5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_header_only_sizes_change() {
        let (header, buffer) = fixture();
        let points = LoopPoints { start: 0, end: 10, found: false };
        let plan = DurationPlanner::new(header.byte_rate, 2).plan(&points, buffer.len(), 1).unwrap();

        let mut out = Vec::new();
        OutputAssembler::new(header, &buffer).write_to(&mut out, &points, &plan).unwrap();

        let input = header.serialize();
        assert_eq!(&out[0..4], &input[0..4]);
        assert_eq!(&out[8..40], &input[8..40]);
        assert_eq!(&out[4..8], &(plan.data_size + 36).to_le_bytes());
        assert_eq!(&out[40..44], &plan.data_size.to_le_bytes());
    }

    #[test]
    fn test_plan_mismatch_is_reported() {
        let (header, buffer) = fixture();
        let points = LoopPoints { start: 2, end: 5, found: true };
        let mut plan = DurationPlanner::new(header.byte_rate, 2).plan(&points, buffer.len(), 1).unwrap();
        plan.total_samples += 1;

        let result = OutputAssembler::new(header, &buffer).write_to(&mut Vec::new(), &points, &plan);
        assert!(matches!(result, Err(AssembleError::SampleCountMismatch { .. })));
    }

    #[test]
    fn test_counting_writer_counts_accepted_bytes() {
        // Writer that takes at most 3 bytes per call, forcing write_all to loop
        struct Trickle(Vec<u8>);
        impl Write for Trickle {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                let n = buf.len().min(3);
                self.0.extend_from_slice(&buf[..n]);
                Ok(n)
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut counter = CountingWriter::new(Trickle(Vec::new()));
        counter.write_all(&[7; 10]).unwrap();
        counter.write_all(&[]).unwrap();

        assert_eq!(counter.bytes_written(), 10);
        assert_eq!(counter.inner.0.len(), 10);
    }

    #[test]
    fn test_failing_writer_is_reported() {
        // Sink that accepts the header and then runs out of space
        struct Full(usize);
        impl Write for Full {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                if self.0 == 0 {
                    return Err(std::io::Error::new(std::io::ErrorKind::WriteZero, "disk full"));
                }
                let n = buf.len().min(self.0);
                self.0 -= n;
                Ok(n)
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let (header, buffer) = fixture();
        let points = LoopPoints { start: 2, end: 5, found: true };
        let plan = DurationPlanner::new(header.byte_rate, 2).plan(&points, buffer.len(), 1).unwrap();

        let result = OutputAssembler::new(header, &buffer).write_to(&mut Full(HEADER_LEN + 8), &points, &plan);
        assert!(matches!(result, Err(AssembleError::Write(_))));
    }

    #[test]
    fn test_write_file_persists_complete_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let (header, buffer) = fixture();
        let points = LoopPoints { start: 2, end: 5, found: true };
        let plan = DurationPlanner::new(header.byte_rate, 2).plan(&points, buffer.len(), 1).unwrap();

        OutputAssembler::new(header, &buffer).write_file(&path, &points, &plan).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), HEADER_LEN + plan.data_size as usize);
        // Only the output remains, no stray temp files
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_file_missing_directory_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.wav");
        let (header, buffer) = fixture();
        let points = LoopPoints { start: 2, end: 5, found: true };
        let plan = DurationPlanner::new(header.byte_rate, 2).plan(&points, buffer.len(), 1).unwrap();

        let result = OutputAssembler::new(header, &buffer).write_file(&path, &points, &plan);

        assert!(matches!(result, Err(AssembleError::Create { .. })));
        assert!(!path.exists());
    }
}
