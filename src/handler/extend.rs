/// End-to-end extension of a looping WAVE file.
///
/// Reads the input, finds the loop points, plans the repeat count and writes
/// `<stem><suffix>.<ext>` next to the input.
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::media::assembler::{AssembleError, OutputAssembler};
use crate::media::wav::{WavError, WaveFile};
use crate::processing::duration_planner::{DurationPlanner, PlanError};
use crate::processing::loop_finder::{seconds_to_index, LoopError, LoopPointFinder};
use crate::processing::sample_buffer::{SampleBuffer, SampleError};

type Result<T> = std::result::Result<T, ExtendError>;

/// Fatal errors from any stage of the pipeline.
#[derive(Debug, Error)]
pub enum ExtendError {
    #[error("Input {0:?} has no file extension")]
    MissingExtension(PathBuf),

    #[error("Target length must be at least one minute")]
    ZeroMinutes,

    #[error("Reading input failed: {0}")]
    Input(#[from] WavError),

    #[error("Decoding samples failed: {0}")]
    Samples(#[from] SampleError),

    #[error("Loop detection failed: {0}")]
    Detection(#[from] LoopError),

    #[error("Planning output failed: {0}")]
    Planning(#[from] PlanError),

    #[error("Writing output failed: {0}")]
    Output(#[from] AssembleError),
}

/// One conversion job.
#[derive(Debug, Clone)]
pub struct ExtendRequest {
    pub input: PathBuf,
    pub minutes: u32,
    pub begin_secs: f64,
    pub end_secs: f64,
    pub threshold_db: f64,
    pub output_suffix: String,
}

/// Outcome of a conversion, including the non-fatal findings.
#[derive(Debug, Clone, Serialize)]
pub struct ExtendReport {
    pub output: PathBuf,
    pub warnings: Vec<String>,
    pub list_size: usize,
    pub loop_start: usize,
    pub loop_end: usize,
    pub found: bool,
    pub loops: u64,
    pub total_samples: u64,
    pub data_size: u32,
}

/// Runs the whole conversion for `request`.
pub fn extend_file(request: &ExtendRequest) -> Result<ExtendReport> {
    if request.minutes == 0 {
        return Err(ExtendError::ZeroMinutes);
    }
    let output = extended_path(&request.input, &request.output_suffix)?;

    let wave = WaveFile::open(&request.input)?;
    let header = wave.header;

    let warnings: Vec<String> = wave.warnings().iter().map(ToString::to_string).collect();
    for warning in &warnings {
        warn!("WARNING: {warning}");
    }
    info!("Input header for {:?}:\n{header}", request.input);

    let buffer = SampleBuffer::from_bytes(&wave.data, header.bytes_per_sample())?;
    drop(wave);
    if buffer.is_empty() {
        warn!("Input holds no sample data");
    }

    let finder = LoopPointFinder::new(request.threshold_db, header.num_channels)?;
    let start_hint = seconds_to_index(request.begin_secs, header.byte_rate, header.bytes_per_sample());
    let end_hint = seconds_to_index(request.end_secs, header.byte_rate, header.bytes_per_sample());
    let points = finder.find(&buffer, start_hint, end_hint)?;

    let samples_per_second = u64::from(header.byte_rate / u32::from(header.bytes_per_sample()));
    if points.found {
        info!("Found and updated looping point!");
        info!("If the output doesn't sound right, try adjusting the threshold value and/or section to loop.");
        info!("Starting loop at {}", format_timestamp(points.start, samples_per_second));
        info!("Ending loop at {}", format_timestamp(points.end, samples_per_second));
    } else {
        warn!("Unable to find exact looping point. Try decreasing the threshold value.");
        warn!(
            "Looping between the search bounds {} and {} instead",
            format_timestamp(points.start, samples_per_second),
            format_timestamp(points.end, samples_per_second)
        );
    }

    let plan = DurationPlanner::new(header.byte_rate, header.bytes_per_sample()).plan(&points, buffer.len(), request.minutes)?;
    info!("Repeating the loop {} times for {} minute(s)", plan.loops, plan.minutes);

    OutputAssembler::new(header, &buffer).write_file(&output, &points, &plan)?;

    if points.found {
        info!("Done!");
    }

    Ok(ExtendReport {
        output,
        warnings,
        list_size: buffer.len(),
        loop_start: points.start,
        loop_end: points.end,
        found: points.found,
        loops: plan.loops,
        total_samples: plan.total_samples,
        data_size: plan.data_size,
    })
}

/// Inserts `suffix` right before the extension: `song.wav` becomes `song-EXTENDED.wav`.
pub fn extended_path(input: &Path, suffix: &str) -> Result<PathBuf> {
    let (Some(stem), Some(extension)) = (input.file_stem(), input.extension()) else {
        return Err(ExtendError::MissingExtension(input.to_path_buf()));
    };

    let mut name = OsString::from(stem);
    name.push(suffix);
    name.push(".");
    name.push(extension);

    Ok(input.with_file_name(name))
}

/// Formats a sample index as `M:SS.ffffff`.
fn format_timestamp(index: usize, samples_per_second: u64) -> String {
    if samples_per_second == 0 {
        return "0:00.000000".to_string();
    }

    let total = index as f64 / samples_per_second as f64;
    let minutes = (total / 60.0).floor();
    let seconds = total - minutes * 60.0;

    format!("{}:{:09.6}", minutes as u64, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::wav::tests::pcm_header;
    use crate::media::wav::{WaveHeader, HEADER_LEN};

    fn write_wav(dir: &Path, name: &str, header: WaveHeader, samples: &[i16]) -> PathBuf {
        let mut bytes = header.serialize();
        for sample in samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }

        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn request(input: PathBuf, begin_secs: f64, end_secs: f64) -> ExtendRequest {
        ExtendRequest {
            input,
            minutes: 1,
            begin_secs,
            end_secs,
            threshold_db: -6.0,
            output_suffix: "-EXTENDED".to_string(),
        }
    }

    #[test]
    fn test_extended_path() {
        assert_eq!(extended_path(Path::new("song.wav"), "-EXTENDED").unwrap(), PathBuf::from("song-EXTENDED.wav"));
        assert_eq!(extended_path(Path::new("/a/b.c/track.v2.wav"), "_x").unwrap(), PathBuf::from("/a/b.c/track.v2_x.wav"));
        assert!(matches!(extended_path(Path::new("noext"), "-EXTENDED"), Err(ExtendError::MissingExtension(_))));
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0, 44_100), "0:00.000000");
        assert_eq!(format_timestamp(44_100 * 75 + 22_050, 44_100), "1:15.500000");
    }

    #[test]
    fn test_quiet_input_uses_fallback_bounds() {
        let dir = tempfile::tempdir().unwrap();
        // 16-bit mono at 10 kHz, 100000 samples of low-level noise
        let samples = vec![50i16; 100_000];
        let header = pcm_header(1, 10_000, 16, 200_000);
        let input = write_wav(dir.path(), "quiet.wav", header, &samples);

        let report = extend_file(&request(input, 0.0, 5.0)).unwrap();

        assert!(!report.found);
        assert_eq!((report.loop_start, report.loop_end), (0, 50_000));
        assert!(report.warnings.is_empty());
        assert_eq!(report.output, dir.path().join("quiet-EXTENDED.wav"));

        let written = std::fs::read(&report.output).unwrap();
        assert_eq!(written.len(), HEADER_LEN + report.data_size as usize);
        assert_eq!(report.total_samples, report.loops * 50_000 + 50_000);
    }

    #[test]
    fn test_detected_loop_is_repeated() {
        let dir = tempfile::tempdir().unwrap();
        let mut samples = vec![0i16; 100_000];
        samples[40] = 30_000;
        samples[70_000] = -30_000;
        let header = pcm_header(1, 10_000, 16, 200_000);
        let input = write_wav(dir.path(), "loud.wav", header, &samples);

        let report = extend_file(&request(input, 0.0, 6.0)).unwrap();

        assert!(report.found);
        assert_eq!((report.loop_start, report.loop_end), (40, 70_000));
        // 600000 samples needed, 30040 outside the loop, 69960 per repetition
        assert_eq!(report.loops, 9);
        assert_eq!(report.total_samples, 40 + 9 * 69_960 + 30_000);

        let written = std::fs::read(&report.output).unwrap();
        let output = WaveFile::parse(&written).unwrap();
        assert_eq!(output.header, header.with_data_size(report.data_size));
        assert_eq!(output.data.len() as u64, report.total_samples * 2);
    }

    #[test]
    fn test_header_warnings_are_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut header = pcm_header(1, 100, 16, 200);
        header.chunk_id = *b"RIFX";
        let samples = vec![1000i16; 100];
        let input = write_wav(dir.path(), "odd.wav", header, &samples);

        let report = extend_file(&request(input, 0.0, 0.0)).unwrap();

        assert_eq!(report.warnings, vec!["ChunkID is not 'RIFF' (found 'RIFX')".to_string()]);
        assert!(report.output.exists());
    }

    #[test]
    fn test_degenerate_loop_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        // Single sample: start and end both clamp to the midpoint 0
        let header = pcm_header(1, 100, 16, 2);
        let input = write_wav(dir.path(), "tiny.wav", header, &[7]);

        let result = extend_file(&request(input, 0.0, 0.0));

        assert!(matches!(result, Err(ExtendError::Planning(PlanError::DegenerateLoop { .. }))));
        assert!(!dir.path().join("tiny-EXTENDED.wav").exists());
    }

    #[test]
    fn test_missing_input_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let result = extend_file(&request(dir.path().join("absent.wav"), 0.0, 1.0));

        assert!(matches!(result, Err(ExtendError::Input(WavError::Read { .. }))));
    }
}
