/// Command-line surface: arguments, timestamp hints and the non-WAV prompt.
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use regex::Regex;
use thiserror::Error;
use tracing::warn;

// [[MM:]SS[.frac]] - minutes are whole, seconds may carry a fraction
const TIMESTAMP_PATTERN: &str = r"^(?:(?P<minutes>\d+):)?(?P<seconds>\d+(?:\.\d*)?|\.\d+)$";

#[derive(Debug, Error)]
pub enum TimestampError {
    #[error("Invalid timestamp '{0}', expected [[MM:]SS[.frac]]")]
    Malformed(String),

    #[error("Regex compilation failed: {0}")]
    RegexCompilation(#[from] regex::Error),
}

#[derive(Parser, Debug)]
#[command(name = "loopx")]
#[command(
    version,
    about = "Extend a looping WAVE file by repeating its loop section",
    after_help = "NOTE: for BEGIN and END, put the time BEFORE the actual loop."
)]
pub struct Cli {
    /// Audio file to loop, with header
    pub input: PathBuf,

    /// New audio file length, in minutes
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    pub minutes: u32,

    /// When to start looking for the loop start, as [[MM:]SS[.frac]]. The more precise, the better
    #[arg(value_parser = parse_timestamp)]
    pub begin: f64,

    /// When to start looking for the loop end, as [[MM:]SS[.frac]]. The more precise, the better
    #[arg(value_parser = parse_timestamp)]
    pub end: f64,

    /// Decibel level a sample must reach to mark a loop point (negative; overrides the config)
    #[arg(allow_negative_numbers = true)]
    pub threshold: Option<f64>,

    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Process non-.wav extensions without asking
    #[arg(short, long)]
    pub yes: bool,

    /// Print the conversion report as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

/// Converts `[[MM:]SS[.frac]]` to seconds. Without a `:` the whole string is seconds.
pub fn parse_timestamp(text: &str) -> std::result::Result<f64, TimestampError> {
    let pattern = Regex::new(TIMESTAMP_PATTERN)?;
    let trimmed = text.trim();
    let captures = pattern.captures(trimmed).ok_or_else(|| TimestampError::Malformed(text.to_string()))?;

    let minutes: f64 = match captures.name("minutes") {
        Some(m) => m.as_str().parse().map_err(|_| TimestampError::Malformed(text.to_string()))?,
        None => 0.0,
    };
    let seconds: f64 = captures["seconds"].parse().map_err(|_| TimestampError::Malformed(text.to_string()))?;

    Ok(minutes * 60.0 + seconds)
}

/// Asks before processing a file whose extension is not `.wav`.
/// Returns `false` when the user declines.
pub fn confirm_input_type(input: &Path, assume_yes: bool) -> Result<bool> {
    let Some(extension) = input.extension() else {
        anyhow::bail!("Please include the filename extension: {:?}", input);
    };

    // `song.WAV` counts as WAVE without asking
    if extension.eq_ignore_ascii_case("wav") {
        return Ok(true);
    }

    if assume_yes {
        warn!("Only .wav files are supported, continuing with {:?} anyway", input);
        return Ok(true);
    }

    let answer = inquire::Confirm::new("Only .wav files are supported. Continue?").with_default(false).prompt()?;

    Ok(answer)
}
