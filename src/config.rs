use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::processing::loop_finder::DEFAULT_THRESHOLD_DB;

const DEFAULT_OUTPUT_SUFFIX: &str = "-EXTENDED";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Main configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub detection: DetectionConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DetectionConfig {
    #[serde(default = "default_threshold_db")]
    pub threshold_db: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OutputConfig {
    /// Inserted before the input file's extension.
    #[serde(default = "default_output_suffix")]
    pub suffix: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold_db: default_threshold_db(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            suffix: default_output_suffix(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// Default value functions for serde
fn default_threshold_db() -> f64 {
    DEFAULT_THRESHOLD_DB
}
fn default_output_suffix() -> String {
    DEFAULT_OUTPUT_SUFFIX.to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration (file if given, defaults otherwise) with environment variable overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Override with environment variables
    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(threshold) = var("LOOPX_THRESHOLD_DB") {
            self.detection.threshold_db = threshold
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid LOOPX_THRESHOLD_DB '{threshold}': {e}"))?;
        }

        if let Some(suffix) = var("LOOPX_OUTPUT_SUFFIX") {
            self.output.suffix = suffix;
        }

        if let Some(log_level) = var("LOOPX_LOG_LEVEL") {
            self.logging.level = log_level;
        }

        Ok(())
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if !self.detection.threshold_db.is_finite() {
            anyhow::bail!("threshold_db must be a finite number, got {}", self.detection.threshold_db);
        }

        if self.output.suffix.is_empty() {
            anyhow::bail!("Output suffix cannot be empty");
        }
        if self.output.suffix.contains(&['/', '\\'][..]) {
            anyhow::bail!("Output suffix cannot contain a path separator: {}", self.output.suffix);
        }

        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            anyhow::bail!("Invalid log level: {}", self.logging.level);
        }

        Ok(())
    }
}
