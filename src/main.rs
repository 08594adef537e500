use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::config::{Config, LogFormat, LoggingConfig};
use crate::handler::extend::{extend_file, ExtendRequest};

mod cli;
mod config;
mod handler;
mod media;
mod processing;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    // Initialize tracing
    init_tracing(&config.logging);

    if !cli::confirm_input_type(&cli.input, cli.yes)? {
        anyhow::bail!("Aborted: {:?} is not a .wav file", cli.input);
    }

    let request = ExtendRequest {
        input: cli.input,
        minutes: cli.minutes,
        begin_secs: cli.begin,
        end_secs: cli.end,
        threshold_db: cli.threshold.unwrap_or(config.detection.threshold_db),
        output_suffix: config.output.suffix,
    };
    info!("Extending {:?} to {} minute(s) at {} dB", request.input, request.minutes, request.threshold_db);

    let report = extend_file(&request)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}
