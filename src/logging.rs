//! # Logging
//!
//! Subscriber setup shared by all binaries. Output goes to stderr and, when
//! a log directory is configured, to a daily-rolling file as well.

use serde::de::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{Result, TelemetryError};

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence over `config.level`.
///
/// # Returns
///
/// * `Result<Option<WorkerGuard>>` - Guard for the file writer; keep it alive
///   until exit or buffered lines are lost
///
/// # Errors
///
/// Returns `Config` if the level is not a valid filter directive, or `Io`
/// if a subscriber is already installed
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => filter_from_level(&config.level)?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if config.log_dir.is_empty() {
        builder
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| TelemetryError::Io(std::io::Error::other(e.to_string())))?;
        return Ok(None);
    }

    let appender = tracing_appender::rolling::daily(&config.log_dir, &config.file_prefix);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    builder
        .with_ansi(false)
        .with_writer(std::io::stderr.and(file_writer))
        .try_init()
        .map_err(|e| TelemetryError::Io(std::io::Error::other(e.to_string())))?;

    Ok(Some(guard))
}

fn filter_from_level(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(level).map_err(|e| {
        TelemetryError::Config(toml::de::Error::custom(format!(
            "invalid logging level {:?}: {}",
            level, e
        )))
    })
}
