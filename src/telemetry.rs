//! Log sink setup
//!
//! Every component logs through `tracing`. The subscriber installed here
//! appends to the configured log file through a mutex, so concurrent
//! listeners never interleave partial lines.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Open (or create) the log file for appending
pub fn open_log_file(path: impl AsRef<Path>) -> Result<File> {
    let path = path.as_ref();
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

/// `RUST_LOG` wins over the configured level
fn env_filter(config: &Config) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_level.to_lowercase()))
}

/// Install the global subscriber writing to `config.log_file`.
///
/// Use `LOG_FORMAT=gcp` for structured GCP Cloud Logging lines.
pub fn init(config: &Config) -> Result<()> {
    let file = open_log_file(&config.log_file)?;
    let writer = Mutex::new(file);

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "gcp" {
        tracing_subscriber::registry()
            .with(env_filter(config))
            .with(tracing_stackdriver::layer().with_writer(writer))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter(config))
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()?;
    }

    Ok(())
}
