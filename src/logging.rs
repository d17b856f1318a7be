//! Logging System
//!
//! Structured logging via the `tracing` crate. Console output by default;
//! long backup runs usually also want a per-day log file, so the file sink
//! picks the first unused `log/<date>-<n>.log` when no explicit path is
//! given.

use crate::error::MirrorError;
use std::path::PathBuf;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Initialize the logging system.
///
/// `level` is an `EnvFilter` directive (overridable through the
/// `NETMIRROR_LOG` environment variable). When `log_file` is `Some`, output
/// is teed to the file and stderr; `Some(None)` resolves a dated default
/// path under `./log/`.
pub fn init_logging(level: &str, log_file: Option<Option<PathBuf>>) -> Result<(), MirrorError> {
    let filter = build_env_filter(level)?;
    let base_subscriber = Registry::default().with(filter);

    match log_file {
        Some(explicit) => {
            let path = match explicit {
                Some(path) => path,
                None => default_log_file_path()?,
            };
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    MirrorError::Config(format!("failed to create log directory: {}", e))
                })?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| {
                    MirrorError::Config(format!("failed to open log file {:?}: {}", path, e))
                })?;
            base_subscriber
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(file.and(std::io::stderr)),
                )
                .init();
        }
        None => {
            base_subscriber
                .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
                .init();
        }
    }
    Ok(())
}

fn build_env_filter(level: &str) -> Result<EnvFilter, MirrorError> {
    if let Ok(filter) = EnvFilter::try_from_env("NETMIRROR_LOG") {
        return Ok(filter);
    }
    EnvFilter::try_new(level)
        .map_err(|e| MirrorError::Config(format!("invalid log level {:?}: {}", level, e)))
}

/// First unused `log/<date>-<n>.log`, so each run of the day gets its own
/// file.
fn default_log_file_path() -> Result<PathBuf, MirrorError> {
    let date = chrono::Local::now().format("%Y-%m-%d");
    let mut count = 0u32;
    loop {
        let path = PathBuf::from(format!("log/{}-{}.log", date, count));
        if !path.exists() {
            return Ok(path);
        }
        count = count.checked_add(1).ok_or_else(|| {
            MirrorError::Config("exhausted log file names for today".to_string())
        })?;
    }
}
