//! Immutable run configuration.
//!
//! All tunables are gathered into a single [`MirrorConfig`] constructed once
//! and passed by shared reference into every component. Name filters are
//! compiled at construction so a bad pattern fails the run up front instead
//! of somewhere mid-traversal.

use crate::error::MirrorError;
use regex::Regex;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Serde-facing settings, as read from a TOML config file or CLI flags.
#[derive(Debug, Clone, Deserialize)]
pub struct MirrorSettings {
    /// Path to the external driver executable.
    pub driver: PathBuf,
    /// Local source root to mirror from.
    pub src: PathBuf,
    /// Remote destination root, `/`-separated.
    pub dst: String,
    /// File names matching this pattern are excluded.
    #[serde(default)]
    pub ignore: Option<String>,
    /// When set, only file names matching this pattern are considered.
    #[serde(default)]
    pub include: Option<String>,
    #[serde(default)]
    pub retry: RetrySettings,
}

/// Serde-facing retry/timeout tunables.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Per-attempt timeout for meta/mkdir/fixmd5 calls, in seconds.
    #[serde(default = "default_op_timeout_secs")]
    pub op_timeout_secs: u64,
    /// Pessimistic sustained transfer rate used to size upload timeouts.
    #[serde(default = "default_min_throughput")]
    pub min_throughput_bytes_per_sec: u64,
    /// Startup/finalization overhead added to every upload timeout, in seconds.
    #[serde(default = "default_upload_grace_secs")]
    pub upload_grace_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_op_timeout_secs() -> u64 {
    60
}

fn default_min_throughput() -> u64 {
    // 0.8 MiB/s with a further 0.8 pessimism factor.
    (1024.0 * 1024.0 * 0.8 * 0.8) as u64
}

fn default_upload_grace_secs() -> u64 {
    15 * 60
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            op_timeout_secs: default_op_timeout_secs(),
            min_throughput_bytes_per_sec: default_min_throughput(),
            upload_grace_secs: default_upload_grace_secs(),
        }
    }
}

/// Timeout and retry policy for driver invocations.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Fixed per-attempt timeout for metadata, mkdir and checksum-repair calls.
    pub op_timeout: Duration,
    pub min_throughput_bytes_per_sec: u64,
    pub upload_grace: Duration,
}

impl RetryPolicy {
    /// Size-derived per-attempt timeout for an upload:
    /// `size / min_throughput + grace`.
    pub fn upload_timeout(&self, size: u64) -> Duration {
        let transfer = size as f64 / self.min_throughput_bytes_per_sec.max(1) as f64;
        Duration::from_secs_f64(transfer) + self.upload_grace
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetrySettings::default().into()
    }
}

impl From<RetrySettings> for RetryPolicy {
    fn from(s: RetrySettings) -> Self {
        Self {
            max_attempts: s.max_attempts.max(1),
            op_timeout: Duration::from_secs(s.op_timeout_secs),
            min_throughput_bytes_per_sec: s.min_throughput_bytes_per_sec.max(1),
            upload_grace: Duration::from_secs(s.upload_grace_secs),
        }
    }
}

/// Validated, immutable configuration for one run.
#[derive(Debug)]
pub struct MirrorConfig {
    pub driver: PathBuf,
    pub src: PathBuf,
    pub dst: String,
    pub ignore: Option<Regex>,
    pub include: Option<Regex>,
    pub retry: RetryPolicy,
}

impl MirrorConfig {
    pub fn from_settings(settings: MirrorSettings) -> Result<Self, MirrorError> {
        let ignore = compile_filter(settings.ignore.as_deref(), "ignore")?;
        let include = compile_filter(settings.include.as_deref(), "include")?;
        Ok(Self {
            driver: settings.driver,
            src: settings.src,
            dst: settings.dst,
            ignore,
            include,
            retry: settings.retry.into(),
        })
    }
}

fn compile_filter(pattern: Option<&str>, which: &str) -> Result<Option<Regex>, MirrorError> {
    match pattern {
        None => Ok(None),
        Some(p) => Regex::new(p)
            .map(Some)
            .map_err(|e| MirrorError::Config(format!("invalid {} pattern {:?}: {}", which, p, e))),
    }
}
