//! Driver subprocess transport.
//!
//! The remote namespace is reachable only through an external executable
//! speaking a four-command contract: `meta`, `mkdir`, `upload`, `fixmd5`.
//! The transport captures trimmed stdout lines and nothing more; semantic
//! interpretation belongs to the probe and the decider.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// One driver invocation. `Upload` carries the local size so the executor can
/// derive its timeout; size is never part of the argv.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverOp {
    Meta(String),
    Mkdir(String),
    Upload {
        local_path: PathBuf,
        remote_parent: String,
        size: u64,
    },
    FixMd5(String),
}

impl DriverOp {
    pub fn argv(&self) -> Vec<String> {
        match self {
            DriverOp::Meta(path) => vec!["meta".to_string(), path.clone()],
            DriverOp::Mkdir(path) => vec!["mkdir".to_string(), path.clone()],
            DriverOp::Upload {
                local_path,
                remote_parent,
                ..
            } => vec![
                "upload".to_string(),
                local_path.to_string_lossy().into_owned(),
                remote_parent.clone(),
            ],
            DriverOp::FixMd5(path) => vec!["fixmd5".to_string(), path.clone()],
        }
    }

    /// Command verb, for logs.
    pub fn verb(&self) -> &'static str {
        match self {
            DriverOp::Meta(_) => "meta",
            DriverOp::Mkdir(_) => "mkdir",
            DriverOp::Upload { .. } => "upload",
            DriverOp::FixMd5(_) => "fixmd5",
        }
    }
}

/// Non-timeout transport failures. These are never retried.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to run driver process: {0}")]
    Spawn(#[from] std::io::Error),

    /// The driver was killed by a signal instead of exiting. A normal exit,
    /// whatever the code, still yields its captured output — the driver
    /// reports missing paths through output shape, not exit status.
    #[error("driver terminated abnormally: {0}")]
    AbnormalExit(String),
}

/// Transport seam over the driver executable.
///
/// Production uses [`CliDriver`]; tests script responses in memory so the
/// engine can be exercised without a subprocess.
#[async_trait]
pub trait DriverTransport: Send + Sync {
    /// Invoke the driver once and return its stdout as trimmed lines.
    async fn invoke(&self, op: &DriverOp) -> Result<Vec<String>, TransportError>;
}

/// Spawns the configured driver executable per invocation.
pub struct CliDriver {
    program: PathBuf,
}

impl CliDriver {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl DriverTransport for CliDriver {
    async fn invoke(&self, op: &DriverOp) -> Result<Vec<String>, TransportError> {
        let argv = op.argv();
        debug!(driver = %self.program.display(), ?argv, "invoking driver");
        // kill_on_drop ensures a timed-out or cancelled invocation does not
        // leave the driver process orphaned.
        let output = Command::new(&self.program)
            .args(&argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if output.status.code().is_none() {
            return Err(TransportError::AbnormalExit(output.status.to_string()));
        }

        let lines = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|l| l.trim().to_string())
            .collect();
        Ok(lines)
    }
}
