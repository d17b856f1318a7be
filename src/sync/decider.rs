//! Per-file upload decision: skip, upload, or repair-then-recheck.
//!
//! The remote checksum is the sole authority for content equality; size is
//! advisory and only shapes the upload timeout. A checksum the driver flags
//! as "possibly incorrect" is a server-side placeholder, so the decider asks
//! the driver to repair it and re-probes before trusting a comparison —
//! otherwise freshly-written remote content would trigger spurious uploads
//! or, worse, spurious skips.

use crate::remote::driver::DriverOp;
use crate::remote::executor::RetryingExecutor;
use crate::remote::probe::{
    ChecksumConfidence, MetadataResult, RemoteChecksum, RemoteProbe, REPAIR_FAILED_MARKER,
};
use crate::tree::node::{parent_of, FileNode};
use md5::{Digest, Md5};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Final accounting for one file in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Skipped,
    Uploaded,
    Failed(String),
}

pub struct UploadDecider {
    probe: RemoteProbe,
    executor: Arc<RetryingExecutor>,
}

impl UploadDecider {
    pub fn new(probe: RemoteProbe, executor: Arc<RetryingExecutor>) -> Self {
        Self { probe, executor }
    }

    /// Decide what to do with `file` and carry it out. Yields exactly one
    /// outcome per file per run; transport-level retry already happened in
    /// the executor, so a failed upload is not re-attempted here.
    pub async fn decide(&self, file: &FileNode, remote_path: &str) -> UploadOutcome {
        match self.probe.query(remote_path).await {
            // A login failure on a file's own metadata is treated as
            // missing rather than branch-fatal; only directory provisioning
            // escalates it.
            MetadataResult::Missing | MetadataResult::NotLoggedIn => {
                self.upload(file, remote_path).await
            }
            MetadataResult::Present { checksum: None, .. } => {
                debug!(path = remote_path, "remote present without checksum, uploading");
                self.upload(file, remote_path).await
            }
            MetadataResult::Present {
                checksum: Some(remote),
                ..
            } => {
                let remote_value = match remote.confidence {
                    ChecksumConfidence::Certain => remote.value,
                    ChecksumConfidence::Uncertain => {
                        self.repair_checksum(remote_path, remote).await
                    }
                };
                let local_value = match local_md5(&file.local_path).await {
                    Ok(hash) => hash,
                    Err(e) => {
                        warn!(file = %file.relative_path, "local hashing failed: {}", e);
                        return UploadOutcome::Failed(format!("local read error: {}", e));
                    }
                };
                if local_value.eq_ignore_ascii_case(&remote_value) {
                    debug!(file = %file.relative_path, "checksums match, skipping");
                    UploadOutcome::Skipped
                } else {
                    debug!(file = %file.relative_path, "checksum mismatch, re-uploading");
                    self.upload(file, remote_path).await
                }
            }
        }
    }

    /// Two-phase handling for placeholder checksums: ask the driver to
    /// repair, then re-probe once. A freshly re-probed value is
    /// authoritative; the stale uncertain value is used only when the repair
    /// reports failure or the re-probe no longer sees the file.
    async fn repair_checksum(&self, remote_path: &str, original: RemoteChecksum) -> String {
        match self
            .executor
            .run(&DriverOp::FixMd5(remote_path.to_string()))
            .await
        {
            Ok(lines) => {
                if lines
                    .first()
                    .is_some_and(|l| l.contains(REPAIR_FAILED_MARKER))
                {
                    debug!(path = remote_path, "checksum repair failed, keeping original value");
                    return original.value;
                }
            }
            Err(e) => {
                warn!(path = remote_path, "checksum repair call failed: {}", e);
                return original.value;
            }
        }
        match self.probe.query(remote_path).await {
            MetadataResult::Present {
                checksum: Some(fresh),
                ..
            } => fresh.value,
            _ => {
                warn!(path = remote_path, "re-probe after repair failed, keeping original value");
                original.value
            }
        }
    }

    async fn upload(&self, file: &FileNode, remote_path: &str) -> UploadOutcome {
        info!(file = %file.relative_path, size = file.size, "uploading");
        let op = DriverOp::Upload {
            local_path: file.local_path.clone(),
            remote_parent: parent_of(remote_path),
            size: file.size,
        };
        match self.executor.run(&op).await {
            Ok(_) => {
                info!(file = %file.relative_path, "upload complete");
                UploadOutcome::Uploaded
            }
            Err(e) => {
                warn!(file = %file.relative_path, "upload failed: {}", e);
                UploadOutcome::Failed(e.to_string())
            }
        }
    }
}

/// Stream a file through MD5 in fixed 1 MiB chunks so memory stays bounded
/// for arbitrarily large files.
pub async fn local_md5(path: &Path) -> std::io::Result<String> {
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || hash_file(&path))
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?
}

fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Md5::new();
    let mut buffer = vec![0u8; 1024 * 1024];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}
