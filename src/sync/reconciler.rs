//! Top-level run orchestration.
//!
//! Depth-first over the local tree: provision the remote directory, decide
//! every file in it, then recurse into subdirectories, all in sorted name
//! order. Failures are contained at the smallest affected scope — one file
//! or one subtree — so a run always completes and yields a final accounting.

use crate::config::MirrorConfig;
use crate::error::MirrorError;
use crate::remote::driver::DriverTransport;
use crate::remote::executor::RetryingExecutor;
use crate::remote::probe::{MetadataResult, RemoteProbe};
use crate::remote::provision::{DirectoryProvisioner, ProvisionOutcome};
use crate::sync::decider::{UploadDecider, UploadOutcome};
use crate::tree::node::DirNode;
use crate::tree::walker::TreeWalker;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{info, warn};
use walkdir::WalkDir;

/// Final accounting for one mirroring run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub uploaded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Files left untouched because their subtree's provisioning hit a
    /// login failure.
    pub unprocessed: usize,
}

/// Result of a read-only audit pass.
#[derive(Debug, Clone, Default)]
pub struct ExamineReport {
    /// Files probed.
    pub checked: usize,
    /// Relative paths with no usable remote metadata.
    pub missing: Vec<String>,
}

pub struct Reconciler<'a> {
    config: &'a MirrorConfig,
    walker: TreeWalker<'a>,
    probe: RemoteProbe,
    provisioner: DirectoryProvisioner,
    decider: UploadDecider,
}

impl<'a> Reconciler<'a> {
    pub fn new(config: &'a MirrorConfig, transport: Arc<dyn DriverTransport>) -> Self {
        let executor = Arc::new(RetryingExecutor::new(transport, config.retry.clone()));
        let probe = RemoteProbe::new(Arc::clone(&executor));
        Self {
            config,
            walker: TreeWalker::new(config),
            probe: probe.clone(),
            provisioner: DirectoryProvisioner::new(probe.clone(), Arc::clone(&executor)),
            decider: UploadDecider::new(probe, executor),
        }
    }

    /// Mirror the source root onto the destination root.
    pub async fn run(&self) -> Result<RunSummary, MirrorError> {
        let root = self.root_node()?;
        let mut summary = RunSummary::default();
        self.process_dir(&root, &mut summary).await;
        info!(
            uploaded = summary.uploaded,
            skipped = summary.skipped,
            failed = summary.failed,
            unprocessed = summary.unprocessed,
            "run complete"
        );
        Ok(summary)
    }

    /// Read-only audit: probe every file and report which relative paths
    /// have no remote metadata. Issues no mkdir or upload calls.
    pub async fn examine(&self) -> Result<ExamineReport, MirrorError> {
        let root = self.root_node()?;
        let mut report = ExamineReport::default();
        self.examine_dir(&root, &mut report).await;
        info!(
            checked = report.checked,
            missing = report.missing.len(),
            "examine complete"
        );
        Ok(report)
    }

    /// Build the root node, verifying the source root is a listable
    /// directory. This is the only failure that is fatal to a whole run.
    fn root_node(&self) -> Result<DirNode, MirrorError> {
        let src = &self.config.src;
        std::fs::read_dir(src).map_err(|e| MirrorError::LocalIo {
            path: src.clone(),
            source: e,
        })?;
        let name = src
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(DirNode {
            local_path: src.clone(),
            relative_path: String::new(),
            name,
        })
    }

    fn process_dir<'s>(
        &'s self,
        dir: &'s DirNode,
        summary: &'s mut RunSummary,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 's>> {
        Box::pin(async move {
            let remote = dir.remote_path(&self.config.dst);
            info!(dir = %remote, "reconciling directory");

            if self.provisioner.ensure(&remote).await == ProvisionOutcome::NotLoggedIn {
                // Conservative rule: the whole subtree, files in this
                // directory included, counts as unprocessed. Siblings are
                // unaffected.
                let abandoned = self.count_subtree_files(dir);
                warn!(
                    dir = %remote,
                    files = abandoned,
                    "login required; leaving subtree unprocessed"
                );
                summary.unprocessed += abandoned;
                return;
            }

            let listing = match self.walker.children(dir) {
                Ok(listing) => listing,
                Err(e) => {
                    warn!(dir = %dir.relative_path, "unreadable directory, skipping subtree: {}", e);
                    return;
                }
            };

            for file in &listing.files {
                let remote_path = file.remote_path(&self.config.dst);
                match self.decider.decide(file, &remote_path).await {
                    UploadOutcome::Skipped => summary.skipped += 1,
                    UploadOutcome::Uploaded => summary.uploaded += 1,
                    UploadOutcome::Failed(reason) => {
                        warn!(file = %file.relative_path, reason = %reason, "file failed");
                        summary.failed += 1;
                    }
                }
            }

            for sub in &listing.dirs {
                self.process_dir(sub, summary).await;
            }
        })
    }

    fn examine_dir<'s>(
        &'s self,
        dir: &'s DirNode,
        report: &'s mut ExamineReport,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 's>> {
        Box::pin(async move {
            let listing = match self.walker.children(dir) {
                Ok(listing) => listing,
                Err(e) => {
                    warn!(dir = %dir.relative_path, "unreadable directory, skipping subtree: {}", e);
                    return;
                }
            };
            for file in &listing.files {
                let remote_path = file.remote_path(&self.config.dst);
                report.checked += 1;
                match self.probe.query(&remote_path).await {
                    MetadataResult::Present { .. } => {
                        info!(file = %file.relative_path, "mirrored");
                    }
                    MetadataResult::Missing | MetadataResult::NotLoggedIn => {
                        info!(file = %file.relative_path, "not mirrored");
                        report.missing.push(file.relative_path.clone());
                    }
                }
            }
            for sub in &listing.dirs {
                self.examine_dir(sub, report).await;
            }
        })
    }

    /// Count files under `dir` (itself included) that would have been
    /// processed, honoring the name filters.
    fn count_subtree_files(&self, dir: &DirNode) -> usize {
        WalkDir::new(&dir.local_path)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                self.walker
                    .file_passes(&entry.file_name().to_string_lossy())
            })
            .count()
    }
}
