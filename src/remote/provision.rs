//! On-demand remote directory provisioning.
//!
//! Ensures a remote directory and its whole ancestor chain exist before
//! anything is placed under it. There is no separate pre-pass: visiting any
//! leaf triggers top-down ancestor creation. Parent confirmation or creation
//! strictly precedes the child's mkdir, since the driver's `mkdir` requires
//! the parent to exist.

use crate::remote::driver::DriverOp;
use crate::remote::executor::RetryingExecutor;
use crate::remote::probe::{MetadataResult, RemoteProbe};
use crate::tree::node::parent_of;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of ensuring one remote directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Ready,
    /// Session expired. Branch-fatal: the caller abandons the subtree, but
    /// sibling branches and the run itself continue.
    NotLoggedIn,
}

pub struct DirectoryProvisioner {
    probe: RemoteProbe,
    executor: Arc<RetryingExecutor>,
    /// Paths confirmed Present (or created) during this run. A chain
    /// confirmed here is never re-queried, and duplicate ensures are no-ops.
    confirmed: Mutex<HashSet<String>>,
}

impl DirectoryProvisioner {
    pub fn new(probe: RemoteProbe, executor: Arc<RetryingExecutor>) -> Self {
        Self {
            probe,
            executor,
            confirmed: Mutex::new(HashSet::new()),
        }
    }

    /// Make `remote_path` exist, creating missing ancestors top-down.
    pub fn ensure<'a>(
        &'a self,
        remote_path: &'a str,
    ) -> Pin<Box<dyn Future<Output = ProvisionOutcome> + Send + 'a>> {
        Box::pin(async move {
            if self.is_confirmed(remote_path) {
                return ProvisionOutcome::Ready;
            }

            let parent = parent_of(remote_path);
            // The namespace root is its own parent; probe it directly.
            if parent != remote_path && !self.is_confirmed(&parent) {
                match self.probe.query(&parent).await {
                    MetadataResult::NotLoggedIn => {
                        error!(path = remote_path, "login required while provisioning parent");
                        return ProvisionOutcome::NotLoggedIn;
                    }
                    MetadataResult::Missing => {
                        if self.ensure(&parent).await == ProvisionOutcome::NotLoggedIn {
                            return ProvisionOutcome::NotLoggedIn;
                        }
                        // Parent chain is in place now; the path itself
                        // cannot exist yet, so create it directly.
                        self.mkdir(remote_path).await;
                        self.confirm(remote_path);
                        return ProvisionOutcome::Ready;
                    }
                    MetadataResult::Present { .. } => {
                        self.confirm(&parent);
                    }
                }
            }

            match self.probe.query(remote_path).await {
                MetadataResult::NotLoggedIn => {
                    error!(path = remote_path, "login required while provisioning");
                    ProvisionOutcome::NotLoggedIn
                }
                MetadataResult::Missing => {
                    self.mkdir(remote_path).await;
                    self.confirm(remote_path);
                    ProvisionOutcome::Ready
                }
                MetadataResult::Present { .. } => {
                    debug!(path = remote_path, "remote directory already present");
                    self.confirm(remote_path);
                    ProvisionOutcome::Ready
                }
            }
        })
    }

    async fn mkdir(&self, remote_path: &str) {
        info!(path = remote_path, "creating remote directory");
        // A failed mkdir is not escalated here: uploads beneath it will fail
        // and be accounted per file, which keeps the damage to one branch.
        if let Err(e) = self
            .executor
            .run(&DriverOp::Mkdir(remote_path.to_string()))
            .await
        {
            warn!(path = remote_path, "mkdir failed: {}", e);
        }
    }

    fn is_confirmed(&self, remote_path: &str) -> bool {
        self.confirmed.lock().contains(remote_path)
    }

    fn confirm(&self, remote_path: &str) {
        self.confirmed.lock().insert(remote_path.to_string());
    }
}
