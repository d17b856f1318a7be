//! Local filesystem node types and remote path derivation.
//!
//! Nodes are plain values: building one performs no remote calls. They are
//! created fresh per traversal and discarded after processing, so remote
//! state is re-probed from scratch on every run.

use std::path::PathBuf;

/// A local file queued for an upload decision.
#[derive(Debug, Clone)]
pub struct FileNode {
    pub local_path: PathBuf,
    /// `/`-separated path relative to the source root; empty at the root.
    pub relative_path: String,
    pub name: String,
    pub size: u64,
}

/// A local directory queued for provisioning and descent.
#[derive(Debug, Clone)]
pub struct DirNode {
    pub local_path: PathBuf,
    pub relative_path: String,
    pub name: String,
}

/// Local node representation.
#[derive(Debug, Clone)]
pub enum LocalNode {
    File(FileNode),
    Directory(DirNode),
}

impl FileNode {
    pub fn remote_path(&self, dst_root: &str) -> String {
        join_remote(dst_root, &self.relative_path)
    }
}

impl DirNode {
    pub fn remote_path(&self, dst_root: &str) -> String {
        join_remote(dst_root, &self.relative_path)
    }
}

/// Join a remote root and a relative path with a single `/`, deterministically.
///
/// An empty relative path maps to the root itself.
pub fn join_remote(dst_root: &str, relative: &str) -> String {
    let relative = relative.trim_start_matches('/');
    if relative.is_empty() {
        return dst_root.to_string();
    }
    if dst_root.is_empty() {
        return relative.to_string();
    }
    format!("{}/{}", dst_root.trim_end_matches('/'), relative)
}

/// Parent of a `/`-separated remote path. The namespace root is its own
/// parent, which is what bottoms out the provisioning recursion.
pub fn parent_of(remote_path: &str) -> String {
    match remote_path.trim_end_matches('/').rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => remote_path[..idx].to_string(),
        None => remote_path.to_string(),
    }
}
