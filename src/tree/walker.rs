//! Single-level directory listing with name filters and deterministic order.
//!
//! The walker lists one directory at a time so the reconciler can provision
//! the remote directory before anything beneath it is touched. Filters apply
//! to file names only; directories are always traversed.

use crate::config::MirrorConfig;
use crate::error::MirrorError;
use crate::tree::node::{DirNode, FileNode};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// One directory level: files and subdirectories, each sorted by name.
#[derive(Debug, Default)]
pub struct DirListing {
    pub files: Vec<FileNode>,
    pub dirs: Vec<DirNode>,
}

pub struct TreeWalker<'a> {
    config: &'a MirrorConfig,
}

impl<'a> TreeWalker<'a> {
    pub fn new(config: &'a MirrorConfig) -> Self {
        Self { config }
    }

    /// List the immediate children of `dir`, filtered and sorted.
    ///
    /// An unreadable entry inside the directory is logged and skipped; only
    /// failure to read the directory itself is an error, which the caller
    /// treats as fatal for the root and as branch-contained elsewhere.
    pub fn children(&self, dir: &DirNode) -> Result<DirListing, MirrorError> {
        // Listing errors for the directory itself surface through the first
        // iterator item; walkdir yields per-entry errors after that.
        std::fs::read_dir(&dir.local_path).map_err(|e| MirrorError::LocalIo {
            path: dir.local_path.clone(),
            source: e,
        })?;

        let mut listing = DirListing::default();
        for entry in WalkDir::new(&dir.local_path)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(dir = %dir.relative_path, "skipping unreadable entry: {}", e);
                    continue;
                }
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            let relative = if dir.relative_path.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", dir.relative_path, name)
            };
            if entry.file_type().is_dir() {
                listing.dirs.push(DirNode {
                    local_path: entry.path().to_path_buf(),
                    relative_path: relative,
                    name,
                });
            } else {
                if !self.file_passes(&name) {
                    continue;
                }
                let size = match entry.metadata() {
                    Ok(meta) => meta.len(),
                    Err(e) => {
                        warn!(file = %relative, "skipping file with unreadable metadata: {}", e);
                        continue;
                    }
                };
                listing.files.push(FileNode {
                    local_path: entry.path().to_path_buf(),
                    relative_path: relative,
                    name,
                    size,
                });
            }
        }

        listing.files.sort_by(|a, b| a.name.cmp(&b.name));
        listing.dirs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(listing)
    }

    /// Name filter for files. The ignore pattern wins over the include
    /// pattern; a configured include pattern restricts to matches.
    pub fn file_passes(&self, name: &str) -> bool {
        if let Some(ignore) = &self.config.ignore {
            if ignore.is_match(name) {
                debug!(file = name, "excluded by ignore pattern");
                return false;
            }
        }
        if let Some(include) = &self.config.include {
            if !include.is_match(name) {
                debug!(file = name, "not matched by include pattern");
                return false;
            }
        }
        true
    }
}
