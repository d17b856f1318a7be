//! Error types for the mirroring engine.
//!
//! Failures are contained at the smallest affected scope: a malformed driver
//! response degrades to "missing" inside the probe, a timed-out upload fails
//! one file, a login failure during provisioning aborts one subtree. Only an
//! unreadable source root aborts a whole run, so `MirrorError` stays small.

use std::path::PathBuf;
use thiserror::Error;

/// Run-level errors.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// Invalid configuration (bad filter regex, missing roots, bad log setup).
    #[error("configuration error: {0}")]
    Config(String),

    /// Local filesystem failure. Fatal for the run only when `path` is the
    /// source root itself; elsewhere it is contained per file or subtree.
    #[error("local I/O error on {path}: {source}")]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
