//! Netmirror: One-Directional Remote Tree Mirroring
//!
//! Incrementally mirrors a local directory tree onto a remote namespace that
//! is reachable only through an external command-line driver. The driver
//! exposes four primitives (`meta`, `mkdir`, `upload`, `fixmd5`); everything
//! else — reconciliation, directory provisioning, timeout and retry handling,
//! checksum comparison — lives here. The local tree is always authoritative;
//! remote-only content is never touched.

pub mod config;
pub mod error;
pub mod logging;
pub mod remote;
pub mod sync;
pub mod tree;
