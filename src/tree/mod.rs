//! Local tree model and traversal.

pub mod node;
pub mod walker;

pub use node::{join_remote, parent_of, DirNode, FileNode, LocalNode};
pub use walker::{DirListing, TreeWalker};
