//! Upload decisions and run orchestration.

pub mod decider;
pub mod reconciler;

pub use decider::{UploadDecider, UploadOutcome};
pub use reconciler::{ExamineReport, Reconciler, RunSummary};
