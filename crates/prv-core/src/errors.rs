use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// A bounded command ran past its wall-clock limit and was killed.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("`{command}` timed out after {}s", .limit.as_secs())]
pub struct TimeoutError {
    pub command: String,
    pub limit: Duration,
    /// Whatever the command wrote before it was killed.
    pub output: String,
}

#[derive(Debug, Error)]
pub enum PatchApplyError {
    #[error("patch file not found: {}", .path.display())]
    Missing { path: PathBuf },
    #[error("patch does not apply to the current tree: {reason}")]
    Conflict { reason: String },
    #[error("patch tool failed: {reason}")]
    Tool { reason: String },
    #[error(transparent)]
    TimedOut(#[from] TimeoutError),
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("build recipe not found: {}", .path.display())]
    RecipeMissing { path: PathBuf },
    #[error("build recipe does not use the accepted base image {expected} (found: {})", .found.join(", "))]
    WrongBaseImage { expected: String, found: Vec<String> },
    #[error("image build failed\n{log}")]
    BuildFailed { log: String },
    #[error(transparent)]
    TimedOut(#[from] TimeoutError),
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    TimedOut(#[from] TimeoutError),
    #[error("could not launch test container: {reason}")]
    Launch { reason: String },
}

/// Failure to produce a pinned checkout. Fatal to a review run.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("failed to prepare work directory {}: {reason}", .path.display())]
    Workdir { path: PathBuf, reason: String },
    #[error("git clone {url} failed: {reason}")]
    Clone { url: String, reason: String },
    #[error("git checkout {commit} failed: {reason}")]
    Checkout { commit: String, reason: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReportError {
    #[error("phase {got} recorded out of order (expected {expected:?})")]
    OutOfOrder {
        expected: Option<crate::Phase>,
        got: crate::Phase,
    },
    #[error("phase {phase} must be skipped once an earlier phase aborted")]
    RecordedAfterAbort { phase: crate::Phase },
}
