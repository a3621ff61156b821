use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::*;

/// Logical tag of a built image. The tag is reused by every build, so an
/// `ImageRef` only describes the tree as of the latest build.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef(pub String);

impl ImageRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A cloned repository pinned to its base commit.
///
/// Not `Clone`: a checkout is handed to exactly one pipeline
/// run, which consumes it, so a partially patched tree cannot be reused.
#[derive(Debug)]
pub struct WorkingCheckout {
    root: PathBuf,
    base_commit: String,
}

impl WorkingCheckout {
    pub fn new(root: impl Into<PathBuf>, base_commit: impl Into<String>) -> Self {
        Self { root: root.into(), base_commit: base_commit.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn base_commit(&self) -> &str {
        &self.base_commit
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub output: String,
    pub elapsed: Duration,
}

impl ExecutionOutcome {
    pub fn passed(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseResult {
    pub phase: Phase,
    pub status: PhaseStatus,
    pub build_succeeded: bool,
    pub exit_code: Option<i32>,
    /// Patch, build and test output for the phase, verbatim.
    pub log: String,
    pub elapsed: Duration,
}

impl PhaseResult {
    pub fn skipped(phase: Phase, reason: SkipReason) -> Self {
        Self {
            phase,
            status: PhaseStatus::skipped(reason),
            build_succeeded: false,
            exit_code: None,
            log: String::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn expectation(&self) -> Expectation {
        match (&self.status, self.phase.expected()) {
            (PhaseStatus::Passed, ExpectedOutcome::Pass) | (PhaseStatus::Failed, ExpectedOutcome::Fail) => {
                Expectation::Met
            }
            (PhaseStatus::Passed, _) | (PhaseStatus::Failed, _) | (PhaseStatus::TimedOut, _) => Expectation::Unmet,
            (PhaseStatus::Skipped { .. }, _) => Expectation::Unattempted,
        }
    }
}
