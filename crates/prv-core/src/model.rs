use serde::{Deserialize, Serialize};

/// The four verification phases, in the only order they may run.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    BaseOnly,
    NewWithoutSolution,
    BaseWithSolution,
    NewWithSolution,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::BaseOnly,
        Phase::NewWithoutSolution,
        Phase::BaseWithSolution,
        Phase::NewWithSolution,
    ];

    pub fn index(self) -> usize {
        match self {
            Phase::BaseOnly => 0,
            Phase::NewWithoutSolution => 1,
            Phase::BaseWithSolution => 2,
            Phase::NewWithSolution => 3,
        }
    }

    pub fn next(self) -> Option<Phase> {
        Phase::ALL.get(self.index() + 1).copied()
    }

    /// Test mode handed to the in-image entry point.
    pub fn mode(self) -> TestMode {
        match self {
            Phase::BaseOnly | Phase::BaseWithSolution => TestMode::Base,
            Phase::NewWithoutSolution | Phase::NewWithSolution => TestMode::New,
        }
    }

    /// New tests must fail before the solution lands; everything else must pass.
    pub fn expected(self) -> ExpectedOutcome {
        match self {
            Phase::NewWithoutSolution => ExpectedOutcome::Fail,
            _ => ExpectedOutcome::Pass,
        }
    }

    /// Patch applied on entry to this phase, if any.
    pub fn patch(self) -> Option<PatchKind> {
        match self {
            Phase::NewWithoutSolution => Some(PatchKind::Test),
            Phase::BaseWithSolution => Some(PatchKind::Solution),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::BaseOnly => "base_only",
            Phase::NewWithoutSolution => "new_without_solution",
            Phase::BaseWithSolution => "base_with_solution",
            Phase::NewWithSolution => "new_with_solution",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TestMode {
    Base,
    New,
}

impl TestMode {
    pub fn as_arg(self) -> &'static str {
        match self {
            TestMode::Base => "base",
            TestMode::New => "new",
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExpectedOutcome {
    Pass,
    Fail,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PatchKind {
    Test,
    Solution,
}

impl PatchKind {
    pub fn file_name(self) -> &'static str {
        match self {
            PatchKind::Test => "test.patch",
            PatchKind::Solution => "solution.patch",
        }
    }
}

/// Why a phase did not produce a test verdict.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SkipReason {
    PatchMissing { patch: PatchKind },
    PatchRejected { patch: PatchKind },
    RecipeMissing,
    WrongBaseImage,
    BuildFailed,
    RunnerUnavailable,
    PriorPhaseAborted { phase: Phase },
    VerificationDisabled,
    RepositoryUnknown,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum PhaseStatus {
    Passed,
    Failed,
    Skipped { reason: SkipReason },
    TimedOut,
}

impl PhaseStatus {
    pub fn skipped(reason: SkipReason) -> Self {
        PhaseStatus::Skipped { reason }
    }

    /// A phase that did not run its tests to completion leaves the checkout
    /// in a state later phases must not build on.
    pub fn aborts_pipeline(&self) -> bool {
        matches!(self, PhaseStatus::Skipped { .. } | PhaseStatus::TimedOut)
    }

    pub fn label(&self) -> &'static str {
        match self {
            PhaseStatus::Passed => "PASSED",
            PhaseStatus::Failed => "FAILED",
            PhaseStatus::Skipped { .. } => "SKIPPED",
            PhaseStatus::TimedOut => "TIMED_OUT",
        }
    }
}

/// Whether a phase reached the state the review expects of it.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    Met,
    Unmet,
    Unattempted,
}

impl Expectation {
    pub fn is_met(self) -> bool {
        self == Expectation::Met
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Accept,
    RequestChange,
    Reject,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Accept => "ACCEPT",
            Verdict::RequestChange => "REQUEST_CHANGE",
            Verdict::Reject => "REJECT",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_walk_in_order() {
        let mut seen = vec![Phase::BaseOnly];
        while let Some(next) = seen.last().and_then(|p| p.next()) {
            seen.push(next);
        }
        assert_eq!(seen, Phase::ALL.to_vec());
    }

    #[test]
    fn only_new_without_solution_expects_failure() {
        for phase in Phase::ALL {
            let want = if phase == Phase::NewWithoutSolution {
                ExpectedOutcome::Fail
            } else {
                ExpectedOutcome::Pass
            };
            assert_eq!(phase.expected(), want, "{phase}");
        }
    }

    #[test]
    fn skipped_and_timed_out_abort() {
        assert!(PhaseStatus::TimedOut.aborts_pipeline());
        assert!(PhaseStatus::skipped(SkipReason::BuildFailed).aborts_pipeline());
        assert!(!PhaseStatus::Passed.aborts_pipeline());
        assert!(!PhaseStatus::Failed.aborts_pipeline());
    }
}
