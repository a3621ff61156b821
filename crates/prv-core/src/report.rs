use serde::{Deserialize, Serialize};

use crate::{Expectation, Phase, PhaseResult, ReportError, SkipReason};

/// Ordered, append-only record of the verification phases.
///
/// `record` consumes the report and hands back a new one, so a phase result
/// is never changed after it is appended. Two invariants are enforced on
/// every append: phases arrive in `Phase::ALL` order, and once a phase
/// aborts, every later phase is skipped.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    phases: Vec<PhaseResult>,
}

/// The four booleans reviewers look at. `true` only when the phase ran and
/// reached its expected state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub base_only_pass: bool,
    pub new_only_fail: bool,
    pub solution_base_pass: bool,
    pub solution_new_pass: bool,
}

impl VerificationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report for a run whose pipeline never started.
    pub fn skipped_all(reason: SkipReason) -> Self {
        Self {
            phases: Phase::ALL.iter().map(|p| PhaseResult::skipped(*p, reason.clone())).collect(),
        }
    }

    pub fn record(mut self, result: PhaseResult) -> Result<Self, ReportError> {
        let expected = self.next_phase();
        if expected != Some(result.phase) {
            return Err(ReportError::OutOfOrder { expected, got: result.phase });
        }
        if self.aborted_at().is_some() && !matches!(result.status, crate::PhaseStatus::Skipped { .. }) {
            return Err(ReportError::RecordedAfterAbort { phase: result.phase });
        }
        self.phases.push(result);
        Ok(self)
    }

    pub fn next_phase(&self) -> Option<Phase> {
        match self.phases.last() {
            None => Some(Phase::BaseOnly),
            Some(last) => last.phase.next(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.next_phase().is_none()
    }

    /// First phase that left the checkout unusable, if any.
    pub fn aborted_at(&self) -> Option<Phase> {
        self.phases.iter().find(|r| r.status.aborts_pipeline()).map(|r| r.phase)
    }

    pub fn phases(&self) -> &[PhaseResult] {
        &self.phases
    }

    pub fn phase(&self, phase: Phase) -> Option<&PhaseResult> {
        self.phases.iter().find(|r| r.phase == phase)
    }

    pub fn expectation(&self, phase: Phase) -> Expectation {
        self.phase(phase).map(PhaseResult::expectation).unwrap_or(Expectation::Unattempted)
    }

    pub fn base_only_pass(&self) -> bool {
        self.expectation(Phase::BaseOnly).is_met()
    }

    pub fn new_only_fail(&self) -> bool {
        self.expectation(Phase::NewWithoutSolution).is_met()
    }

    pub fn solution_base_pass(&self) -> bool {
        self.expectation(Phase::BaseWithSolution).is_met()
    }

    pub fn solution_new_pass(&self) -> bool {
        self.expectation(Phase::NewWithSolution).is_met()
    }

    pub fn all_expectations_met(&self) -> bool {
        Phase::ALL.iter().all(|p| self.expectation(*p).is_met())
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            base_only_pass: self.base_only_pass(),
            new_only_fail: self.new_only_fail(),
            solution_base_pass: self.solution_base_pass(),
            solution_new_pass: self.solution_new_pass(),
        }
    }
}
