use std::time::{Duration, Instant};

use prv_container::{ImageBuilder, TestExecutor};
use prv_core::{
    BuildError, ImageRef, PatchApplyError, PatchKind, Phase, PhaseResult, PhaseStatus, ReportError, RunError,
    SkipReason, VerificationReport, WorkingCheckout,
};
use prv_vcs::{Patch, PatchApplier};
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Limit for each test run.
    pub timeout: Duration,
    pub rebuild_final_phase: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(300), rebuild_final_phase: true }
    }
}

/// The package's patches as read from disk; `None` when the file is absent.
#[derive(Clone, Debug, Default)]
pub struct PipelinePatches {
    pub test: Option<Patch>,
    pub solution: Option<Patch>,
}

impl PipelinePatches {
    pub fn get(&self, kind: PatchKind) -> Option<&Patch> {
        match kind {
            PatchKind::Test => self.test.as_ref(),
            PatchKind::Solution => self.solution.as_ref(),
        }
    }
}

/// Drives the four phases over a single checkout.
///
/// Patches accumulate: the test patch stays applied once phase 2 applies it,
/// and the solution lands on top of it in phase 3. A phase that is skipped or
/// times out ends the run; every later phase is recorded as skipped.
pub struct VerificationPipeline<'a> {
    patches: &'a dyn PatchApplier,
    builder: &'a dyn ImageBuilder,
    executor: &'a dyn TestExecutor,
    settings: PipelineSettings,
}

impl<'a> VerificationPipeline<'a> {
    pub fn new(
        patches: &'a dyn PatchApplier,
        builder: &'a dyn ImageBuilder,
        executor: &'a dyn TestExecutor,
        settings: PipelineSettings,
    ) -> Self {
        Self { patches, builder, executor, settings }
    }

    pub fn run(&self, mut checkout: WorkingCheckout, inputs: &PipelinePatches) -> Result<VerificationReport, ReportError> {
        let mut report = VerificationReport::new();
        let mut image: Option<ImageRef> = None;
        for phase in Phase::ALL {
            let result = match report.aborted_at() {
                Some(aborted) => PhaseResult::skipped(phase, SkipReason::PriorPhaseAborted { phase: aborted }),
                None => self.run_phase(phase, &mut checkout, inputs, &mut image),
            };
            info!(
                phase = %phase,
                status = result.status.label(),
                exit_code = ?result.exit_code,
                elapsed_ms = result.elapsed.as_millis() as u64,
                "phase finished"
            );
            report = report.record(result)?;
        }
        Ok(report)
    }

    fn run_phase(
        &self,
        phase: Phase,
        checkout: &mut WorkingCheckout,
        inputs: &PipelinePatches,
        image: &mut Option<ImageRef>,
    ) -> PhaseResult {
        let mut run = PhaseRun::start(phase);

        if let Some(kind) = phase.patch() {
            let Some(patch) = inputs.get(kind) else {
                run.note(&format!("{} not provided", kind.file_name()));
                return run.skip(SkipReason::PatchMissing { patch: kind });
            };
            match self.patches.apply(patch, checkout) {
                Ok(()) => run.note(&format!("applied {}", kind.file_name())),
                Err(e) => {
                    warn!(phase = %phase, patch = kind.file_name(), error = %e, "patch not applied");
                    if let PatchApplyError::TimedOut(t) = &e {
                        run.note(&t.output);
                    }
                    run.note(&e.to_string());
                    return match e {
                        PatchApplyError::TimedOut(_) => run.finish(PhaseStatus::TimedOut),
                        PatchApplyError::Missing { .. } => run.skip(SkipReason::PatchMissing { patch: kind }),
                        PatchApplyError::Conflict { .. } | PatchApplyError::Tool { .. } => {
                            run.skip(SkipReason::PatchRejected { patch: kind })
                        }
                    };
                }
            }
        }

        // The tree is unchanged between phases 3 and 4, so the final build may
        // be skipped and the previous image reused.
        let reuse = (phase == Phase::NewWithSolution && !self.settings.rebuild_final_phase)
            .then(|| image.clone())
            .flatten();
        let built = match reuse {
            Some(previous) => {
                run.note(&format!("reusing image {}", previous.as_str()));
                previous
            }
            None => match self.builder.build(checkout) {
                Ok(built) => {
                    *image = Some(built.clone());
                    built
                }
                Err(e) => {
                    warn!(phase = %phase, error = %e, "image build did not succeed");
                    return run.build_failed(e);
                }
            },
        };
        run.build_succeeded = true;

        match self.executor.run(&built, phase.mode(), self.settings.timeout) {
            Ok(outcome) => {
                run.note(&outcome.output);
                run.exit_code = outcome.exit_code;
                run.finish(if outcome.passed() { PhaseStatus::Passed } else { PhaseStatus::Failed })
            }
            Err(RunError::TimedOut(t)) => {
                run.note(&t.output);
                run.note(&t.to_string());
                run.finish(PhaseStatus::TimedOut)
            }
            Err(e @ RunError::Launch { .. }) => {
                run.note(&e.to_string());
                run.skip(SkipReason::RunnerUnavailable)
            }
        }
    }
}

struct PhaseRun {
    phase: Phase,
    started: Instant,
    log: String,
    build_succeeded: bool,
    exit_code: Option<i32>,
}

impl PhaseRun {
    fn start(phase: Phase) -> Self {
        Self { phase, started: Instant::now(), log: String::new(), build_succeeded: false, exit_code: None }
    }

    fn note(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.log.push_str(text);
        if !text.ends_with('\n') {
            self.log.push('\n');
        }
    }

    fn build_failed(mut self, err: BuildError) -> PhaseResult {
        let status = match &err {
            BuildError::RecipeMissing { .. } => PhaseStatus::skipped(SkipReason::RecipeMissing),
            BuildError::WrongBaseImage { .. } => PhaseStatus::skipped(SkipReason::WrongBaseImage),
            BuildError::BuildFailed { .. } => PhaseStatus::skipped(SkipReason::BuildFailed),
            BuildError::TimedOut(t) => {
                self.note(&t.output);
                PhaseStatus::TimedOut
            }
        };
        self.note(&err.to_string());
        self.finish(status)
    }

    fn skip(self, reason: SkipReason) -> PhaseResult {
        self.finish(PhaseStatus::skipped(reason))
    }

    fn finish(self, status: PhaseStatus) -> PhaseResult {
        PhaseResult {
            phase: self.phase,
            status,
            build_succeeded: self.build_succeeded,
            exit_code: self.exit_code,
            log: self.log,
            elapsed: self.started.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prv_core::{ExecutionOutcome, TestMode, TimeoutError};
    use std::sync::Mutex;

    /// Applies nothing; fails for the kinds listed in `reject` and times out
    /// for those in `hang`.
    struct FakeApplier {
        reject: Vec<PatchKind>,
        hang: Vec<PatchKind>,
        applied: Mutex<Vec<PatchKind>>,
    }

    impl FakeApplier {
        fn accepting() -> Self {
            Self { reject: vec![], hang: vec![], applied: Mutex::new(vec![]) }
        }
    }

    impl PatchApplier for FakeApplier {
        fn check(&self, patch: &Patch, _checkout: &WorkingCheckout) -> bool {
            !self.reject.contains(&patch.kind())
        }

        fn apply(&self, patch: &Patch, _checkout: &mut WorkingCheckout) -> Result<(), PatchApplyError> {
            if self.reject.contains(&patch.kind()) {
                return Err(PatchApplyError::Conflict { reason: "hunk #1 failed".into() });
            }
            if self.hang.contains(&patch.kind()) {
                return Err(PatchApplyError::TimedOut(TimeoutError {
                    command: "git apply -".into(),
                    limit: Duration::from_secs(1),
                    output: "checking patch...\n".into(),
                }));
            }
            self.applied.lock().unwrap().push(patch.kind());
            Ok(())
        }
    }

    /// Counts builds; the nth build (0-based) fails with the given error.
    struct FakeBuilder {
        calls: Mutex<usize>,
        fail_at: Mutex<Option<(usize, BuildError)>>,
    }

    impl FakeBuilder {
        fn ok() -> Self {
            Self { calls: Mutex::new(0), fail_at: Mutex::new(None) }
        }

        fn failing_at(n: usize, err: BuildError) -> Self {
            Self { calls: Mutex::new(0), fail_at: Mutex::new(Some((n, err))) }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    impl ImageBuilder for FakeBuilder {
        fn build(&self, _checkout: &WorkingCheckout) -> Result<ImageRef, BuildError> {
            let mut calls = self.calls.lock().unwrap();
            let n = *calls;
            *calls += 1;
            let mut fail_at = self.fail_at.lock().unwrap();
            match fail_at.take() {
                Some((at, err)) if at == n => Err(err),
                other => {
                    *fail_at = other;
                    Ok(ImageRef("problem-review-test".into()))
                }
            }
        }
    }

    /// Returns scripted results per call, in order.
    struct FakeExecutor {
        script: Mutex<Vec<Result<i32, RunError>>>,
        modes: Mutex<Vec<TestMode>>,
    }

    impl FakeExecutor {
        fn codes(codes: &[i32]) -> Self {
            Self::scripted(codes.iter().map(|c| Ok(*c)).collect())
        }

        fn scripted(mut script: Vec<Result<i32, RunError>>) -> Self {
            script.reverse();
            Self { script: Mutex::new(script), modes: Mutex::new(vec![]) }
        }
    }

    impl TestExecutor for FakeExecutor {
        fn run(&self, _image: &ImageRef, mode: TestMode, _timeout: Duration) -> Result<ExecutionOutcome, RunError> {
            self.modes.lock().unwrap().push(mode);
            let code = self.script.lock().unwrap().pop().unwrap_or(Ok(0))?;
            Ok(ExecutionOutcome { exit_code: Some(code), output: format!("tests exited {code}\n"), elapsed: Duration::ZERO })
        }
    }

    fn both_patches() -> PipelinePatches {
        PipelinePatches {
            test: Some(Patch::from_bytes(PatchKind::Test, "test.patch", b"t".to_vec())),
            solution: Some(Patch::from_bytes(PatchKind::Solution, "solution.patch", b"s".to_vec())),
        }
    }

    fn checkout() -> WorkingCheckout {
        WorkingCheckout::new("/nonexistent/checkout", "abc123")
    }

    fn statuses(report: &VerificationReport) -> Vec<&'static str> {
        report.phases().iter().map(|r| r.status.label()).collect()
    }

    fn run(
        applier: &FakeApplier,
        builder: &FakeBuilder,
        executor: &FakeExecutor,
        patches: &PipelinePatches,
        settings: PipelineSettings,
    ) -> VerificationReport {
        VerificationPipeline::new(applier, builder, executor, settings).run(checkout(), patches).unwrap()
    }

    #[test]
    fn well_formed_package_meets_every_expectation() {
        let (applier, builder, executor) = (FakeApplier::accepting(), FakeBuilder::ok(), FakeExecutor::codes(&[0, 1, 0, 0]));
        let report = run(&applier, &builder, &executor, &both_patches(), PipelineSettings::default());
        assert_eq!(statuses(&report), ["PASSED", "FAILED", "PASSED", "PASSED"]);
        assert!(report.all_expectations_met());
        assert_eq!(builder.calls(), 4);
        assert_eq!(*applier.applied.lock().unwrap(), [PatchKind::Test, PatchKind::Solution]);
        assert_eq!(*executor.modes.lock().unwrap(), [TestMode::Base, TestMode::New, TestMode::Base, TestMode::New]);
    }

    #[test]
    fn test_failures_do_not_stop_later_phases() {
        let (applier, builder, executor) = (FakeApplier::accepting(), FakeBuilder::ok(), FakeExecutor::codes(&[1, 1, 1, 0]));
        let report = run(&applier, &builder, &executor, &both_patches(), PipelineSettings::default());
        assert_eq!(statuses(&report), ["FAILED", "FAILED", "FAILED", "PASSED"]);
        assert!(!report.base_only_pass());
        assert!(!report.solution_base_pass());
        assert!(report.solution_new_pass());
    }

    #[test]
    fn final_build_can_reuse_previous_image() {
        let (applier, builder, executor) = (FakeApplier::accepting(), FakeBuilder::ok(), FakeExecutor::codes(&[0, 1, 0, 0]));
        let settings = PipelineSettings { rebuild_final_phase: false, ..PipelineSettings::default() };
        let report = run(&applier, &builder, &executor, &both_patches(), settings);
        assert!(report.all_expectations_met());
        assert_eq!(builder.calls(), 3);
        assert!(report.phase(Phase::NewWithSolution).unwrap().log.contains("reusing image"));
    }

    #[test]
    fn missing_solution_skips_last_two_phases() {
        let (applier, builder, executor) = (FakeApplier::accepting(), FakeBuilder::ok(), FakeExecutor::codes(&[0, 1]));
        let patches = PipelinePatches { solution: None, ..both_patches() };
        let report = run(&applier, &builder, &executor, &patches, PipelineSettings::default());
        assert_eq!(statuses(&report), ["PASSED", "FAILED", "SKIPPED", "SKIPPED"]);
        assert_eq!(
            report.phase(Phase::BaseWithSolution).unwrap().status,
            PhaseStatus::skipped(SkipReason::PatchMissing { patch: PatchKind::Solution })
        );
        assert_eq!(
            report.phase(Phase::NewWithSolution).unwrap().status,
            PhaseStatus::skipped(SkipReason::PriorPhaseAborted { phase: Phase::BaseWithSolution })
        );
        assert!(report.phase(Phase::BaseWithSolution).unwrap().log.contains("solution.patch not provided"));
        assert_eq!(builder.calls(), 2);
    }

    #[test]
    fn rejected_test_patch_aborts_before_building() {
        let applier = FakeApplier { reject: vec![PatchKind::Test], ..FakeApplier::accepting() };
        let (builder, executor) = (FakeBuilder::ok(), FakeExecutor::codes(&[0]));
        let report = run(&applier, &builder, &executor, &both_patches(), PipelineSettings::default());
        assert_eq!(statuses(&report), ["PASSED", "SKIPPED", "SKIPPED", "SKIPPED"]);
        let phase2 = report.phase(Phase::NewWithoutSolution).unwrap();
        assert_eq!(phase2.status, PhaseStatus::skipped(SkipReason::PatchRejected { patch: PatchKind::Test }));
        assert!(phase2.log.contains("hunk #1 failed"));
        assert!(!phase2.build_succeeded);
        assert_eq!(builder.calls(), 1);
    }

    #[test]
    fn wrong_base_image_skips_everything() {
        let builder = FakeBuilder::failing_at(
            0,
            BuildError::WrongBaseImage { expected: "mars-base".into(), found: vec!["ubuntu".into()] },
        );
        let (applier, executor) = (FakeApplier::accepting(), FakeExecutor::codes(&[]));
        let report = run(&applier, &builder, &executor, &both_patches(), PipelineSettings::default());
        assert_eq!(statuses(&report), ["SKIPPED"; 4]);
        assert_eq!(report.aborted_at(), Some(Phase::BaseOnly));
        assert!(report.phase(Phase::BaseOnly).unwrap().log.contains("mars-base"));
        assert!(executor.modes.lock().unwrap().is_empty());
        assert!(applier.applied.lock().unwrap().is_empty());
    }

    #[test]
    fn build_failure_in_second_phase_keeps_first_result() {
        let builder = FakeBuilder::failing_at(1, BuildError::BuildFailed { log: "step 3/7 failed".into() });
        let (applier, executor) = (FakeApplier::accepting(), FakeExecutor::codes(&[0]));
        let report = run(&applier, &builder, &executor, &both_patches(), PipelineSettings::default());
        assert_eq!(statuses(&report), ["PASSED", "SKIPPED", "SKIPPED", "SKIPPED"]);
        assert!(report.base_only_pass());
        assert!(!report.new_only_fail());
        assert!(report.phase(Phase::NewWithoutSolution).unwrap().log.contains("step 3/7 failed"));
    }

    #[test]
    fn hung_tests_time_out_and_abort() {
        let timeout = TimeoutError { command: "docker run".into(), limit: Duration::from_secs(1), output: "waiting...\n".into() };
        let executor = FakeExecutor::scripted(vec![Ok(0), Err(RunError::TimedOut(timeout))]);
        let (applier, builder) = (FakeApplier::accepting(), FakeBuilder::ok());
        let report = run(&applier, &builder, &executor, &both_patches(), PipelineSettings::default());
        assert_eq!(statuses(&report), ["PASSED", "TIMED_OUT", "SKIPPED", "SKIPPED"]);
        let phase2 = report.phase(Phase::NewWithoutSolution).unwrap();
        assert!(phase2.build_succeeded);
        assert_eq!(phase2.exit_code, None);
        assert!(phase2.log.contains("waiting..."));
        assert!(!report.new_only_fail());
    }

    #[test]
    fn launch_failure_is_not_a_test_failure() {
        let executor = FakeExecutor::scripted(vec![Err(RunError::Launch { reason: "exit Some(125): Unable to find image".into() })]);
        let (applier, builder) = (FakeApplier::accepting(), FakeBuilder::ok());
        let report = run(&applier, &builder, &executor, &both_patches(), PipelineSettings::default());
        assert_eq!(report.phase(Phase::BaseOnly).unwrap().status, PhaseStatus::skipped(SkipReason::RunnerUnavailable));
        assert_eq!(statuses(&report), ["SKIPPED"; 4]);
    }

    #[test]
    fn hung_patch_apply_times_out_instead_of_rejecting() {
        let applier = FakeApplier { hang: vec![PatchKind::Solution], ..FakeApplier::accepting() };
        let (builder, executor) = (FakeBuilder::ok(), FakeExecutor::codes(&[0, 1]));
        let report = run(&applier, &builder, &executor, &both_patches(), PipelineSettings::default());
        assert_eq!(statuses(&report), ["PASSED", "FAILED", "TIMED_OUT", "SKIPPED"]);
        let phase3 = report.phase(Phase::BaseWithSolution).unwrap();
        assert!(!phase3.build_succeeded);
        assert!(phase3.log.contains("checking patch..."));
        assert!(phase3.log.contains("timed out"));
        assert_eq!(report.aborted_at(), Some(Phase::BaseWithSolution));
        assert_eq!(builder.calls(), 2);
    }
}
