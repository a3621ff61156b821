use std::time::Duration;

use prv_core::{
    ContainerName, Expectation, ExecutionOutcome, Phase, PhaseResult, PhaseStatus, PatchKind, RunId, SkipReason,
    TestMode, Verdict, VerificationReport, WorkingCheckout,
};

fn ran(phase: Phase, exit: i32) -> PhaseResult {
    PhaseResult {
        phase,
        status: if exit == 0 { PhaseStatus::Passed } else { PhaseStatus::Failed },
        build_succeeded: true,
        exit_code: Some(exit),
        log: format!("exit {exit}"),
        elapsed: Duration::from_millis(10),
    }
}

#[test]
fn test_run_id_new() {
    let a = RunId::new();
    let b = RunId::new();
    assert_ne!(a, b);
    assert!(a.as_str().starts_with("run-"));
}

#[test]
fn test_container_names_are_unique() {
    assert_ne!(ContainerName::new(), ContainerName::new());
}

#[test]
fn test_phase_modes() {
    assert_eq!(Phase::BaseOnly.mode(), TestMode::Base);
    assert_eq!(Phase::NewWithoutSolution.mode(), TestMode::New);
    assert_eq!(Phase::BaseWithSolution.mode(), TestMode::Base);
    assert_eq!(Phase::NewWithSolution.mode(), TestMode::New);
    assert_eq!(TestMode::New.as_arg(), "new");
}

#[test]
fn test_phase_patches() {
    assert_eq!(Phase::BaseOnly.patch(), None);
    assert_eq!(Phase::NewWithoutSolution.patch(), Some(PatchKind::Test));
    assert_eq!(Phase::BaseWithSolution.patch(), Some(PatchKind::Solution));
    assert_eq!(Phase::NewWithSolution.patch(), None);
}

#[test]
fn test_happy_path_summary() {
    let mut report = VerificationReport::new();
    for (phase, exit) in Phase::ALL.iter().zip([0, 1, 0, 0]) {
        report = report.record(ran(*phase, exit)).unwrap();
    }
    let summary = report.summary();
    assert!(summary.base_only_pass);
    assert!(summary.new_only_fail);
    assert!(summary.solution_base_pass);
    assert!(summary.solution_new_pass);
    assert!(report.all_expectations_met());
}

#[test]
fn test_new_tests_passing_without_solution_is_unmet() {
    let report = VerificationReport::new()
        .record(ran(Phase::BaseOnly, 0))
        .unwrap()
        .record(ran(Phase::NewWithoutSolution, 0))
        .unwrap();
    assert_eq!(report.expectation(Phase::NewWithoutSolution), Expectation::Unmet);
    assert!(!report.new_only_fail());
}

#[test]
fn test_build_failure_leaves_new_only_fail_unattempted() {
    let report = VerificationReport::new()
        .record(ran(Phase::BaseOnly, 0))
        .unwrap()
        .record(PhaseResult::skipped(Phase::NewWithoutSolution, SkipReason::BuildFailed))
        .unwrap()
        .record(PhaseResult::skipped(
            Phase::BaseWithSolution,
            SkipReason::PriorPhaseAborted { phase: Phase::NewWithoutSolution },
        ))
        .unwrap();
    assert_eq!(report.expectation(Phase::NewWithoutSolution), Expectation::Unattempted);
    assert_eq!(report.expectation(Phase::NewWithSolution), Expectation::Unattempted);
    assert!(!report.new_only_fail());
    assert!(!report.is_complete());
}

#[test]
fn test_execution_outcome_passes_only_on_zero() {
    let outcome = |code| ExecutionOutcome { exit_code: code, output: String::new(), elapsed: Duration::ZERO };
    assert!(outcome(Some(0)).passed());
    assert!(!outcome(Some(1)).passed());
    assert!(!outcome(None).passed());
}

#[test]
fn test_working_checkout_accessors() {
    let checkout = WorkingCheckout::new("/tmp/repo", "abc123");
    assert_eq!(checkout.root(), std::path::Path::new("/tmp/repo"));
    assert_eq!(checkout.base_commit(), "abc123");
}

#[test]
fn test_verdict_labels() {
    assert_eq!(Verdict::Accept.to_string(), "ACCEPT");
    assert_eq!(Verdict::RequestChange.to_string(), "REQUEST_CHANGE");
    assert_eq!(Verdict::Reject.as_str(), "REJECT");
}
