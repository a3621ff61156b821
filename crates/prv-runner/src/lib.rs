pub mod config;
pub mod doctor;
pub mod pipeline;
pub mod review;
pub mod scenario;

pub use config::*;
pub use doctor::*;
pub use pipeline::*;
pub use review::*;

#[cfg(test)]
mod scenario_tests {
    use super::scenario::*;
    use prv_core::{Phase, PhaseStatus, SkipReason, Verdict};
    use std::path::{Path, PathBuf};

    fn dir(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/scenarios").join(name)
    }

    fn run(name: &str) -> ScenarioResult {
        simulate(&dir(name)).unwrap()
    }

    #[test]
    fn every_fixture_matches_its_expectations() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/scenarios");
        let mut seen = 0;
        for entry in std::fs::read_dir(&root).unwrap() {
            let path = entry.unwrap().path();
            if !path.join("scenario.yaml").is_file() {
                continue;
            }
            let exp = load_expected(&path).unwrap();
            let res = simulate(&path).unwrap();
            assert_eq!(res.statuses(), exp.statuses, "{}", exp.scenario_id);
            assert_eq!(res.report.summary(), exp.summary, "{}", exp.scenario_id);
            assert_eq!(res.decision.verdict, exp.verdict, "{}", exp.scenario_id);
            assert!(res.report.is_complete(), "{}", exp.scenario_id);
            seen += 1;
        }
        assert!(seen >= 10);
    }

    #[test]
    fn scenario_sc01_accept_rebuilds_every_phase() {
        let res = run("SC-01-accept");
        assert_eq!(res.decision.verdict, Verdict::Accept);
        assert!(res.decision.findings.is_empty());
        assert_eq!(res.builds, 4);
    }

    #[test]
    fn scenario_sc03_wrong_base_image_never_runs_tests() {
        let res = run("SC-03-wrong-base-image");
        assert_eq!(res.builds, 1);
        assert_eq!(
            res.report.phase(Phase::BaseOnly).unwrap().status,
            PhaseStatus::skipped(SkipReason::WrongBaseImage)
        );
        assert!(res.decision.failures().any(|f| f.message.contains("base image")));
    }

    #[test]
    fn scenario_sc04_missing_solution_names_the_patch() {
        let res = run("SC-04-missing-solution");
        assert_eq!(
            res.report.phase(Phase::BaseWithSolution).unwrap().status,
            PhaseStatus::skipped(SkipReason::PatchMissing { patch: prv_core::PatchKind::Solution })
        );
    }

    #[test]
    fn scenario_sc06_timeout_is_not_a_pass() {
        let res = run("SC-06-tests-hang");
        let phase = res.report.phase(Phase::NewWithoutSolution).unwrap();
        assert_eq!(phase.status, PhaseStatus::TimedOut);
        assert!(phase.log.contains("timed out"));
    }

    #[test]
    fn scenario_sc10_reuses_image_for_final_phase() {
        let res = run("SC-10-content-issues-only");
        assert_eq!(res.builds, 3);
        assert_eq!(res.decision.failures().count(), 0);
        assert_eq!(res.decision.warnings().count(), 1);
    }
}
