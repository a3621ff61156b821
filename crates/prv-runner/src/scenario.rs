use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use prv_container::{ImageBuilder, TestExecutor};
use prv_core::{
    BuildError, ExecutionOutcome, ImageRef, PatchApplyError, PatchKind, Phase, ReportSummary, RunError, TestMode,
    TimeoutError, Verdict, VerificationReport, WorkingCheckout,
};
use prv_vcs::{Patch, PatchApplier};
use prv_verdict::{Decision, StructuralChecks, VerdictEngine, VerdictInput, VerdictPolicy};
use serde::Deserialize;

use crate::pipeline::{PipelinePatches, PipelineSettings, VerificationPipeline};

#[derive(Debug, Deserialize)]
pub struct Scenario {
    pub scenario_id: String,
    #[serde(default)]
    pub package: ScriptedPackage,
    #[serde(default = "default_rebuild")]
    pub rebuild_final_phase: bool,
    #[serde(default)]
    pub policy: VerdictPolicy,
    #[serde(default)]
    pub phases: BTreeMap<Phase, ScriptedPhase>,
}

fn default_rebuild() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ScriptedPackage {
    pub test_patch: bool,
    pub solution_patch: bool,
    pub content_issues: Vec<String>,
}

impl Default for ScriptedPackage {
    fn default() -> Self {
        Self { test_patch: true, solution_patch: true, content_issues: Vec::new() }
    }
}

/// What the fake adapters do in one phase. Unlisted phases apply, build and
/// exit 0.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ScriptedPhase {
    pub apply: ApplyScript,
    pub build: BuildScript,
    pub run: RunScript,
    pub exit: i32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyScript {
    #[default]
    Ok,
    Conflict,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildScript {
    #[default]
    Ok,
    Failed,
    WrongBaseImage,
    RecipeMissing,
    Timeout,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunScript {
    #[default]
    Exit,
    Timeout,
    LaunchFailure,
}

#[derive(Debug, Deserialize)]
pub struct ScenarioExpected {
    pub scenario_id: String,
    pub statuses: Vec<String>,
    pub summary: ReportSummary,
    pub verdict: Verdict,
}

#[derive(Debug)]
pub struct ScenarioResult {
    pub report: VerificationReport,
    pub decision: Decision,
    pub builds: usize,
}

impl ScenarioResult {
    pub fn statuses(&self) -> Vec<String> {
        self.report.phases().iter().map(|r| r.status.label().to_string()).collect()
    }
}

pub fn load_scenario(dir: &Path) -> Result<Scenario> {
    let p = dir.join("scenario.yaml");
    let s = std::fs::read_to_string(&p).with_context(|| format!("read scenario.yaml: {}", p.display()))?;
    serde_yaml::from_str(&s).with_context(|| "parse scenario.yaml")
}

pub fn load_expected(dir: &Path) -> Result<ScenarioExpected> {
    let p = dir.join("expected.yaml");
    let s = std::fs::read_to_string(&p).with_context(|| format!("read expected.yaml: {}", p.display()))?;
    serde_yaml::from_str(&s).with_context(|| "parse expected.yaml")
}

/// Fixture-mode review: the real pipeline and verdict engine driven by
/// scripted adapters. No git or container program is invoked.
pub fn simulate(dir: &Path) -> Result<ScenarioResult> {
    let scenario = load_scenario(dir)?;
    let script = |phase: Phase| scenario.phases.get(&phase).copied().unwrap_or_default();

    let applier = ScriptedApplier {
        test: script(Phase::NewWithoutSolution).apply,
        solution: script(Phase::BaseWithSolution).apply,
    };
    let builder = ScriptedBuilder { scripts: Phase::ALL.map(|p| script(p).build), calls: Mutex::new(0) };
    let executor = ScriptedExecutor { scripts: Phase::ALL.map(script), calls: Mutex::new(0) };

    let patches = PipelinePatches {
        test: scenario
            .package
            .test_patch
            .then(|| Patch::from_bytes(PatchKind::Test, "test.patch", b"fixture".to_vec())),
        solution: scenario
            .package
            .solution_patch
            .then(|| Patch::from_bytes(PatchKind::Solution, "solution.patch", b"fixture".to_vec())),
    };
    let settings = PipelineSettings { timeout: Duration::from_secs(1), rebuild_final_phase: scenario.rebuild_final_phase };
    let checkout = WorkingCheckout::new(dir, "fixture");
    let report = VerificationPipeline::new(&applier, &builder, &executor, settings)
        .run(checkout, &patches)
        .with_context(|| format!("scenario {}", scenario.scenario_id))?;

    let structural = StructuralChecks {
        recipe_present: builder.scripts[0] != BuildScript::RecipeMissing,
        recipe_base_image_ok: builder.scripts[0] != BuildScript::WrongBaseImage,
        test_patch_present: scenario.package.test_patch,
        solution_patch_present: scenario.package.solution_patch,
        test_patch_applies: scenario.package.test_patch.then_some(applier.test == ApplyScript::Ok),
        solution_patch_applies: scenario.package.solution_patch.then_some(applier.solution == ApplyScript::Ok),
        ..StructuralChecks::all_passing()
    };
    let decision = VerdictEngine::new(scenario.policy.clone()).decide(&VerdictInput {
        structural: &structural,
        content_issues: &scenario.package.content_issues,
        report: &report,
    });
    let builds = *builder.calls.lock().unwrap_or_else(|e| e.into_inner());
    Ok(ScenarioResult { report, decision, builds })
}

struct ScriptedApplier {
    test: ApplyScript,
    solution: ApplyScript,
}

impl ScriptedApplier {
    fn script(&self, patch: &Patch) -> ApplyScript {
        match patch.kind() {
            PatchKind::Test => self.test,
            PatchKind::Solution => self.solution,
        }
    }
}

impl PatchApplier for ScriptedApplier {
    fn check(&self, patch: &Patch, _checkout: &WorkingCheckout) -> bool {
        self.script(patch) == ApplyScript::Ok
    }

    fn apply(&self, patch: &Patch, _checkout: &mut WorkingCheckout) -> Result<(), PatchApplyError> {
        match self.script(patch) {
            ApplyScript::Ok => Ok(()),
            ApplyScript::Conflict => Err(PatchApplyError::Conflict {
                reason: format!("error: {}: patch does not apply", patch.path().display()),
            }),
        }
    }
}

/// Builds happen in phase order and stop at the first abort, so the nth
/// call belongs to the nth phase.
struct ScriptedBuilder {
    scripts: [BuildScript; 4],
    calls: Mutex<usize>,
}

fn next_call(calls: &Mutex<usize>) -> usize {
    let mut calls = calls.lock().unwrap_or_else(|e| e.into_inner());
    let n = *calls;
    *calls += 1;
    n
}

impl ImageBuilder for ScriptedBuilder {
    fn build(&self, checkout: &WorkingCheckout) -> Result<ImageRef, BuildError> {
        let n = next_call(&self.calls);
        match self.scripts.get(n).copied().unwrap_or_default() {
            BuildScript::Ok => Ok(ImageRef("problem-review-test".to_string())),
            BuildScript::Failed => Err(BuildError::BuildFailed { log: "scripted build failure".to_string() }),
            BuildScript::WrongBaseImage => Err(BuildError::WrongBaseImage {
                expected: "public.ecr.aws/x8v8d7g8/mars-base:latest".to_string(),
                found: vec!["ubuntu:22.04".to_string()],
            }),
            BuildScript::RecipeMissing => Err(BuildError::RecipeMissing { path: checkout.root().join("Dockerfile") }),
            BuildScript::Timeout => Err(BuildError::TimedOut(TimeoutError {
                command: "docker build".to_string(),
                limit: Duration::from_secs(1),
                output: String::new(),
            })),
        }
    }
}

struct ScriptedExecutor {
    scripts: [ScriptedPhase; 4],
    calls: Mutex<usize>,
}

impl TestExecutor for ScriptedExecutor {
    fn run(&self, _image: &ImageRef, mode: TestMode, timeout: Duration) -> Result<ExecutionOutcome, RunError> {
        let n = next_call(&self.calls);
        let script = self.scripts.get(n).copied().unwrap_or_default();
        match script.run {
            RunScript::Exit => Ok(ExecutionOutcome {
                exit_code: Some(script.exit),
                output: format!("./test.sh {} exited {}\n", mode.as_arg(), script.exit),
                elapsed: Duration::ZERO,
            }),
            RunScript::Timeout => Err(RunError::TimedOut(TimeoutError {
                command: format!("docker run ./test.sh {}", mode.as_arg()),
                limit: timeout,
                output: String::new(),
            })),
            RunScript::LaunchFailure => Err(RunError::Launch { reason: "exit Some(125): Unable to find image".to_string() }),
        }
    }
}
