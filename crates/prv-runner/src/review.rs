use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use prv_artifacts::{ArtifactStore, EvidenceManifest, EvidenceRole, FsArtifactStore, PatchRecord};
use prv_container::{BuildRecipe, DockerImageBuilder, DockerTestExecutor, ImageBuilder, TestExecutor};
use prv_core::{CheckoutError, PatchKind, Phase, PhaseStatus, RunId, SkipReason, Verdict, VerificationReport};
use prv_feedback::{render_feedback, FeedbackInput};
use prv_package::{analyze_description, DescriptionAnalysis, ProblemPackage, RepoMetadata};
use prv_vcs::{CheckoutProvider, Patch, PatchApplier};
use prv_vcs_git::GitAdapter;
use prv_verdict::{Decision, StructuralChecks, VerdictEngine, VerdictInput};
use thiserror::Error;
use tracing::{info, warn};

use crate::pipeline::{PipelinePatches, PipelineSettings, VerificationPipeline};
use crate::Config;

pub const FEEDBACK_FILE: &str = "feedback.md";

#[derive(Debug, Error)]
pub enum ReviewError {
    /// The repository could not be cloned or pinned; no verdict is possible.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Clone, Debug, Default)]
pub struct ReviewRequest {
    pub problem_dir: PathBuf,
    pub repo_url: Option<String>,
    pub commit: Option<String>,
    pub skip_verification: bool,
}

/// Everything a finished review produced.
#[derive(Debug)]
pub struct Review {
    pub run_id: RunId,
    pub title: String,
    pub repo: RepoMetadata,
    pub description: Option<DescriptionAnalysis>,
    pub structural: StructuralChecks,
    pub patches: Vec<PatchRecord>,
    pub report: VerificationReport,
    pub decision: Decision,
    pub feedback: String,
}

impl Review {
    pub fn verdict(&self) -> Verdict {
        self.decision.verdict
    }

    pub fn word_count(&self) -> Option<usize> {
        self.description.as_ref().map(|d| d.word_count)
    }

    pub fn content_issues(&self) -> &[String] {
        self.description.as_ref().map(|d| d.issues.as_slice()).unwrap_or(&[])
    }

    pub fn write_feedback(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.feedback).with_context(|| format!("write {}", path.display()))
    }

    /// Persist the report, phase logs, feedback and manifest under
    /// `<root>/<run_id>/`.
    pub fn write_evidence(&self, root: &Path) -> Result<PathBuf> {
        let store = FsArtifactStore::new(root.to_path_buf());
        let run_dir = store.create_run_dir(&self.run_id)?;
        store.write_role_bytes(&run_dir, EvidenceRole::Feedback, FEEDBACK_FILE, self.feedback.as_bytes())?;
        let manifest = EvidenceManifest {
            run_id: self.run_id.to_string(),
            title: self.title.clone(),
            repo_url: self.repo.url.clone(),
            commit: self.repo.commit.clone(),
            patches: self.patches.clone(),
            verdict: self.verdict(),
            summary: self.report.summary(),
            phases: EvidenceManifest::phase_records(&self.report),
        };
        store.write_run(&run_dir, manifest, &self.report)?;
        store.append_worklog(&run_dir, &format!("- review of `{}` finished: {}", self.title, self.verdict()))?;
        Ok(run_dir)
    }
}

pub struct Reviewer {
    cfg: Config,
    checkouts: Box<dyn CheckoutProvider>,
    patches: Box<dyn PatchApplier>,
    builder: Box<dyn ImageBuilder>,
    executor: Box<dyn TestExecutor>,
}

impl Reviewer {
    /// Git for checkouts and patches, the configured container program for
    /// builds and test runs.
    pub fn from_config(cfg: Config) -> Self {
        let git = GitAdapter::new(cfg.command_timeout());
        let builder = DockerImageBuilder::new(
            cfg.container.program.clone(),
            cfg.review.image_tag.clone(),
            cfg.review.accepted_base_image.clone(),
        )
        .with_timeout(cfg.command_timeout());
        let mut executor = DockerTestExecutor::new(cfg.container.program.clone(), cfg.container.entrypoint.clone());
        executor.network = cfg.container.network.clone();
        Self::with_adapters(cfg, Box::new(git.clone()), Box::new(git), Box::new(builder), Box::new(executor))
    }

    pub fn with_adapters(
        cfg: Config,
        checkouts: Box<dyn CheckoutProvider>,
        patches: Box<dyn PatchApplier>,
        builder: Box<dyn ImageBuilder>,
        executor: Box<dyn TestExecutor>,
    ) -> Self {
        Self { cfg, checkouts, patches, builder, executor }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn review(&self, req: &ReviewRequest) -> Result<Review, ReviewError> {
        let run_id = RunId::new();
        let pkg = ProblemPackage::discover(&req.problem_dir)?;
        info!(run_id = %run_id, problem = %pkg.root.display(), "starting review");

        let description = pkg.read_description()?.map(|text| analyze_description(&text, self.cfg.description));
        let title = description
            .as_ref()
            .and_then(|d| d.title.clone())
            .or_else(|| pkg.root.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "Unknown problem".to_string());

        let repo = RepoMetadata::scrape(&pkg.read_setup_notes()?.unwrap_or_default())
            .with_overrides(req.repo_url.clone(), req.commit.clone());

        let recipe = match (&pkg.recipe, pkg.read_recipe()?) {
            (Some(path), Some(contents)) => Some(BuildRecipe { path: path.clone(), contents }),
            _ => None,
        };

        let patches = PipelinePatches {
            test: read_patch(&pkg, PatchKind::Test)?,
            solution: read_patch(&pkg, PatchKind::Solution)?,
        };

        let mut structural = StructuralChecks {
            repository_resolved: repo.is_complete(),
            description_present: description.is_some(),
            recipe_present: recipe.is_some(),
            recipe_base_image_ok: recipe
                .as_ref()
                .is_some_and(|r| r.declares_base_image(&self.cfg.review.accepted_base_image)),
            test_patch_present: patches.test.is_some(),
            solution_patch_present: patches.solution.is_some(),
            test_patch_applies: None,
            solution_patch_applies: None,
        };

        let report = match (&repo.url, &repo.commit, &recipe) {
            _ if req.skip_verification => VerificationReport::skipped_all(SkipReason::VerificationDisabled),
            (Some(url), Some(commit), Some(recipe)) => {
                self.verify(&run_id, url, commit, recipe, &patches, &mut structural)?
            }
            (Some(_), Some(_), None) => VerificationReport::skipped_all(SkipReason::RecipeMissing),
            _ => {
                warn!(run_id = %run_id, "repository url or commit unknown; verification skipped");
                VerificationReport::skipped_all(SkipReason::RepositoryUnknown)
            }
        };

        let content_issues = description.as_ref().map(|d| d.issues.clone()).unwrap_or_default();
        let engine = VerdictEngine::new(self.cfg.verdict.clone());
        let decision = engine.decide(&VerdictInput { structural: &structural, content_issues: &content_issues, report: &report });

        let feedback = render_feedback(&FeedbackInput {
            title: &title,
            decision: &decision,
            report: &report,
            structural: &structural,
            word_count: description.as_ref().map(|d| d.word_count),
            soft_word_limit: self.cfg.description.soft_limit,
        });

        info!(run_id = %run_id, verdict = %decision.verdict, findings = decision.findings.len(), "review finished");
        Ok(Review {
            run_id,
            title,
            repo,
            description,
            structural,
            patches: [&patches.test, &patches.solution]
                .into_iter()
                .flatten()
                .map(|p| PatchRecord { kind: p.kind(), sha256: p.sha256() })
                .collect(),
            report,
            decision,
            feedback,
        })
    }

    /// Clone into a fresh work directory, dry-run the test patch against the
    /// pristine tree, then hand the checkout to the pipeline.
    fn verify(
        &self,
        run_id: &RunId,
        url: &str,
        commit: &str,
        recipe: &BuildRecipe,
        patches: &PipelinePatches,
        structural: &mut StructuralChecks,
    ) -> Result<VerificationReport, ReviewError> {
        let workdir = self.cfg.work_root().join(run_id.as_str());
        std::fs::create_dir_all(&workdir)
            .map_err(|e| CheckoutError::Workdir { path: workdir.clone(), reason: e.to_string() })?;
        let result = self.verify_in(&workdir, url, commit, recipe, patches, structural);
        if self.cfg.review.keep_workdir {
            info!(workdir = %workdir.display(), "keeping work directory");
        } else if let Err(e) = std::fs::remove_dir_all(&workdir) {
            warn!(workdir = %workdir.display(), error = %e, "could not remove work directory");
        }
        result
    }

    fn verify_in(
        &self,
        workdir: &Path,
        url: &str,
        commit: &str,
        recipe: &BuildRecipe,
        patches: &PipelinePatches,
        structural: &mut StructuralChecks,
    ) -> Result<VerificationReport, ReviewError> {
        let checkout = self.checkouts.prepare(url, commit, &workdir.join("repo"))?;
        let dest = checkout.root().join("Dockerfile");
        std::fs::write(&dest, &recipe.contents).with_context(|| format!("write {}", dest.display()))?;

        structural.test_patch_applies = patches.test.as_ref().map(|p| self.patches.check(p, &checkout));
        // The solution is written against the tree with the tests in place,
        // so only a package without tests is checked on the pristine tree.
        let pristine_solution = match (&patches.test, &patches.solution) {
            (None, Some(p)) => Some(self.patches.check(p, &checkout)),
            _ => None,
        };

        let settings = PipelineSettings {
            timeout: self.cfg.command_timeout(),
            rebuild_final_phase: self.cfg.pipeline.rebuild_final_phase,
        };
        let pipeline = VerificationPipeline::new(self.patches.as_ref(), self.builder.as_ref(), self.executor.as_ref(), settings);
        let report = pipeline.run(checkout, patches).context("recording phase results")?;
        if patches.solution.is_some() {
            structural.solution_patch_applies = pristine_solution.or_else(|| solution_applied(&report));
        }
        Ok(report)
    }
}

/// Whether phase 3 got the solution onto the tree, as far as the report
/// tells. `None` when the phase never reached the apply step.
fn solution_applied(report: &VerificationReport) -> Option<bool> {
    let phase = report.phase(Phase::BaseWithSolution)?;
    match &phase.status {
        PhaseStatus::Skipped { reason: SkipReason::PatchRejected { .. } | SkipReason::PatchMissing { .. } } => {
            Some(false)
        }
        PhaseStatus::Skipped { reason: SkipReason::PriorPhaseAborted { .. } } => None,
        PhaseStatus::TimedOut if !phase.build_succeeded => None,
        _ => Some(true),
    }
}

fn read_patch(pkg: &ProblemPackage, kind: PatchKind) -> Result<Option<Patch>> {
    pkg.patch_path(kind)
        .map(|path| Patch::read(kind, path).with_context(|| format!("read {}", path.display())))
        .transpose()
}
