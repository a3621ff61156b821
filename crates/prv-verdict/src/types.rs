use serde::{Deserialize, Serialize};

use prv_core::{Phase, VerificationReport};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CheckId {
    RepositoryResolved,
    DescriptionPresent,
    RecipePresent,
    RecipeBaseImage,
    TestPatchPresent,
    SolutionPatchPresent,
    TestPatchApplies,
    SolutionPatchApplies,
    BaseOnlyPass,
    NewOnlyFail,
    SolutionBasePass,
    SolutionNewPass,
    DescriptionContent,
}

impl CheckId {
    pub fn for_phase(phase: Phase) -> Self {
        match phase {
            Phase::BaseOnly => CheckId::BaseOnlyPass,
            Phase::NewWithoutSolution => CheckId::NewOnlyFail,
            Phase::BaseWithSolution => CheckId::SolutionBasePass,
            Phase::NewWithSolution => CheckId::SolutionNewPass,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum FindingCategory {
    Structural,
    Verification,
    Content,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Severity {
    Warn,
    Fail,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Finding {
    pub check: CheckId,
    pub category: FindingCategory,
    pub severity: Severity,
    pub message: String,
}

/// Facts about the package gathered outside the pipeline.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralChecks {
    pub repository_resolved: bool,
    pub description_present: bool,
    pub recipe_present: bool,
    pub recipe_base_image_ok: bool,
    pub test_patch_present: bool,
    pub solution_patch_present: bool,
    /// Dry-run result against the pristine checkout; `None` when no checkout
    /// was prepared.
    pub test_patch_applies: Option<bool>,
    /// Whether the solution applied on top of the test patch; `None` when
    /// that step was never reached.
    pub solution_patch_applies: Option<bool>,
}

impl StructuralChecks {
    /// Every check that holds for a complete, well-formed package.
    pub fn all_passing() -> Self {
        Self {
            repository_resolved: true,
            description_present: true,
            recipe_present: true,
            recipe_base_image_ok: true,
            test_patch_present: true,
            solution_patch_present: true,
            test_patch_applies: Some(true),
            solution_patch_applies: Some(true),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct VerdictInput<'a> {
    pub structural: &'a StructuralChecks,
    pub content_issues: &'a [String],
    pub report: &'a VerificationReport,
}
