use prv_core::{Expectation, Phase};

use crate::types::{CheckId, Finding, FindingCategory, Severity, VerdictInput};

pub trait Rule: Send + Sync {
    fn id(&self) -> &str;
    fn eval(&self, input: &VerdictInput<'_>) -> Vec<Finding>;
}

fn fail(check: CheckId, category: FindingCategory, message: impl Into<String>) -> Finding {
    Finding { check, category, severity: Severity::Fail, message: message.into() }
}

/// Required files, repository pointer and base image.
pub struct PackageStructureRule;

impl Rule for PackageStructureRule {
    fn id(&self) -> &str {
        "package_structure"
    }

    fn eval(&self, input: &VerdictInput<'_>) -> Vec<Finding> {
        let s = input.structural;
        let checks = [
            (s.repository_resolved, CheckId::RepositoryResolved, "No repository URL found"),
            (s.description_present, CheckId::DescriptionPresent, "description.md not found"),
            (s.recipe_present, CheckId::RecipePresent, "Dockerfile not found"),
            (s.test_patch_present, CheckId::TestPatchPresent, "test.patch not found"),
            (s.solution_patch_present, CheckId::SolutionPatchPresent, "solution.patch not found"),
        ];
        let mut findings: Vec<Finding> = checks
            .into_iter()
            .filter(|(ok, _, _)| !ok)
            .map(|(_, check, msg)| fail(check, FindingCategory::Structural, msg))
            .collect();
        // A missing recipe is already reported above.
        if s.recipe_present && !s.recipe_base_image_ok {
            findings.push(fail(
                CheckId::RecipeBaseImage,
                FindingCategory::Structural,
                "Dockerfile does not use the required base image",
            ));
        }
        findings
    }
}

/// Apply results for the patches that exist.
pub struct PatchApplyRule;

impl Rule for PatchApplyRule {
    fn id(&self) -> &str {
        "patch_apply"
    }

    fn eval(&self, input: &VerdictInput<'_>) -> Vec<Finding> {
        let s = input.structural;
        let mut findings = Vec::new();
        if s.test_patch_applies == Some(false) {
            findings.push(fail(CheckId::TestPatchApplies, FindingCategory::Structural, "test.patch does not apply cleanly"));
        }
        if s.solution_patch_applies == Some(false) {
            findings.push(fail(
                CheckId::SolutionPatchApplies,
                FindingCategory::Structural,
                "solution.patch does not apply cleanly",
            ));
        }
        findings
    }
}

/// Every phase must reach its expected state; unattempted counts against.
pub struct PhaseExpectationRule;

impl Rule for PhaseExpectationRule {
    fn id(&self) -> &str {
        "phase_expectations"
    }

    fn eval(&self, input: &VerdictInput<'_>) -> Vec<Finding> {
        Phase::ALL
            .iter()
            .filter_map(|phase| {
                let message = match (input.report.expectation(*phase), phase) {
                    (Expectation::Met, _) => return None,
                    (Expectation::Unattempted, _) => format!("{phase}: not attempted"),
                    (Expectation::Unmet, Phase::NewWithoutSolution) => {
                        format!("{phase}: new tests did not fail without the solution")
                    }
                    (Expectation::Unmet, _) => format!("{phase}: tests did not pass"),
                };
                Some(fail(CheckId::for_phase(*phase), FindingCategory::Verification, message))
            })
            .collect()
    }
}

/// Issues raised by description analysis. Advisory on their own; the policy
/// decides whether they block acceptance.
pub struct ContentRule;

impl Rule for ContentRule {
    fn id(&self) -> &str {
        "content"
    }

    fn eval(&self, input: &VerdictInput<'_>) -> Vec<Finding> {
        input
            .content_issues
            .iter()
            .map(|issue| Finding {
                check: CheckId::DescriptionContent,
                category: FindingCategory::Content,
                severity: Severity::Warn,
                message: issue.clone(),
            })
            .collect()
    }
}

pub fn default_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(PackageStructureRule),
        Box::new(PatchApplyRule),
        Box::new(PhaseExpectationRule),
        Box::new(ContentRule),
    ]
}
