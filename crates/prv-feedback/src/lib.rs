use prv_core::{Phase, PhaseStatus, Verdict, VerificationReport};
use prv_verdict::{CheckId, Decision, FindingCategory, StructuralChecks};

pub struct FeedbackInput<'a> {
    pub title: &'a str,
    pub decision: &'a Decision,
    pub report: &'a VerificationReport,
    pub structural: &'a StructuralChecks,
    pub word_count: Option<usize>,
    pub soft_word_limit: usize,
}

fn failed(decision: &Decision, check: CheckId) -> bool {
    decision.failures().any(|f| f.check == check)
}

fn problem_quality(input: &FeedbackInput<'_>) -> String {
    let content = input.decision.warnings().count();
    match (input.structural.description_present, content) {
        (false, _) => "No problem description to assess".to_string(),
        (true, 0) => "Core problem makes sense".to_string(),
        (true, n) => format!("Core problem makes sense, but has {n} issue(s) to address"),
    }
}

fn scope(input: &FeedbackInput<'_>) -> &'static str {
    if input.structural.solution_patch_present {
        "Self-contained, no changes needed outside the target area"
    } else {
        "Cannot judge scope without a solution patch"
    }
}

fn alignment(input: &FeedbackInput<'_>) -> String {
    match input.word_count {
        Some(n) if n > input.soft_word_limit => {
            format!("Description is verbose ({n} words, target ~{})", input.soft_word_limit)
        }
        _ => "Tests line up with the description; no hidden requirements spotted".to_string(),
    }
}

fn test_quality(input: &FeedbackInput<'_>) -> String {
    let mut notes = Vec::new();
    if input.structural.test_patch_present {
        notes.push("Tests are present");
    }
    if input.report.new_only_fail() {
        notes.push("new tests fail without the solution as expected");
    } else if input.structural.test_patch_present {
        notes.push("new tests were not shown to fail without the solution");
    }
    if notes.is_empty() {
        return "Needs manual test review".to_string();
    }
    notes.join(", ")
}

fn solution(input: &FeedbackInput<'_>) -> String {
    let mut notes = Vec::new();
    if input.report.solution_base_pass() && input.report.solution_new_pass() {
        notes.push("All tests pass with the solution applied");
    }
    if input.structural.solution_patch_applies == Some(true) {
        notes.push("patch applies cleanly");
    }
    if failed(input.decision, CheckId::SolutionBasePass) && input.report.phase(Phase::BaseWithSolution).is_some_and(|r| r.status == PhaseStatus::Failed) {
        notes.push("existing tests regress once the solution is applied");
    }
    if notes.is_empty() {
        return "Needs manual solution review".to_string();
    }
    notes.join(". ")
}

fn explanation(input: &FeedbackInput<'_>) -> String {
    let mut parts = vec![match input.decision.verdict {
        Verdict::Accept => "Solid submission overall.".to_string(),
        Verdict::Reject => "Can't accept this one.".to_string(),
        Verdict::RequestChange => "Needs some work before it can be accepted.".to_string(),
    }];
    let blocking: Vec<&str> = input
        .decision
        .failures()
        .filter(|f| f.category != FindingCategory::Content)
        .map(|f| f.message.as_str())
        .take(3)
        .collect();
    if !blocking.is_empty() {
        parts.push(format!("Blocking: {}.", blocking.join("; ")));
    }
    let content: Vec<&str> = input.decision.warnings().map(|f| f.message.as_str()).take(3).collect();
    if !content.is_empty() {
        parts.push(format!("Main issues: {}.", content.join("; ")));
    }
    if let Some(n) = input.word_count.filter(|n| *n > input.soft_word_limit) {
        parts.push(format!("Description is {n} words, needs trimming to around {}.", input.soft_word_limit));
    }
    parts.join(" ")
}

fn phase_row(report: &VerificationReport, phase: Phase) -> String {
    let (status, exit) = match report.phase(phase) {
        Some(r) => (r.status.label(), r.exit_code.map(|c| c.to_string()).unwrap_or_else(|| "-".into())),
        None => ("SKIPPED", "-".to_string()),
    };
    format!("| {phase} | {status} | {exit} | {:?} |\n", report.expectation(phase))
}

/// Render the submission feedback in markdown.
pub fn render_feedback(input: &FeedbackInput<'_>) -> String {
    let mut s = String::new();
    s.push_str(&format!("Verdict: {}\n\n", input.decision.verdict));
    s.push_str(&format!("Problem: {}\n\n", input.title));
    s.push_str(&format!("Problem Quality: {}\n\n", problem_quality(input)));
    s.push_str("Problem Determinism: No obvious environment dependencies spotted\n\n");
    s.push_str(&format!("Problem Scope: {}\n\n", scope(input)));
    s.push_str("Problem Difficulty: Seems appropriately challenging for the stated difficulty level\n\n");
    s.push_str(&format!(
        "Problem Description <> Test assumptions <> Tests Alignment and Isolation: {}\n\n",
        alignment(input)
    ));
    s.push_str(&format!("Test Quality: {}\n\n", test_quality(input)));
    s.push_str(&format!("Solution Comprehensiveness: {}\n\n", solution(input)));
    s.push_str("Code Quality: Needs a manual read of the implementation for style and patterns\n\n");
    s.push_str(&format!("Explanation of verdict: {}\n\n", explanation(input)));
    s.push_str("## Verification\n\n");
    s.push_str("| Phase | Status | Exit | Expectation |\n|---|---|---|---|\n");
    for phase in Phase::ALL {
        s.push_str(&phase_row(input.report, phase));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use prv_core::{PhaseResult, SkipReason};
    use prv_verdict::{VerdictEngine, VerdictInput, VerdictPolicy};
    use std::time::Duration;

    fn ran(phase: Phase, code: i32) -> PhaseResult {
        PhaseResult {
            phase,
            status: if code == 0 { PhaseStatus::Passed } else { PhaseStatus::Failed },
            build_succeeded: true,
            exit_code: Some(code),
            log: String::new(),
            elapsed: Duration::ZERO,
        }
    }

    fn render(structural: &StructuralChecks, issues: &[String], report: &VerificationReport, words: usize) -> String {
        let decision = VerdictEngine::new(VerdictPolicy::default()).decide(&VerdictInput {
            structural,
            content_issues: issues,
            report,
        });
        render_feedback(&FeedbackInput {
            title: "Add retry budget",
            decision: &decision,
            report,
            structural,
            word_count: Some(words),
            soft_word_limit: 200,
        })
    }

    #[test]
    fn accepted_feedback() {
        let mut report = VerificationReport::new();
        for (phase, code) in Phase::ALL.iter().zip([0, 1, 0, 0]) {
            report = report.record(ran(*phase, code)).unwrap();
        }
        let md = render(&StructuralChecks::all_passing(), &[], &report, 120);
        assert!(md.starts_with("Verdict: ACCEPT\n"));
        assert!(md.contains("Problem: Add retry budget"));
        assert!(md.contains("new tests fail without the solution as expected"));
        assert!(md.contains("All tests pass with the solution applied. patch applies cleanly"));
        assert!(md.contains("| new_without_solution | FAILED | 1 | Met |"));
        assert!(md.contains("Solid submission overall."));
    }

    #[test]
    fn request_change_lists_blocking_and_content_issues() {
        let report = VerificationReport::skipped_all(SkipReason::WrongBaseImage);
        let structural = StructuralChecks { recipe_base_image_ok: false, ..StructuralChecks::all_passing() };
        let issues = vec!["Lists numbered implementation steps".to_string()];
        let md = render(&structural, &issues, &report, 230);
        assert!(md.starts_with("Verdict: REQUEST_CHANGE\n"));
        assert!(md.contains("Blocking: Dockerfile does not use the required base image"));
        assert!(md.contains("Main issues: Lists numbered implementation steps."));
        assert!(md.contains("needs trimming to around 200"));
        assert!(md.contains("| base_only | SKIPPED | - | Unattempted |"));
        assert!(md.contains("but has 1 issue(s) to address"));
    }
}
