use serde::{Deserialize, Serialize};

use prv_core::Verdict;

use crate::rule::{default_rules, Rule};
use crate::types::{CheckId, Finding, Severity, VerdictInput};

/// Caller-tunable thresholds over the same findings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictPolicy {
    /// A failed check listed here turns REQUEST_CHANGE into REJECT.
    #[serde(default)]
    pub reject_on: Vec<CheckId>,
    /// Let advisory content findings through on an otherwise clean review.
    #[serde(default)]
    pub accept_with_content_issues: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub verdict: Verdict,
    pub findings: Vec<Finding>,
}

impl Decision {
    pub fn failures(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.severity == Severity::Fail)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.severity == Severity::Warn)
    }
}

/// Pure mapping from findings to a verdict. No partial credit: a single
/// failed check rules out ACCEPT.
pub fn decide_verdict(findings: &[Finding], policy: &VerdictPolicy) -> Verdict {
    let mut failed = findings.iter().filter(|f| f.severity == Severity::Fail).peekable();
    if failed.peek().is_some() {
        if failed.any(|f| policy.reject_on.contains(&f.check)) {
            return Verdict::Reject;
        }
        return Verdict::RequestChange;
    }
    if findings.iter().any(|f| f.severity == Severity::Warn) && !policy.accept_with_content_issues {
        return Verdict::RequestChange;
    }
    Verdict::Accept
}

pub struct VerdictEngine {
    rules: Vec<Box<dyn Rule>>,
    policy: VerdictPolicy,
}

impl VerdictEngine {
    pub fn new(policy: VerdictPolicy) -> Self {
        Self { rules: default_rules(), policy }
    }

    pub fn policy(&self) -> &VerdictPolicy {
        &self.policy
    }

    pub fn decide(&self, input: &VerdictInput<'_>) -> Decision {
        let findings: Vec<Finding> = self.rules.iter().flat_map(|r| r.eval(input)).collect();
        Decision { verdict: decide_verdict(&findings, &self.policy), findings }
    }
}
