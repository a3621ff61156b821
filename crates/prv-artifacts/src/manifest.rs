use serde::{Deserialize, Serialize};

use prv_core::{PatchKind, Phase, ReportSummary, Verdict, VerificationReport};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum EvidenceRole {
    PhaseLog,
    Report,
    Feedback,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatchRecord {
    pub kind: PatchKind,
    pub sha256: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhaseRecord {
    pub phase: Phase,
    pub status: String,
    pub exit_code: Option<i32>,
    pub elapsed_ms: u64,
    pub log: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvidenceManifest {
    pub run_id: String,
    pub title: String,
    pub repo_url: Option<String>,
    pub commit: Option<String>,
    pub patches: Vec<PatchRecord>,
    pub verdict: Verdict,
    pub summary: ReportSummary,
    pub phases: Vec<PhaseRecord>,
}

impl EvidenceManifest {
    /// Phase records without log paths; the store fills those in as it writes.
    pub fn phase_records(report: &VerificationReport) -> Vec<PhaseRecord> {
        report
            .phases()
            .iter()
            .map(|r| PhaseRecord {
                phase: r.phase,
                status: r.status.label().to_string(),
                exit_code: r.exit_code,
                elapsed_ms: r.elapsed.as_millis() as u64,
                log: None,
            })
            .collect()
    }
}
