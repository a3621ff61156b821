use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use prv_core::{RunId, VerificationReport};

use crate::manifest::{EvidenceManifest, EvidenceRole};

pub trait ArtifactStore: Send + Sync {
    fn create_run_dir(&self, run_id: &RunId) -> Result<PathBuf>;
    fn write_manifest(&self, run_dir: &Path, manifest: &EvidenceManifest) -> Result<()>;
    fn append_worklog(&self, run_dir: &Path, line: &str) -> Result<()>;
    fn write_role_bytes(&self, run_dir: &Path, role: EvidenceRole, name: &str, bytes: &[u8]) -> Result<PathBuf>;
}

#[derive(Clone)]
pub struct FsArtifactStore {
    pub root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn role_dir(role: EvidenceRole) -> &'static str {
        match role {
            EvidenceRole::PhaseLog => "phases",
            EvidenceRole::Report => "report",
            EvidenceRole::Feedback => "feedback",
        }
    }

    /// Write every phase log and the report JSON, then the manifest pointing
    /// at them.
    pub fn write_run(&self, run_dir: &Path, mut manifest: EvidenceManifest, report: &VerificationReport) -> Result<()> {
        for (record, result) in manifest.phases.iter_mut().zip(report.phases()) {
            if result.log.is_empty() {
                continue;
            }
            let name = format!("{}.log", result.phase);
            self.write_role_bytes(run_dir, EvidenceRole::PhaseLog, &name, result.log.as_bytes())?;
            record.log = Some(format!("{}/{}", Self::role_dir(EvidenceRole::PhaseLog), name));
        }
        let json = serde_json::to_vec_pretty(report)?;
        self.write_role_bytes(run_dir, EvidenceRole::Report, "verification_report.json", &json)?;
        self.write_manifest(run_dir, &manifest)
    }
}

impl ArtifactStore for FsArtifactStore {
    fn create_run_dir(&self, run_id: &RunId) -> Result<PathBuf> {
        let dir = self.root.join(run_id.as_str());
        std::fs::create_dir_all(&dir).with_context(|| format!("create run dir {}", dir.display()))?;
        Ok(dir)
    }

    fn write_manifest(&self, run_dir: &Path, manifest: &EvidenceManifest) -> Result<()> {
        let path = run_dir.join("evidence_manifest.json");
        let bytes = serde_json::to_vec_pretty(manifest)?;
        std::fs::write(&path, bytes).with_context(|| format!("write manifest {}", path.display()))?;
        Ok(())
    }

    fn append_worklog(&self, run_dir: &Path, line: &str) -> Result<()> {
        let path = run_dir.join("worklog.md");
        use std::io::Write;
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open worklog {}", path.display()))?;
        writeln!(f, "{}", line)?;
        Ok(())
    }

    fn write_role_bytes(&self, run_dir: &Path, role: EvidenceRole, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let dir = run_dir.join(Self::role_dir(role));
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(name);
        std::fs::write(&path, bytes).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prv_core::{Phase, PhaseResult, PhaseStatus, SkipReason, Verdict};
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn writes_logs_report_and_manifest() {
        let dir = tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path().to_path_buf());
        let run_dir = store.create_run_dir(&RunId::from_str("r")).unwrap();
        store.append_worklog(&run_dir, "## Review r").unwrap();

        let report = prv_core::VerificationReport::new()
            .record(PhaseResult {
                phase: Phase::BaseOnly,
                status: PhaseStatus::Passed,
                build_succeeded: true,
                exit_code: Some(0),
                log: "3 passed".into(),
                elapsed: Duration::from_millis(1500),
            })
            .unwrap()
            .record(PhaseResult::skipped(Phase::NewWithoutSolution, SkipReason::PatchMissing { patch: prv_core::PatchKind::Test }))
            .unwrap();
        let manifest = EvidenceManifest {
            run_id: "r".into(),
            title: "t".into(),
            repo_url: None,
            commit: None,
            patches: vec![],
            verdict: Verdict::RequestChange,
            summary: report.summary(),
            phases: EvidenceManifest::phase_records(&report),
        };
        store.write_run(&run_dir, manifest, &report).unwrap();

        assert!(run_dir.join("worklog.md").exists());
        assert_eq!(std::fs::read_to_string(run_dir.join("phases/base_only.log")).unwrap(), "3 passed");
        assert!(!run_dir.join("phases/new_without_solution.log").exists());
        assert!(run_dir.join("report/verification_report.json").exists());

        let written: EvidenceManifest =
            serde_json::from_slice(&std::fs::read(run_dir.join("evidence_manifest.json")).unwrap()).unwrap();
        assert_eq!(written.phases[0].log.as_deref(), Some("phases/base_only.log"));
        assert_eq!(written.phases[0].elapsed_ms, 1500);
        assert_eq!(written.phases[1].status, "SKIPPED");
    }
}
