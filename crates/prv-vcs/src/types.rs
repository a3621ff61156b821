use std::path::{Path, PathBuf};

use prv_core::{CheckoutError, PatchApplyError, PatchKind, WorkingCheckout};
use sha2::{Digest, Sha256};

/// A unified diff read from the problem package. Immutable once read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Patch {
    kind: PatchKind,
    path: PathBuf,
    bytes: Vec<u8>,
}

impl Patch {
    pub fn read(kind: PatchKind, path: &Path) -> Result<Self, PatchApplyError> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(Self { kind, path: path.to_path_buf(), bytes }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PatchApplyError::Missing { path: path.to_path_buf() })
            }
            Err(e) => Err(PatchApplyError::Tool { reason: format!("read {}: {e}", path.display()) }),
        }
    }

    pub fn from_bytes(kind: PatchKind, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) -> Self {
        Self { kind, path: path.into(), bytes: bytes.into() }
    }

    pub fn kind(&self) -> PatchKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.iter().all(u8::is_ascii_whitespace)
    }

    pub fn sha256(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }
}

/// Dry-run validation and application of patches against a checkout.
pub trait PatchApplier: Send + Sync {
    /// Would `patch` apply cleanly right now? Never mutates the checkout.
    fn check(&self, patch: &Patch, checkout: &WorkingCheckout) -> bool;

    /// Apply `patch`, or leave the checkout untouched and explain why not.
    fn apply(&self, patch: &Patch, checkout: &mut WorkingCheckout) -> Result<(), PatchApplyError>;
}

/// Produces a fresh checkout pinned to a commit.
pub trait CheckoutProvider: Send + Sync {
    fn prepare(&self, repo_url: &str, commit: &str, dest: &Path) -> Result<WorkingCheckout, CheckoutError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_patch_file_is_reported_as_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.patch");
        let err = Patch::read(PatchKind::Test, &path).unwrap_err();
        assert!(matches!(err, PatchApplyError::Missing { path: p } if p == path));
    }

    #[test]
    fn digest_is_stable_hex() {
        let a = Patch::from_bytes(PatchKind::Solution, "solution.patch", b"diff".to_vec());
        let b = Patch::from_bytes(PatchKind::Solution, "elsewhere.patch", b"diff".to_vec());
        assert_eq!(a.sha256(), b.sha256());
        assert_eq!(a.sha256().len(), 64);
    }

    #[test]
    fn whitespace_only_patch_is_empty() {
        assert!(Patch::from_bytes(PatchKind::Test, "t", b" \n\n".to_vec()).is_empty());
        assert!(!Patch::from_bytes(PatchKind::Test, "t", b"diff --git".to_vec()).is_empty());
    }
}
