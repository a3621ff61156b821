use std::path::Path;
use std::time::Duration;

use prv_core::{CheckoutError, PatchApplyError, WorkingCheckout};
use prv_exec::{run_bounded, run_checked, CommandSpec, ExecError};
use prv_vcs::{CheckoutProvider, Patch, PatchApplier};
use tracing::{debug, info};

#[derive(Clone, Debug)]
pub struct GitAdapter {
    pub timeout: Duration,
}

impl GitAdapter {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn git(dir: &Path) -> CommandSpec {
        CommandSpec::new("git").current_dir(dir)
    }

    /// `git apply` reading the patch from stdin, so the patch never has to
    /// live inside the checkout.
    fn apply_cmd(patch: &Patch, checkout: &WorkingCheckout, check_only: bool) -> CommandSpec {
        let mut spec = Self::git(checkout.root()).arg("apply");
        if check_only {
            spec = spec.arg("--check");
        }
        spec.args(["--whitespace=nowarn", "-"]).stdin_bytes(patch.bytes().to_vec())
    }

    fn dry_run(&self, patch: &Patch, checkout: &WorkingCheckout) -> Result<(), PatchApplyError> {
        let out = run_bounded(&Self::apply_cmd(patch, checkout, true), self.timeout).map_err(tool_error)?;
        if !out.success() {
            return Err(PatchApplyError::Conflict { reason: out.stderr.trim().to_string() });
        }
        Ok(())
    }
}

fn tool_error(e: ExecError) -> PatchApplyError {
    match e {
        ExecError::TimedOut(t) => PatchApplyError::TimedOut(t),
        e => PatchApplyError::Tool { reason: e.to_string() },
    }
}

impl PatchApplier for GitAdapter {
    fn check(&self, patch: &Patch, checkout: &WorkingCheckout) -> bool {
        let ok = self.dry_run(patch, checkout).is_ok();
        debug!(patch = %patch.path().display(), ok, "git apply --check");
        ok
    }

    fn apply(&self, patch: &Patch, checkout: &mut WorkingCheckout) -> Result<(), PatchApplyError> {
        // git apply is all-or-nothing, but the dry run lets us report a
        // conflict without ever touching the tree.
        self.dry_run(patch, checkout)?;
        let out = run_bounded(&Self::apply_cmd(patch, checkout, false), self.timeout).map_err(tool_error)?;
        if !out.success() {
            return Err(PatchApplyError::Conflict { reason: out.stderr.trim().to_string() });
        }
        info!(patch = %patch.path().display(), root = %checkout.root().display(), "patch applied");
        Ok(())
    }
}

impl CheckoutProvider for GitAdapter {
    fn prepare(&self, repo_url: &str, commit: &str, dest: &Path) -> Result<WorkingCheckout, CheckoutError> {
        let parent = dest.parent().unwrap_or(Path::new("."));
        std::fs::create_dir_all(parent)
            .map_err(|e| CheckoutError::Workdir { path: parent.to_path_buf(), reason: e.to_string() })?;

        info!(url = repo_url, dest = %dest.display(), "cloning repository");
        let clone = Self::git(parent).args(["clone", "-q", "--", repo_url]).arg(dest.to_string_lossy());
        run_checked(&clone, self.timeout)
            .map_err(|reason| CheckoutError::Clone { url: repo_url.to_string(), reason })?;

        run_checked(&Self::git(dest).args(["checkout", "-q", "--detach", commit]), self.timeout)
            .map_err(|reason| CheckoutError::Checkout { commit: commit.to_string(), reason })?;
        let head = run_checked(&Self::git(dest).args(["rev-parse", "HEAD"]), self.timeout)
            .map_err(|reason| CheckoutError::Checkout { commit: commit.to_string(), reason })?;
        info!(commit = %head, "checkout pinned");
        Ok(WorkingCheckout::new(dest, head))
    }
}
