use std::path::Path;
use std::process::Command;

use anyhow::{anyhow, Context, Result};
use prv_core::{PatchApplyError, PatchKind, WorkingCheckout};

use crate::types::{Patch, PatchApplier};

/// Shared behaviour every `PatchApplier` must show. `checkout` must be a clean
/// fixture made by `init_git_repo`.
pub fn run_patch_applier_contract(applier: &dyn PatchApplier, checkout: &mut WorkingCheckout) -> Result<()> {
    let root = checkout.root().to_path_buf();
    let good = make_patch(&root, PatchKind::Test, "README.md", "fixture\ncontract line\n")?;
    let bad = Patch::from_bytes(
        PatchKind::Solution,
        "solution.patch",
        "--- a/README.md\n+++ b/README.md\n@@ -1 +1 @@\n-not what is there\n+replacement\n",
    );

    let first = applier.check(&good, checkout);
    let second = applier.check(&good, checkout);
    if !first || first != second {
        return Err(anyhow!("check must be repeatable and accept a clean patch"));
    }
    if applier.check(&bad, checkout) {
        return Err(anyhow!("check accepted a patch that cannot apply"));
    }

    let before = std::fs::read_to_string(root.join("README.md"))?;
    match applier.apply(&bad, checkout) {
        Err(PatchApplyError::Conflict { .. }) => {}
        other => return Err(anyhow!("expected conflict, got {:?}", other)),
    }
    if std::fs::read_to_string(root.join("README.md"))? != before {
        return Err(anyhow!("failed apply modified the checkout"));
    }

    applier.apply(&good, checkout).map_err(|e| anyhow!("apply clean patch: {e}"))?;
    let after = std::fs::read_to_string(root.join("README.md"))?;
    if !after.contains("contract line") {
        return Err(anyhow!("applied patch not reflected in the tree"));
    }
    // Applying the same diff twice must now conflict.
    if applier.check(&good, checkout) {
        return Err(anyhow!("patch still checks clean after it was applied"));
    }
    Ok(())
}

/// Initialize a minimal git repo fixture with one commit. Returns the commit id.
pub fn init_git_repo(dir: &Path) -> Result<String> {
    run(dir, &["git", "init", "-q"])?;
    run(dir, &["git", "config", "user.email", "prv@example.com"])?;
    run(dir, &["git", "config", "user.name", "prv"])?;
    std::fs::write(dir.join("README.md"), "fixture\n")?;
    run(dir, &["git", "add", "."])?;
    run(dir, &["git", "commit", "-q", "-m", "init"])?;
    let out = Command::new("git").args(["rev-parse", "HEAD"]).current_dir(dir).output()?;
    Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
}

/// Produce a patch that rewrites `file` to `contents`, then restore the tree.
pub fn make_patch(dir: &Path, kind: PatchKind, file: &str, contents: &str) -> Result<Patch> {
    let path = dir.join(file);
    let existed = path.exists();
    let original = if existed { Some(std::fs::read(&path)?) } else { None };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, contents)?;
    if !existed {
        run(dir, &["git", "add", "-N", file])?;
    }
    let out = Command::new("git").args(["diff", "--binary"]).current_dir(dir).output().context("git diff")?;
    if !out.status.success() {
        return Err(anyhow!("git diff failed"));
    }
    match original {
        Some(bytes) => std::fs::write(&path, bytes)?,
        None => {
            run(dir, &["git", "reset", "-q", "--", file])?;
            std::fs::remove_file(&path)?;
        }
    }
    Ok(Patch::from_bytes(kind, kind.file_name(), out.stdout))
}

fn run(dir: &Path, args: &[&str]) -> Result<()> {
    let mut cmd = Command::new(args[0]);
    cmd.args(&args[1..]).current_dir(dir);
    let out = cmd.output().with_context(|| format!("run {:?}", args))?;
    if !out.status.success() {
        return Err(anyhow!(
            "command failed: {:?}\nstdout:{}\nstderr:{}",
            args,
            String::from_utf8_lossy(&out.stdout),
            String::from_utf8_lossy(&out.stderr)
        ));
    }
    Ok(())
}
