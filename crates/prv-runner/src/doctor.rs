use std::time::Duration;

use anyhow::{anyhow, Result};
use prv_exec::{run_checked, CommandSpec};
use tracing::info;

use crate::Config;

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Check that the external tools a review shells out to are callable.
pub fn doctor(cfg: &Config) -> Result<Vec<String>> {
    let mut versions = Vec::new();
    for program in ["git", cfg.container.program.as_str()] {
        let version = run_checked(&CommandSpec::new(program).arg("--version"), PROBE_TIMEOUT)
            .map_err(|e| anyhow!("`{program} --version` failed; is {program} installed and on PATH?\n{e}"))?;
        info!(program, version = %version, "tool available");
        versions.push(version);
    }
    Ok(versions)
}
