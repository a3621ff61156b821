use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use prv_package::DescriptionLimits;
use prv_verdict::VerdictPolicy;

pub const CONFIG_FILE: &str = "prv.toml";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub review: ReviewConfig,
    #[serde(default)]
    pub container: ContainerConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub verdict: VerdictPolicy,
    #[serde(default)]
    pub description: DescriptionLimits,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    pub accepted_base_image: String,
    /// Logical tag reused by every build in a run.
    pub image_tag: String,
    /// Wall-clock limit applied to each external command.
    pub command_timeout_secs: u64,
    pub work_root: String,
    pub keep_workdir: bool,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            accepted_base_image: "public.ecr.aws/x8v8d7g8/mars-base:latest".to_string(),
            image_tag: "problem-review-test".to_string(),
            command_timeout_secs: 300,
            work_root: "~/.prv/work".to_string(),
            keep_workdir: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    pub program: String,
    pub entrypoint: String,
    pub network: String,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self { program: "docker".to_string(), entrypoint: "./test.sh".to_string(), network: "none".to_string() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Rebuild before NEW_WITH_SOLUTION even though the tree has not
    /// changed since BASE_WITH_SOLUTION.
    pub rebuild_final_phase: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { rebuild_final_phase: true }
    }
}

impl Config {
    pub fn load_from(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let cfg: Config = toml::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
        Ok(cfg)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let s = toml::to_string_pretty(self).with_context(|| "serialize toml")?;
        std::fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    /// Explicit path first, then `prv.toml` in the problem directory, then
    /// built-in defaults.
    pub fn resolve(explicit: Option<&Path>, problem_dir: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }
        let local = problem_dir.join(CONFIG_FILE);
        if local.is_file() {
            return Self::load_from(&local);
        }
        Ok(Self::default())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.review.command_timeout_secs.max(1))
    }

    pub fn work_root(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.review.work_root).to_string())
    }
}
