use std::path::{Path, PathBuf};

use prv_core::BuildError;

/// Container build instructions as found in the problem package.
#[derive(Clone, Debug)]
pub struct BuildRecipe {
    pub path: PathBuf,
    pub contents: String,
}

impl BuildRecipe {
    pub fn read(path: &Path) -> Result<Self, BuildError> {
        let contents = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => BuildError::RecipeMissing { path: path.to_path_buf() },
            _ => BuildError::BuildFailed { log: format!("read {}: {e}", path.display()) },
        })?;
        Ok(Self { path: path.to_path_buf(), contents })
    }

    /// Image references named by `FROM` lines, flags and stage aliases dropped.
    pub fn base_images(&self) -> Vec<String> {
        self.contents
            .lines()
            .map(str::trim)
            .filter_map(|line| {
                let mut words = line.split_whitespace();
                let first = words.next()?;
                if !first.eq_ignore_ascii_case("FROM") {
                    return None;
                }
                words.find(|w| !w.starts_with("--")).map(str::to_string)
            })
            .collect()
    }

    /// Plain containment; the accepted reference may appear anywhere.
    pub fn declares_base_image(&self, accepted: &str) -> bool {
        !accepted.is_empty() && self.contents.contains(accepted)
    }

    pub fn ensure_base_image(&self, accepted: &str) -> Result<(), BuildError> {
        if self.declares_base_image(accepted) {
            return Ok(());
        }
        Err(BuildError::WrongBaseImage { expected: accepted.to_string(), found: self.base_images() })
    }
}
