use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use prv_core::PatchKind;

pub const DESCRIPTION_NAMES: &[&str] = &["description.md", "problem.md"];
pub const RECIPE_NAMES: &[&str] = &["Dockerfile", "dockerfile"];
pub const SETUP_NOTES_NAMES: &[&str] = &["github-setup.md", "github_setup.md"];

/// The files a problem package is made of. Every entry is optional here;
/// absence is judged later by the structural checks, not by discovery.
#[derive(Clone, Debug, Default)]
pub struct ProblemPackage {
    pub root: PathBuf,
    pub description: Option<PathBuf>,
    pub recipe: Option<PathBuf>,
    pub test_patch: Option<PathBuf>,
    pub solution_patch: Option<PathBuf>,
    pub setup_notes: Option<PathBuf>,
}

impl ProblemPackage {
    pub fn discover(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(anyhow!("problem directory not found: {}", root.display()));
        }
        Ok(Self {
            root: root.to_path_buf(),
            description: find_file(root, DESCRIPTION_NAMES)?,
            recipe: find_file(root, RECIPE_NAMES)?,
            test_patch: find_file(root, &[PatchKind::Test.file_name()])?,
            solution_patch: find_file(root, &[PatchKind::Solution.file_name()])?,
            setup_notes: find_file(root, SETUP_NOTES_NAMES)?,
        })
    }

    pub fn patch_path(&self, kind: PatchKind) -> Option<&Path> {
        match kind {
            PatchKind::Test => self.test_patch.as_deref(),
            PatchKind::Solution => self.solution_patch.as_deref(),
        }
    }

    pub fn read_description(&self) -> Result<Option<String>> {
        read_optional(self.description.as_deref())
    }

    pub fn read_recipe(&self) -> Result<Option<String>> {
        read_optional(self.recipe.as_deref())
    }

    pub fn read_setup_notes(&self) -> Result<Option<String>> {
        read_optional(self.setup_notes.as_deref())
    }
}

fn read_optional(path: Option<&Path>) -> Result<Option<String>> {
    path.map(|p| std::fs::read_to_string(p).with_context(|| format!("read {}", p.display())))
        .transpose()
}

/// First entry of `dir` matching one of `names`: exact match first, then
/// case-insensitive, in the order `names` are given.
pub fn find_file(dir: &Path, names: &[&str]) -> Result<Option<PathBuf>> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("list {}", dir.display()))? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            entries.push(entry.path());
        }
    }
    entries.sort();

    for name in names {
        let exact = dir.join(name);
        if exact.is_file() {
            return Ok(Some(exact));
        }
        let found = entries.iter().find(|p| {
            p.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.eq_ignore_ascii_case(name))
        });
        if let Some(p) = found {
            return Ok(Some(p.clone()));
        }
    }
    Ok(None)
}
