use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

fn github_url() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https://github\.com/[\w-]+/[\w.-]+").expect("valid github url regex"))
}

fn commit_sha() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[a-f0-9]{40}\b").expect("valid commit regex"))
}

/// Where the problem's repository lives and which commit it is pinned to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoMetadata {
    pub url: Option<String>,
    pub commit: Option<String>,
}

impl RepoMetadata {
    /// First GitHub repository URL and first full commit id in `text`.
    pub fn scrape(text: &str) -> Self {
        let url = github_url().find(text).map(|m| {
            let s = m.as_str().trim_end_matches('.');
            s.strip_suffix(".git").unwrap_or(s).to_string()
        });
        let commit = commit_sha().find(text).map(|m| m.as_str().to_string());
        Self { url, commit }
    }

    /// Explicit values win over scraped ones.
    pub fn with_overrides(self, url: Option<String>, commit: Option<String>) -> Self {
        Self { url: url.or(self.url), commit: commit.or(self.commit) }
    }

    pub fn is_complete(&self) -> bool {
        self.url.is_some() && self.commit.is_some()
    }
}
