use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriptionLimits {
    /// Above this the description is too long.
    pub word_limit: usize,
    /// Above this the description should be trimmed.
    pub soft_limit: usize,
}

impl Default for DescriptionLimits {
    fn default() -> Self {
        Self { word_limit: 250, soft_limit: 200 }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptionAnalysis {
    pub title: Option<String>,
    pub word_count: usize,
    pub issues: Vec<String>,
}

struct Patterns {
    fenced: Regex,
    inline: Regex,
    markup: Regex,
    heading: Regex,
    overspecified: Vec<(Regex, &'static str)>,
    redundant: Vec<Regex>,
}

fn ci(pattern: &str) -> Regex {
    RegexBuilder::new(pattern).case_insensitive(true).build().expect("valid description pattern")
}

fn patterns() -> &'static Patterns {
    static P: OnceLock<Patterns> = OnceLock::new();
    P.get_or_init(|| Patterns {
        fenced: Regex::new(r"(?s)```.*?```").expect("valid fence pattern"),
        inline: Regex::new(r"`[^`]+`").expect("valid inline code pattern"),
        markup: Regex::new(r"[#*_\[\]()>-]").expect("valid markup pattern"),
        heading: Regex::new(r"(?m)^#\s*(.+)$").expect("valid heading pattern"),
        overspecified: vec![
            (ci(r"must be called \w+"), "Names the function to write; check it cannot be inferred from the codebase"),
            (ci(r"located? (?:at|in) [\w/.]+"), "Spells out a file location; check it is not obvious from the codebase"),
            (ci(r"return type"), "Pins down a return type; only do that when it is not obvious"),
            (ci(r"step \d"), "Lists numbered implementation steps"),
            (ci(r"algorithm"), "Prescribes an algorithm instead of the behaviour"),
        ],
        redundant: vec![
            ci(r"don't break existing"),
            ci(r"must be deterministic"),
            ci(r"keep[^.\n]*stable"),
            ci(r"preserve existing"),
            ci(r"must not alter[^.\n]*valid"),
        ],
    })
}

/// Words of prose, ignoring code blocks, inline code and markdown markup.
pub fn count_words(text: &str) -> usize {
    let p = patterns();
    let text = p.fenced.replace_all(text, "");
    let text = p.inline.replace_all(&text, "");
    let text = p.markup.replace_all(&text, " ");
    text.split_whitespace().count()
}

/// First level-one style heading, if any.
pub fn extract_title(text: &str) -> Option<String> {
    patterns()
        .heading
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().trim_start_matches('#').trim().to_string())
        .filter(|t| !t.is_empty())
}

pub fn analyze_description(text: &str, limits: DescriptionLimits) -> DescriptionAnalysis {
    let p = patterns();
    let word_count = count_words(text);
    let mut issues = Vec::new();

    if word_count > limits.word_limit {
        issues.push(format!("Word count ({word_count}) exceeds the {} word target", limits.word_limit));
    } else if word_count > limits.soft_limit {
        issues.push(format!("Word count ({word_count}) is a little high; consider trimming"));
    }

    for (re, message) in &p.overspecified {
        if re.is_match(text) {
            issues.push((*message).to_string());
        }
    }
    for re in &p.redundant {
        if let Some(m) = re.find(text) {
            issues.push(format!("Redundant: \"{}\" is already implied", m.as_str()));
        }
    }

    DescriptionAnalysis { title: extract_title(text), word_count, issues }
}
