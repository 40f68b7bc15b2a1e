//! Keyword classification of a PR's task type from its title.
//!
//! The rules are an ordered list and the first match wins, so the order
//! below is load-bearing: a title like "fix: add regression test" is a
//! bugfix, not a test change.

use regex::Regex;
use std::sync::LazyLock;

pub const UNKNOWN: &str = "unknown";
pub const OTHER: &str = "other";

static RULES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("feature", r"\b(feat|feature)\b"),
        ("bugfix", r"\b(fix|bug)\b"),
        ("refactor", r"\b(refactor)\b"),
        ("docs", r"\b(docs|doc|readme)\b"),
        ("test", r"\b(test|tests)\b"),
        ("chore", r"\b(chore)\b"),
        ("build", r"\b(build)\b"),
        ("perf", r"\b(perf|performance)\b"),
        ("style", r"\b(style|format|lint)\b"),
        ("ci", r"\b(ci)\b"),
        ("revert", r"\b(revert)\b"),
    ]
    .into_iter()
    .map(|(label, pattern)| {
        let regex = Regex::new(&format!("(?i){}", pattern))
            .unwrap_or_else(|e| panic!("invalid task-type pattern {}: {}", pattern, e));
        (label, regex)
    })
    .collect()
});

/// Classify a PR title. Blank or missing titles are `unknown`; titles that
/// match no rule are `other`.
pub fn infer_task_type(title: Option<&str>) -> &'static str {
    let title = match title {
        Some(t) if !t.trim().is_empty() => t,
        _ => return UNKNOWN,
    };
    for (label, regex) in RULES.iter() {
        if regex.is_match(title) {
            return label;
        }
    }
    OTHER
}
