//! Final-Comment Selector: for each sampled PR, pick the temporally last
//! substantive review comment as the likely blocking reason.
//!
//! "Substantive" is a proxy heuristic: non-blank, not a stock
//! acknowledgment, and long enough to plausibly carry a reason. When no
//! comment qualifies, the temporally last comment is kept anyway so every
//! PR with dated comments yields exactly one row.

use anyhow::Result;
use regex::Regex;
use std::sync::LazyLock;
use tracing::info;

use crate::artifacts;
use crate::config::PipelineConfig;
use crate::model::{CommentRow, FinalBlockingComment};

/// Acknowledgments and other trivia that never count as a blocking reason.
/// Each pattern allows optional trailing punctuation.
static TRIVIAL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^\s*$",
        r"(?i)^\s*(lgtm|looks good to me)\s*[.!]?\s*$",
        r"(?i)^\s*(thanks|thank you)\s*[.!]?\s*$",
        r"(?i)^\s*(done|fixed|resolved)\s*[.!]?\s*$",
        r"(?i)^\s*(\+1|👍)\s*$",
    ]
    .into_iter()
    .map(|pattern| {
        Regex::new(pattern).unwrap_or_else(|e| panic!("invalid trivial pattern {}: {}", pattern, e))
    })
    .collect()
});

/// Minimum trimmed length for a comment to plausibly state a reason.
const MIN_SUBSTANTIVE_CHARS: usize = 20;

pub fn run(config: &PipelineConfig) -> Result<()> {
    info!("=== Select final blocking comment per sampled PR ===");
    let comments: Vec<CommentRow> = artifacts::read_csv(
        &config.artifact_path(artifacts::SAMPLE_COMMENTS),
        &["full_name", "number", "created_at"],
        "export-comments",
    )?;

    let rows = select_final_comments(&comments);

    let path = config.artifact_path(artifacts::FINAL_COMMENTS);
    artifacts::write_csv(&path, &rows)?;
    info!("Wrote {} ({} PRs)", path.display(), rows.len());
    Ok(())
}

pub fn is_substantive(text: Option<&str>) -> bool {
    let Some(text) = text else { return false };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }
    if TRIVIAL_PATTERNS.iter().any(|p| p.is_match(trimmed)) {
        return false;
    }
    trimmed.chars().count() >= MIN_SUBSTANTIVE_CHARS
}

/// One row per PR that has at least one comment with a parseable timestamp;
/// PRs with none are skipped entirely.
pub fn select_final_comments(comments: &[CommentRow]) -> Vec<FinalBlockingComment> {
    // Group in first-encounter order (input is already sorted by key).
    let mut groups: Vec<((String, i64), Vec<&CommentRow>)> = Vec::new();
    for comment in comments {
        let key = comment.key();
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, group)) => group.push(comment),
            None => groups.push((key, vec![comment])),
        }
    }

    let mut rows = Vec::new();
    for (_, mut group) in groups {
        group.retain(|c| c.created_at.is_some());
        if group.is_empty() {
            continue;
        }
        group.sort_by_key(|c| c.created_at);
        let picked = pick_final_substantive(&group);
        let Some(final_comment_time) = picked.created_at else {
            continue;
        };
        rows.push(FinalBlockingComment {
            full_name: picked.full_name.clone(),
            number: picked.number,
            agent_type: picked.agent_type.clone(),
            task_type: picked.task_type.clone(),
            final_comment_time,
            final_blocking_comment: picked.body.clone(),
            path: picked.path.clone(),
            diff_hunk: picked.diff_hunk.clone(),
            position: picked.position,
        });
    }
    rows
}

/// Scan backwards through chronologically sorted comments; the temporally
/// last substantive comment wins, else fall back to the last comment.
fn pick_final_substantive<'a>(sorted: &[&'a CommentRow]) -> &'a CommentRow {
    for comment in sorted.iter().rev() {
        if is_substantive(comment.body.as_deref()) {
            return *comment;
        }
    }
    sorted[sorted.len() - 1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PrOutcome;
    use chrono::{DateTime, NaiveDateTime, Utc};

    fn ts(s: &str) -> Option<DateTime<Utc>> {
        Some(
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .unwrap()
                .and_utc(),
        )
    }

    fn comment(number: i64, body: &str, created_at: Option<DateTime<Utc>>) -> CommentRow {
        CommentRow {
            full_name: "org/repo".to_string(),
            number,
            comment_id: None,
            user: None,
            body: Some(body.to_string()),
            created_at,
            path: None,
            diff_hunk: None,
            position: None,
            agent_type: "devin".to_string(),
            pr_outcome: PrOutcome::Rejected,
            title: None,
            task_type: "other".to_string(),
        }
    }

    #[test]
    fn test_substantive_rejects_trivia() {
        assert!(!is_substantive(None));
        assert!(!is_substantive(Some("")));
        assert!(!is_substantive(Some("   ")));
        assert!(!is_substantive(Some("LGTM")));
        assert!(!is_substantive(Some("looks good to me!")));
        assert!(!is_substantive(Some("Thanks.")));
        assert!(!is_substantive(Some("thank you")));
        assert!(!is_substantive(Some("done")));
        assert!(!is_substantive(Some("Fixed!")));
        assert!(!is_substantive(Some("resolved")));
        assert!(!is_substantive(Some("+1")));
        assert!(!is_substantive(Some("👍")));
        // Non-trivial but too short.
        assert!(!is_substantive(Some("needs work")));
    }

    #[test]
    fn test_substantive_accepts_real_feedback() {
        assert!(is_substantive(Some(
            "this breaks the API contract, please revert the interface change"
        )));
    }

    #[test]
    fn test_picks_last_substantive_not_last_overall() {
        let comments = vec![
            comment(1, "lgtm", ts("2024-01-01 00:00:00")),
            comment(
                1,
                "this breaks the API contract, please revert the interface change",
                ts("2024-01-02 00:00:00"),
            ),
            comment(1, "thanks", ts("2024-01-03 00:00:00")),
        ];
        let rows = select_final_comments(&comments);
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].final_blocking_comment.as_deref(),
            Some("this breaks the API contract, please revert the interface change")
        );
        assert_eq!(rows[0].final_comment_time, ts("2024-01-02 00:00:00").unwrap());
    }

    #[test]
    fn test_falls_back_to_last_comment_when_none_substantive() {
        let comments = vec![
            comment(1, "ok", ts("2024-01-01 00:00:00")),
            comment(1, "lgtm", ts("2024-01-02 00:00:00")),
        ];
        let rows = select_final_comments(&comments);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].final_blocking_comment.as_deref(), Some("lgtm"));
    }

    #[test]
    fn test_prs_without_dated_comments_are_skipped() {
        let comments = vec![comment(1, "undated but long enough to be substantive", None)];
        let rows = select_final_comments(&comments);
        assert!(rows.is_empty());
    }

    #[test]
    fn test_one_row_per_pr() {
        let mut comments = vec![
            comment(1, "first PR needs a rebase before review can continue", ts("2024-01-01 00:00:00")),
            comment(2, "second PR duplicates existing functionality, closing", ts("2024-01-01 00:00:00")),
            comment(1, "lgtm", ts("2024-01-02 00:00:00")),
        ];
        comments[1].full_name = "org/other".to_string();
        let rows = select_final_comments(&comments);
        assert_eq!(rows.len(), 2);
    }
}
