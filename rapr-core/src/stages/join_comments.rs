//! Comment Joiner: restrict review comments to rejected agent PRs and
//! enrich each surviving comment with its PR's metadata and task type.
//!
//! A comment references its parent PR differently across upstream schema
//! versions: older exports carry an API URL
//! (`.../repos/<owner>/<repo>/pulls/<n>`), newer ones a numeric PR-id
//! foreign key. The deployment picks one strategy in the config; comments
//! whose reference cannot be resolved are dropped, not errored.

use anyhow::Result;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::info;

use crate::artifacts;
use crate::config::{CommentLink, PipelineConfig};
use crate::model::{AgentPr, CommentRow, PrOutcome};
use crate::source::{self, SourceTable};
use crate::task_type::infer_task_type;

static PR_URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"repos/([^/]+/[^/]+)/pulls/(\d+)")
        .unwrap_or_else(|e| panic!("invalid PR URL pattern: {}", e))
});

/// Candidate names for the numeric PR foreign key, tried in order.
const PR_ID_COLUMN_CANDIDATES: &[&str] = &["pull_request_id", "pr_id", "pull_request"];

pub fn run(config: &PipelineConfig) -> Result<()> {
    info!("=== Build review comments on rejected agent PRs ===");
    let pr_rows: Vec<AgentPr> = artifacts::read_csv(
        &config.artifact_path(artifacts::AGENT_PRS),
        &["full_name", "number", "pr_outcome"],
        "filter-prs",
    )?;
    let rejected: Vec<AgentPr> = pr_rows
        .into_iter()
        .filter(|pr| pr.pr_outcome == PrOutcome::Rejected)
        .collect();
    info!("Rejected agent PRs: {}", rejected.len());

    let comments = source::read_table(&config.dataset_root, &config.tables.review_comments)?;
    let rows = join_comments(&comments, &rejected, config.comment_link)?;

    let path = config.artifact_path(artifacts::COMMENTS_TASK_TYPE);
    artifacts::write_csv(&path, &rows)?;
    info!("Wrote {} ({} rows)", path.display(), rows.len());
    log_task_types(&rows);
    Ok(())
}

pub fn join_comments(
    comments: &SourceTable,
    rejected: &[AgentPr],
    link: CommentLink,
) -> Result<Vec<CommentRow>> {
    let by_key: HashMap<(String, i64), &AgentPr> =
        rejected.iter().map(|pr| (pr.key(), pr)).collect();

    let parents = resolve_parents(comments, rejected, link)?;

    let comment_ids = optional_ints(comments, &["id"])?;
    let users = optional_strings(comments, &["user", "user_login"])?;
    let bodies = optional_strings(comments, &["body"])?;
    let created = comments
        .try_resolve_column(&["created_at", "updated_at"])
        .map(|index| comments.timestamp_column(index))
        .transpose()?;
    let paths = optional_strings(comments, &["path"])?;
    let diff_hunks = optional_strings(comments, &["diff_hunk"])?;
    let positions = optional_ints(comments, &["position"])?;

    let mut rows = Vec::new();
    for (i, parent) in parents.iter().enumerate() {
        // Inner join: comments without a rejected parent are dropped.
        let Some(key) = parent else { continue };
        let Some(pr) = by_key.get(key) else { continue };

        rows.push(CommentRow {
            full_name: key.0.clone(),
            number: key.1,
            comment_id: cell(&comment_ids, i),
            user: cell(&users, i),
            body: cell(&bodies, i),
            created_at: created.as_ref().and_then(|values| values[i]),
            path: cell(&paths, i),
            diff_hunk: cell(&diff_hunks, i),
            position: cell(&positions, i),
            agent_type: pr.agent_type.clone(),
            pr_outcome: pr.pr_outcome,
            title: pr.title.clone(),
            task_type: infer_task_type(pr.title.as_deref()).to_string(),
        });
    }
    info!("Review comments on rejected agent PRs: {}", rows.len());
    Ok(rows)
}

/// Resolve each comment row to its parent (full_name, number) key, or `None`
/// when the reference is missing or unparseable.
fn resolve_parents(
    comments: &SourceTable,
    rejected: &[AgentPr],
    link: CommentLink,
) -> Result<Vec<Option<(String, i64)>>> {
    match link {
        CommentLink::PullRequestUrl => {
            let index = comments.resolve_column(&["pull_request_url"])?;
            let urls = comments.string_column(index)?;
            Ok(urls
                .iter()
                .map(|url| url.as_deref().and_then(parse_pr_url))
                .collect())
        }
        CommentLink::PullRequestId => {
            let index = comments.resolve_column(PR_ID_COLUMN_CANDIDATES)?;
            let ids = comments.int_column(index)?;
            let by_id: HashMap<i64, (String, i64)> = rejected
                .iter()
                .filter_map(|pr| pr.id_pr.map(|id| (id, pr.key())))
                .collect();
            Ok(ids
                .iter()
                .map(|id| id.and_then(|id| by_id.get(&id).cloned()))
                .collect())
        }
    }
}

/// Decode `repos/<owner>/<repo>/pulls/<n>` from an API URL.
fn parse_pr_url(url: &str) -> Option<(String, i64)> {
    let captures = PR_URL_PATTERN.captures(url)?;
    let full_name = captures.get(1)?.as_str().to_string();
    let number = captures.get(2)?.as_str().parse::<i64>().ok()?;
    Some((full_name, number))
}

fn optional_ints(table: &SourceTable, candidates: &[&str]) -> Result<Option<Vec<Option<i64>>>> {
    table
        .try_resolve_column(candidates)
        .map(|index| table.int_column(index))
        .transpose()
}

fn optional_strings(
    table: &SourceTable,
    candidates: &[&str],
) -> Result<Option<Vec<Option<String>>>> {
    table
        .try_resolve_column(candidates)
        .map(|index| table.string_column(index))
        .transpose()
}

fn cell<T: Clone>(column: &Option<Vec<Option<T>>>, index: usize) -> Option<T> {
    column.as_ref().and_then(|values| values[index].clone())
}

fn log_task_types(rows: &[CommentRow]) {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for row in rows {
        match counts.iter_mut().find(|(t, _)| *t == row.task_type) {
            Some((_, n)) => *n += 1,
            None => counts.push((row.task_type.clone(), 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    for (task_type, count) in &counts {
        info!("Task type {}: {} comments", task_type, count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::{Int64Array, RecordBatch, StringArray};
    use arrow_schema::{DataType, Field, Schema};
    use std::sync::Arc;

    fn rejected_pr(full_name: &str, number: i64, id_pr: Option<i64>, title: &str) -> AgentPr {
        AgentPr {
            id_pr,
            repo_id: 1,
            full_name: full_name.to_string(),
            stars: 900,
            number,
            agent_type: "devin".to_string(),
            created_at: None,
            closed_at: None,
            merged_at: None,
            turnaround_time_hours: None,
            state: Some("closed".to_string()),
            pr_outcome: PrOutcome::Rejected,
            title: Some(title.to_string()),
            body: None,
        }
    }

    fn url_comments_table(rows: &[(Option<&str>, &str)]) -> SourceTable {
        // (pull_request_url, body)
        let schema = Arc::new(Schema::new(vec![
            Field::new("pull_request_url", DataType::Utf8, true),
            Field::new("body", DataType::Utf8, true),
            Field::new("created_at", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(
                    rows.iter().map(|r| r.0).collect::<Vec<_>>(),
                )),
                Arc::new(StringArray::from(
                    rows.iter().map(|r| Some(r.1)).collect::<Vec<_>>(),
                )),
                Arc::new(StringArray::from(
                    rows.iter()
                        .map(|_| Some("2024-02-01T00:00:00Z"))
                        .collect::<Vec<_>>(),
                )),
            ],
        )
        .unwrap();
        SourceTable::from_batches("review_comments.parquet", vec![batch]).unwrap()
    }

    #[test]
    fn test_url_linkage_inner_join() {
        let rejected = vec![rejected_pr("org/repo", 5, None, "fix: broken parser")];
        let comments = url_comments_table(&[
            (
                Some("https://api.github.com/repos/org/repo/pulls/5"),
                "needs work",
            ),
            (
                Some("https://api.github.com/repos/org/repo/pulls/999"),
                "orphaned",
            ),
            (Some("garbage"), "unparseable"),
            (None, "missing url"),
        ]);
        let rows = join_comments(&comments, &rejected, CommentLink::PullRequestUrl).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].full_name, "org/repo");
        assert_eq!(rows[0].number, 5);
        assert_eq!(rows[0].body.as_deref(), Some("needs work"));
        assert_eq!(rows[0].task_type, "bugfix");
        assert_eq!(rows[0].agent_type, "devin");
    }

    #[test]
    fn test_every_output_key_is_in_the_rejected_set() {
        let rejected = vec![
            rejected_pr("org/a", 1, None, "feat: thing"),
            rejected_pr("org/b", 2, None, "chore: other"),
        ];
        let comments = url_comments_table(&[
            (Some("https://api.github.com/repos/org/a/pulls/1"), "x"),
            (Some("https://api.github.com/repos/org/c/pulls/1"), "y"),
            (Some("https://api.github.com/repos/org/b/pulls/2"), "z"),
            (Some("https://api.github.com/repos/org/b/pulls/3"), "w"),
        ]);
        let rows = join_comments(&comments, &rejected, CommentLink::PullRequestUrl).unwrap();
        let keys: std::collections::HashSet<(String, i64)> =
            rejected.iter().map(|pr| pr.key()).collect();
        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert!(keys.contains(&row.key()));
        }
    }

    #[test]
    fn test_numeric_fk_linkage() {
        let rejected = vec![rejected_pr("org/repo", 5, Some(777), "docs update")];
        let schema = Arc::new(Schema::new(vec![
            Field::new("pr_id", DataType::Int64, true),
            Field::new("body", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![Some(777), Some(888), None])),
                Arc::new(StringArray::from(vec![
                    Some("matched"),
                    Some("unknown pr"),
                    Some("no fk"),
                ])),
            ],
        )
        .unwrap();
        let comments = SourceTable::from_batches("review_comments.parquet", vec![batch]).unwrap();
        let rows = join_comments(&comments, &rejected, CommentLink::PullRequestId).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].body.as_deref(), Some("matched"));
        assert_eq!(rows[0].number, 5);
        assert_eq!(rows[0].task_type, "docs");
    }

    #[test]
    fn test_missing_linkage_column_is_fatal() {
        let rejected = vec![rejected_pr("org/repo", 5, None, "t")];
        let schema = Arc::new(Schema::new(vec![Field::new("body", DataType::Utf8, true)]));
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(StringArray::from(vec![Some("x")]))])
                .unwrap();
        let comments = SourceTable::from_batches("review_comments.parquet", vec![batch]).unwrap();
        assert!(join_comments(&comments, &rejected, CommentLink::PullRequestUrl).is_err());
        assert!(join_comments(&comments, &rejected, CommentLink::PullRequestId).is_err());
    }

    #[test]
    fn test_parse_pr_url() {
        assert_eq!(
            parse_pr_url("https://api.github.com/repos/owner/repo/pulls/123"),
            Some(("owner/repo".to_string(), 123))
        );
        assert_eq!(parse_pr_url("https://github.com/owner/repo"), None);
    }
}
