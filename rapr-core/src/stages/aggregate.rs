//! PR-Level Aggregator: collapse comment rows into one row per rejected
//! PR, with comment-volume statistics and the majority task type.

use anyhow::Result;
use std::collections::{HashMap, HashSet};
use tracing::info;

use crate::artifacts;
use crate::config::PipelineConfig;
use crate::model::{AgentPr, CommentRow, PrAggregate, PrOutcome};

pub fn run(config: &PipelineConfig) -> Result<()> {
    info!("=== Build PR-level commented rejected PRs ===");
    let comments: Vec<CommentRow> = artifacts::read_csv(
        &config.artifact_path(artifacts::COMMENTS_TASK_TYPE),
        &["full_name", "number"],
        "join-comments",
    )?;
    let pr_rows: Vec<AgentPr> = artifacts::read_csv(
        &config.artifact_path(artifacts::AGENT_PRS),
        &["full_name", "number", "pr_outcome"],
        "filter-prs",
    )?;

    let rows = aggregate_by_pr(&comments, &pr_rows);

    let path = config.artifact_path(artifacts::PR_LEVEL);
    artifacts::write_csv(&path, &rows)?;
    info!(
        "Wrote {} ({} unique commented rejected PRs)",
        path.display(),
        rows.len()
    );
    Ok(())
}

pub fn aggregate_by_pr(comments: &[CommentRow], pr_rows: &[AgentPr]) -> Vec<PrAggregate> {
    let rejected: HashMap<(String, i64), &AgentPr> = pr_rows
        .iter()
        .filter(|pr| pr.pr_outcome == PrOutcome::Rejected)
        .map(|pr| (pr.key(), pr))
        .collect();

    // Group in first-encounter order so output order is deterministic.
    let mut order: Vec<(String, i64)> = Vec::new();
    let mut groups: HashMap<(String, i64), Vec<&CommentRow>> = HashMap::new();
    for comment in comments {
        let key = comment.key();
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(comment);
    }

    let mut rows = Vec::with_capacity(order.len());
    for key in order {
        let group = &groups[&key];
        let commenters: HashSet<&str> = group
            .iter()
            .filter_map(|c| c.user.as_deref())
            .collect();
        let timestamps = group.iter().filter_map(|c| c.created_at);

        let (agent_type, pr_outcome, created_at, closed_at, turnaround, title) =
            match rejected.get(&key) {
                Some(pr) => (
                    pr.agent_type.clone(),
                    pr.pr_outcome,
                    pr.created_at,
                    pr.closed_at,
                    pr.turnaround_time_hours,
                    pr.title.clone(),
                ),
                // Comment rows already carry the PR metadata they were
                // enriched with; fall back to it if the PR artifact drifted.
                None => (
                    group[0].agent_type.clone(),
                    group[0].pr_outcome,
                    None,
                    None,
                    None,
                    group[0].title.clone(),
                ),
            };
        if pr_outcome != PrOutcome::Rejected {
            continue;
        }

        rows.push(PrAggregate {
            full_name: key.0,
            number: key.1,
            n_comments: group.len() as u64,
            n_unique_commenters: commenters.len() as u64,
            first_comment_at: timestamps.clone().min(),
            last_comment_at: timestamps.max(),
            task_type_majority: majority_task_type(group),
            agent_type,
            pr_outcome,
            created_at,
            closed_at,
            turnaround_time_hours: turnaround,
            title,
        });
    }
    rows
}

/// Most frequent task type among a PR's comments; frequency ties go to the
/// first-encountered value.
fn majority_task_type(group: &[&CommentRow]) -> String {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for comment in group {
        match counts.iter_mut().find(|(t, _)| *t == comment.task_type) {
            Some((_, n)) => *n += 1,
            None => counts.push((&comment.task_type, 1)),
        }
    }
    // max_by would return the last maximal element; ties must go to the
    // first-encountered task type, so keep only strictly larger counts.
    let mut best: Option<(&str, usize)> = None;
    for &(task_type, count) in &counts {
        if best.map(|(_, n)| count > n).unwrap_or(true) {
            best = Some((task_type, count));
        }
    }
    best.map(|(t, _)| t.to_string()).unwrap_or_default()
}
