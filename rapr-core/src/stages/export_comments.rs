//! Ground-Truth Comment Exporter: re-join the full comment history for
//! exactly the sampled PRs, sorted chronologically within each PR.

use anyhow::Result;
use std::collections::HashSet;
use tracing::info;

use crate::artifacts;
use crate::config::PipelineConfig;
use crate::model::{CommentRow, SampledPr};

pub fn run(config: &PipelineConfig) -> Result<()> {
    info!("=== Export review comments for the ground-truth sample ===");
    let sample: Vec<SampledPr> = artifacts::read_csv(
        &config.artifact_path(artifacts::SAMPLE),
        &["full_name", "number"],
        "sample",
    )?;
    let comments: Vec<CommentRow> = artifacts::read_csv(
        &config.artifact_path(artifacts::COMMENTS_TASK_TYPE),
        &["full_name", "number", "created_at"],
        "join-comments",
    )?;

    let rows = export_sampled_comments(&comments, &sample);

    let path = config.artifact_path(artifacts::SAMPLE_COMMENTS);
    artifacts::write_csv(&path, &rows)?;
    info!("Wrote {} ({} comments)", path.display(), rows.len());
    log_volume_summary(&rows);
    Ok(())
}

pub fn export_sampled_comments(comments: &[CommentRow], sample: &[SampledPr]) -> Vec<CommentRow> {
    let keys: HashSet<(String, i64)> = sample.iter().map(|pr| pr.key()).collect();
    let mut rows: Vec<CommentRow> = comments
        .iter()
        .filter(|comment| keys.contains(&comment.key()))
        .cloned()
        .collect();
    // Chronological within each PR; comments without a parseable timestamp
    // sort after the dated ones.
    rows.sort_by(|a, b| {
        (&a.full_name, a.number, a.created_at.is_none(), a.created_at).cmp(&(
            &b.full_name,
            b.number,
            b.created_at.is_none(),
            b.created_at,
        ))
    });
    rows
}

fn log_volume_summary(rows: &[CommentRow]) {
    let mut per_pr: Vec<((String, i64), usize)> = Vec::new();
    for row in rows {
        let key = row.key();
        match per_pr.iter_mut().find(|(k, _)| *k == key) {
            Some((_, n)) => *n += 1,
            None => per_pr.push((key, 1)),
        }
    }
    if per_pr.is_empty() {
        info!("No comments exported");
        return;
    }
    let counts: Vec<usize> = per_pr.iter().map(|(_, n)| *n).collect();
    let min = counts.iter().min().copied().unwrap_or(0);
    let max = counts.iter().max().copied().unwrap_or(0);
    let mean = counts.iter().sum::<usize>() as f64 / counts.len() as f64;
    info!(
        "Unique PRs: {}; comments per PR: min={} mean={:.1} max={}",
        per_pr.len(),
        min,
        mean,
        max
    );
}
