//! Agent-PR Filter: narrow the pull-request table to agent-authored PRs in
//! popular repositories, with outcome and turnaround derived per row.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::info;

use crate::artifacts;
use crate::config::PipelineConfig;
use crate::model::{AgentPr, PrOutcome};
use crate::source::{self, SourceTable};

/// Upstream schema drift: some dataset versions call the column `agent`,
/// newer ones `agent_type`.
const AGENT_COLUMN_CANDIDATES: &[&str] = &["agent", "agent_type"];

pub fn run(config: &PipelineConfig) -> Result<()> {
    info!(
        "=== Build agent PRs (repositories with >= {} stars) ===",
        config.min_stars
    );
    let repositories = source::read_table(&config.dataset_root, &config.tables.repository)?;
    let pull_requests = source::read_table(&config.dataset_root, &config.tables.pull_request)?;

    let rows = build_agent_prs(&pull_requests, &repositories, config)?;

    let path = config.artifact_path(artifacts::AGENT_PRS);
    artifacts::write_csv(&path, &rows)?;
    info!("Wrote {} ({} rows)", path.display(), rows.len());
    log_distributions(&rows);
    Ok(())
}

pub fn build_agent_prs(
    pull_requests: &SourceTable,
    repositories: &SourceTable,
    config: &PipelineConfig,
) -> Result<Vec<AgentPr>> {
    let popular = popular_repositories(repositories, config.min_stars)?;
    info!("Popular repositories: {}", popular.len());

    let agent_index = pull_requests
        .resolve_column(AGENT_COLUMN_CANDIDATES)
        .context("Could not find an agent column in the pull request table")?;
    let repo_id_index = pull_requests.resolve_column(&["repo_id"])?;
    let number_index = pull_requests.resolve_column(&["number"])?;

    let agents = pull_requests.string_column(agent_index)?;
    let repo_ids = pull_requests.int_column(repo_id_index)?;
    let numbers = pull_requests.int_column(number_index)?;
    let ids = optional_ints(pull_requests, &["id", "id_pr"])?;
    let created = optional_timestamps(pull_requests, "created_at")?;
    let closed = optional_timestamps(pull_requests, "closed_at")?;
    let merged = optional_timestamps(pull_requests, "merged_at")?;
    let states = optional_strings(pull_requests, "state")?;
    let titles = optional_strings(pull_requests, "title")?;
    let bodies = optional_strings(pull_requests, "body")?;

    let accepted = config.agent_set();
    let mut in_popular = 0usize;
    let mut rows = Vec::new();
    for i in 0..pull_requests.num_rows() {
        let Some(repo_id) = repo_ids[i] else { continue };
        let Some((full_name, stars)) = popular.get(&repo_id) else {
            continue;
        };
        in_popular += 1;

        let Some(agent_type) = agents[i].as_deref() else {
            continue;
        };
        if !accepted.contains(agent_type) {
            continue;
        }
        let Some(number) = numbers[i] else { continue };

        let created_at = cell(&created, i);
        let closed_at = cell(&closed, i);
        let merged_at = cell(&merged, i);
        let state = cell(&states, i);
        let turnaround_time_hours = match (created_at, closed_at) {
            (Some(start), Some(end)) => {
                Some((end - start).num_milliseconds() as f64 / 3_600_000.0)
            }
            _ => None,
        };

        rows.push(AgentPr {
            id_pr: cell(&ids, i),
            repo_id,
            full_name: full_name.clone(),
            stars: *stars,
            number,
            agent_type: agent_type.to_string(),
            created_at,
            closed_at,
            merged_at,
            turnaround_time_hours,
            pr_outcome: PrOutcome::derive(merged_at, state.as_deref()),
            state,
            title: cell(&titles, i),
            body: cell(&bodies, i),
        });
    }

    info!("PRs in popular repositories: {}", in_popular);
    info!("Agent PRs (target agents): {}", rows.len());
    Ok(rows)
}

/// Repositories at or above the star threshold, keyed by repository id.
fn popular_repositories(
    repositories: &SourceTable,
    min_stars: i64,
) -> Result<HashMap<i64, (String, i64)>> {
    let stars_index = repositories
        .resolve_column(&["stars"])
        .context("Repository table is missing a popularity field")?;
    let id_index = repositories.resolve_column(&["id"])?;
    let name_index = repositories.resolve_column(&["full_name"])?;

    let stars = repositories.int_column(stars_index)?;
    let ids = repositories.int_column(id_index)?;
    let names = repositories.string_column(name_index)?;

    let mut popular = HashMap::new();
    for i in 0..repositories.num_rows() {
        let (Some(id), Some(name), Some(stars)) = (ids[i], names[i].as_deref(), stars[i]) else {
            continue;
        };
        if stars >= min_stars {
            popular.insert(id, (name.to_string(), stars));
        }
    }
    Ok(popular)
}

fn optional_ints(table: &SourceTable, candidates: &[&str]) -> Result<Option<Vec<Option<i64>>>> {
    table
        .try_resolve_column(candidates)
        .map(|index| table.int_column(index))
        .transpose()
}

fn optional_strings(table: &SourceTable, name: &str) -> Result<Option<Vec<Option<String>>>> {
    table
        .try_resolve_column(&[name])
        .map(|index| table.string_column(index))
        .transpose()
}

fn optional_timestamps(
    table: &SourceTable,
    name: &str,
) -> Result<Option<Vec<Option<DateTime<Utc>>>>> {
    table
        .try_resolve_column(&[name])
        .map(|index| table.timestamp_column(index))
        .transpose()
}

fn cell<T: Clone>(column: &Option<Vec<Option<T>>>, index: usize) -> Option<T> {
    column.as_ref().and_then(|values| values[index].clone())
}

fn log_distributions(rows: &[AgentPr]) {
    let mut outcomes: HashMap<PrOutcome, usize> = HashMap::new();
    let mut agents: Vec<(String, usize)> = Vec::new();
    for row in rows {
        *outcomes.entry(row.pr_outcome).or_default() += 1;
        match agents.iter_mut().find(|(a, _)| *a == row.agent_type) {
            Some((_, n)) => *n += 1,
            None => agents.push((row.agent_type.clone(), 1)),
        }
    }
    info!(
        "Outcome counts: MERGED={} REJECTED={} OPEN={}",
        outcomes.get(&PrOutcome::Merged).copied().unwrap_or(0),
        outcomes.get(&PrOutcome::Rejected).copied().unwrap_or(0),
        outcomes.get(&PrOutcome::Open).copied().unwrap_or(0),
    );
    for (agent, count) in &agents {
        info!("Agent {}: {} PRs", agent, count);
    }
}
