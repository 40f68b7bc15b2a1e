//! Row types flowing between pipeline stages.
//!
//! Each stage writes one of these as a CSV artifact and the next stage reads
//! it back. Fields marked `#[serde(default)]` are optional context that older
//! artifacts may lack; everything else is part of the stage contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a pull request. Merged takes precedence over closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrOutcome {
    Merged,
    Rejected,
    Open,
}

impl PrOutcome {
    pub fn derive(merged_at: Option<DateTime<Utc>>, state: Option<&str>) -> Self {
        if merged_at.is_some() {
            PrOutcome::Merged
        } else if state
            .map(|s| s.trim().eq_ignore_ascii_case("closed"))
            .unwrap_or(false)
        {
            PrOutcome::Rejected
        } else {
            PrOutcome::Open
        }
    }
}

/// One agent-authored PR in a popular repository (Agent-PR Filter output).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPr {
    /// Dataset-global PR id, when the source provides one. Needed for the
    /// numeric comment linkage strategy.
    #[serde(default)]
    pub id_pr: Option<i64>,
    pub repo_id: i64,
    pub full_name: String,
    pub stars: i64,
    /// PR number, unique within a repository only.
    pub number: i64,
    pub agent_type: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub turnaround_time_hours: Option<f64>,
    #[serde(default)]
    pub state: Option<String>,
    pub pr_outcome: PrOutcome,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

impl AgentPr {
    pub fn key(&self) -> (String, i64) {
        (self.full_name.clone(), self.number)
    }
}

/// One review comment on a rejected agent PR, enriched with PR metadata
/// (Comment Joiner output).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRow {
    pub full_name: String,
    pub number: i64,
    #[serde(default)]
    pub comment_id: Option<i64>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub diff_hunk: Option<String>,
    #[serde(default)]
    pub position: Option<i64>,
    pub agent_type: String,
    pub pr_outcome: PrOutcome,
    #[serde(default)]
    pub title: Option<String>,
    pub task_type: String,
}

impl CommentRow {
    pub fn key(&self) -> (String, i64) {
        (self.full_name.clone(), self.number)
    }
}

/// One rejected-and-commented PR with aggregate comment statistics
/// (PR-Level Aggregator output).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrAggregate {
    pub full_name: String,
    pub number: i64,
    pub n_comments: u64,
    pub n_unique_commenters: u64,
    #[serde(default)]
    pub first_comment_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_comment_at: Option<DateTime<Utc>>,
    pub task_type_majority: String,
    pub agent_type: String,
    pub pr_outcome: PrOutcome,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub turnaround_time_hours: Option<f64>,
    #[serde(default)]
    pub title: Option<String>,
}

impl PrAggregate {
    pub fn key(&self) -> (String, i64) {
        (self.full_name.clone(), self.number)
    }
}

/// One sampled PR (Stratified Sampler output): the minimal stable
/// identifiers needed to re-join comments and audit the draw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampledPr {
    pub full_name: String,
    pub number: i64,
    pub agent_type: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub title: Option<String>,
}

impl SampledPr {
    pub fn key(&self) -> (String, i64) {
        (self.full_name.clone(), self.number)
    }
}

/// The one selected blocking comment per sampled PR
/// (Final-Comment Selector output): a minimal view for hand-labeling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalBlockingComment {
    pub full_name: String,
    pub number: i64,
    pub agent_type: String,
    pub task_type: String,
    pub final_comment_time: DateTime<Utc>,
    #[serde(default)]
    pub final_blocking_comment: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub diff_hunk: Option<String>,
    #[serde(default)]
    pub position: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn ts(s: &str) -> DateTime<Utc> {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
            .unwrap()
            .and_utc()
    }

    #[test]
    fn test_outcome_merged_takes_precedence_over_closed() {
        let merged = Some(ts("2024-01-02 00:00:00"));
        assert_eq!(PrOutcome::derive(merged, Some("closed")), PrOutcome::Merged);
    }

    #[test]
    fn test_outcome_rejected_requires_closed_and_unmerged() {
        assert_eq!(PrOutcome::derive(None, Some("closed")), PrOutcome::Rejected);
        assert_eq!(PrOutcome::derive(None, Some("CLOSED")), PrOutcome::Rejected);
    }

    #[test]
    fn test_outcome_open_otherwise() {
        assert_eq!(PrOutcome::derive(None, Some("open")), PrOutcome::Open);
        assert_eq!(PrOutcome::derive(None, None), PrOutcome::Open);
    }
}
