use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Pipeline configuration, loaded once at startup and threaded explicitly
/// into each stage entry point.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Root directory holding the source Parquet tables.
    pub dataset_root: PathBuf,
    pub tables: TableNames,
    /// Minimum repository star count for a PR to enter the population.
    pub min_stars: i64,
    /// Agent identities whose PRs are kept.
    pub agents: Vec<String>,
    pub paths: Paths,
    #[serde(default)]
    pub sample: SampleConfig,
    /// Which upstream schema the comment table uses to reference its PR.
    /// Pick one per deployment; this is not a fallback chain.
    #[serde(default)]
    pub comment_link: CommentLink,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableNames {
    pub pull_request: String,
    pub repository: String,
    pub review_comments: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Paths {
    /// Directory where stage artifacts are written. Created if absent.
    pub derived_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SampleConfig {
    #[serde(default = "default_sample_size")]
    pub size: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_sample_size() -> usize {
    200
}

fn default_seed() -> u64 {
    2025
}

impl Default for SampleConfig {
    fn default() -> Self {
        SampleConfig {
            size: default_sample_size(),
            seed: default_seed(),
        }
    }
}

/// How a review comment row references its parent PR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentLink {
    /// Decode owner/repo and PR number from a `pull_request_url` column
    /// (`.../repos/<owner>/<repo>/pulls/<n>`).
    #[default]
    PullRequestUrl,
    /// Use a direct numeric PR-id foreign key column.
    PullRequestId,
}

impl PipelineConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: PipelineConfig = serde_yaml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.agents.is_empty() {
            bail!("Config error: 'agents' must list at least one agent identity");
        }
        if self.sample.size == 0 {
            bail!("Config error: 'sample.size' must be positive");
        }
        if self.min_stars < 0 {
            bail!("Config error: 'min_stars' must be non-negative");
        }
        Ok(())
    }

    pub fn agent_set(&self) -> HashSet<&str> {
        self.agents.iter().map(String::as_str).collect()
    }

    /// Path of a stage artifact inside the derived directory.
    pub fn artifact_path(&self, file_name: &str) -> PathBuf {
        self.paths.derived_dir.join(file_name)
    }
}
