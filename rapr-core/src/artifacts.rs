//! Stage-to-stage artifacts.
//!
//! Every stage materializes exactly one flat CSV file in the derived
//! directory (the sampler also writes a JSON manifest). Readers validate the
//! header against the stage's minimal column set before deserializing and
//! tolerate any extra columns.

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

pub const AGENT_PRS: &str = "agent_prs.csv";
pub const COMMENTS_TASK_TYPE: &str = "review_comments_task_type.csv";
pub const PR_LEVEL: &str = "commented_raprs_pr_level.csv";
pub const SAMPLE: &str = "ground_truth_sample.csv";
pub const SAMPLE_MANIFEST: &str = "sample_manifest.json";
pub const SAMPLE_COMMENTS: &str = "ground_truth_review_comments.csv";
pub const FINAL_COMMENTS: &str = "final_blocking_comments.csv";

/// Write rows to a CSV artifact, creating the parent directory if needed.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create artifact {}", path.display()))?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("Failed to write row to {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to flush artifact {}", path.display()))?;
    Ok(())
}

/// Read a CSV artifact, failing fast if the file is missing or its header
/// lacks any of the required columns.
///
/// `produced_by` names the stage that writes this artifact, so the error for
/// a missing file tells the operator which stage to run first.
pub fn read_csv<T: DeserializeOwned>(
    path: &Path,
    required_columns: &[&str],
    produced_by: &str,
) -> Result<Vec<T>> {
    if !path.exists() {
        bail!(
            "Missing artifact {} (run `rapr {}` first)",
            path.display(),
            produced_by
        );
    }
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open artifact {}", path.display()))?;
    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read header of {}", path.display()))?
        .clone();
    let missing: Vec<&str> = required_columns
        .iter()
        .filter(|c| !headers.iter().any(|h| h == **c))
        .copied()
        .collect();
    if !missing.is_empty() {
        bail!(
            "Artifact {} is missing required columns [{}]; found [{}]",
            path.display(),
            missing.join(", "),
            headers.iter().collect::<Vec<_>>().join(", ")
        );
    }
    let mut rows = Vec::new();
    for (line, record) in reader.deserialize::<T>().enumerate() {
        let row = record
            .with_context(|| format!("Failed to parse row {} of {}", line + 2, path.display()))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Write a JSON artifact (pretty-printed, trailing newline).
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let mut text = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    text.push('\n');
    fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
