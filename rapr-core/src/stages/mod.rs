//! Pipeline stages, in dependency order. Each stage reads immutable inputs
//! (source tables or upstream artifacts) and overwrites its own artifact
//! deterministically, so re-running any stage is idempotent.

pub mod aggregate;
pub mod export_comments;
pub mod filter_prs;
pub mod final_comment;
pub mod join_comments;
pub mod sample;

use anyhow::Result;

use crate::config::PipelineConfig;

/// Run every stage in dependency order.
pub fn run_all(config: &PipelineConfig) -> Result<()> {
    filter_prs::run(config)?;
    join_comments::run(config)?;
    aggregate::run(config)?;
    sample::run(config)?;
    export_comments::run(config)?;
    final_comment::run(config)?;
    Ok(())
}
