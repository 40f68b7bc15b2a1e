//! Stratified Sampler: draw the fixed-size ground-truth sample of rejected
//! PRs, proportional to agent type, and record an audit manifest.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::artifacts;
use crate::config::PipelineConfig;
use crate::model::{PrAggregate, SampledPr};
use crate::sampling::{stratified_sample, StratumCount};

const STRATIFY_BY: &str = "agent_type";

/// Everything needed to independently reproduce and audit the draw.
#[derive(Debug, Serialize, Deserialize)]
pub struct SampleManifest {
    pub seed: u64,
    pub size: usize,
    pub stratified_by: String,
    pub source: String,
    pub strata: Vec<StratumCount>,
}

pub fn run(config: &PipelineConfig) -> Result<()> {
    info!(
        "=== Sample {} ground-truth rejected PRs (seed {}) ===",
        config.sample.size, config.sample.seed
    );
    let population: Vec<PrAggregate> = artifacts::read_csv(
        &config.artifact_path(artifacts::PR_LEVEL),
        &["full_name", "number", STRATIFY_BY],
        "aggregate",
    )?;
    info!("Population: {} commented rejected PRs", population.len());

    let (sampled, counts) = stratified_sample(
        &population,
        |pr| pr.agent_type.as_str(),
        config.sample.size,
        config.sample.seed,
    )?;

    let rows: Vec<SampledPr> = sampled
        .into_iter()
        .map(|pr| SampledPr {
            full_name: pr.full_name,
            number: pr.number,
            agent_type: pr.agent_type,
            created_at: pr.created_at,
            closed_at: pr.closed_at,
            title: pr.title,
        })
        .collect();

    let path = config.artifact_path(artifacts::SAMPLE);
    artifacts::write_csv(&path, &rows)?;
    info!("Wrote {} ({} rows)", path.display(), rows.len());

    for count in &counts {
        info!(
            "Stratum {}: {} sampled of {}",
            count.stratum, count.sampled, count.population
        );
    }

    let manifest = SampleManifest {
        seed: config.sample.seed,
        size: config.sample.size,
        stratified_by: STRATIFY_BY.to_string(),
        source: artifacts::PR_LEVEL.to_string(),
        strata: counts,
    };
    let manifest_path = config.artifact_path(artifacts::SAMPLE_MANIFEST);
    artifacts::write_json(&manifest_path, &manifest)?;
    info!("Wrote {}", manifest_path.display());
    Ok(())
}
