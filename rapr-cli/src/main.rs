use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

use rapr_core::config::PipelineConfig;
use rapr_core::source;
use rapr_core::stages;

/// Rapr: build a labeled dataset of rejected agent pull requests
#[derive(Parser, Debug)]
#[command(name = "rapr")]
#[command(about = "Rejected-agent-PR dataset pipeline", long_about = None)]
struct Cli {
    /// Path to the pipeline configuration file
    #[arg(long, default_value = "config/config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Open every configured source table and report its shape
    Check,
    /// Filter PRs to popular repositories and target agents
    FilterPrs,
    /// Join review comments to rejected PRs and classify task types
    JoinComments,
    /// Collapse comment rows into one row per rejected PR
    Aggregate,
    /// Draw the stratified ground-truth sample
    Sample,
    /// Export the full comment history for the sampled PRs
    ExportComments,
    /// Select the final blocking comment for each sampled PR
    FinalComment,
    /// Run every stage in dependency order
    Run,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let cli = Cli::parse();
    let config = PipelineConfig::from_path(&cli.config)?;

    match cli.command {
        Commands::Check => source::sanity_check(&config),
        Commands::FilterPrs => stages::filter_prs::run(&config),
        Commands::JoinComments => stages::join_comments::run(&config),
        Commands::Aggregate => stages::aggregate::run(&config),
        Commands::Sample => stages::sample::run(&config),
        Commands::ExportComments => stages::export_comments::run(&config),
        Commands::FinalComment => stages::final_comment::run(&config),
        Commands::Run => stages::run_all(&config),
    }
}
