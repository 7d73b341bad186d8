//! Preprocess command - resolve every step of a job into a run directory
//!
//! Layout of the run directory:
//! - `step_<n>.yaml` per step, texture handles replaced by PNG paths
//! - `textures/` with one PNG per texture instance (per step if dynamic)
//! - `asset_catalog.yaml`, the catalog extended with the generated textures

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use sceneforge_core::{OutputWriter, PluginRegistry, Preprocessor};
use sceneforge_shared::{MAX_JOB_BYTES, load_yaml_value};
use tracing::info;

use crate::config::Config;

/// Arguments for the preprocess command
#[derive(Args)]
pub struct PreprocessArgs {
    /// Job document (YAML)
    pub job: PathBuf,

    /// Parent directory for the run directory (overrides the config)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Worker threads for step resolution (overrides the config)
    #[arg(short, long)]
    pub workers: Option<usize>,
}

pub fn execute(args: PreprocessArgs, config: &Config) -> Result<()> {
    let raw = load_yaml_value(&args.job, MAX_JOB_BYTES)?;
    let registry = PluginRegistry::with_builtins()?;
    let catalog = config.catalog()?;
    let schema = config.schema(&registry, &catalog)?;

    let prepared = Preprocessor::new(&catalog, &schema, &registry).prepare(&raw)?;

    let mut pool = rayon::ThreadPoolBuilder::new();
    if let Some(workers) = args.workers.or(config.workers) {
        pool = pool.num_threads(workers);
    }
    let pool = pool.build().context("Failed to start worker pool")?;
    info!("Resolving {} step(s) on {} worker(s)", prepared.steps(), pool.current_num_threads());

    let output_dir = args.output_dir.unwrap_or_else(|| config.output_dir());
    let mut writer = OutputWriter::create(&output_dir)?;
    let run_dir = writer.root().to_path_buf();

    pool.install(|| prepared.run_into(&mut writer))?;
    let catalog_path = writer.finish(prepared.catalog())?;

    println!("Preprocessed {} step(s) into {}", prepared.steps(), run_dir.display());
    println!("  Catalog: {}", catalog_path.display());
    Ok(())
}
