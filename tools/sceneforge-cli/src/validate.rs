//! Validate command - check a job document without resolving steps

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use sceneforge_core::{PluginRegistry, Preprocessor};
use sceneforge_shared::{MAX_JOB_BYTES, load_yaml_value};

use crate::config::Config;

/// Arguments for the validate command
#[derive(Args)]
pub struct ValidateArgs {
    /// Job document (YAML)
    pub job: PathBuf,
}

pub fn execute(args: ValidateArgs, config: &Config) -> Result<()> {
    let raw = load_yaml_value(&args.job, MAX_JOB_BYTES)?;
    let registry = PluginRegistry::with_builtins()?;
    let catalog = config.catalog()?;
    let schema = config.schema(&registry, &catalog)?;

    let prepared = Preprocessor::new(&catalog, &schema, &registry).prepare(&raw)?;
    println!(
        "{} is valid ({} step(s), {} texture(s))",
        args.job.display(),
        prepared.steps(),
        prepared.textures().plan().textures().len()
    );
    Ok(())
}
