//! Schema command - write the composite job schema

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use sceneforge_core::{PluginRegistry, SchemaComposer};

use crate::config::Config;

/// Arguments for the schema command
#[derive(Args)]
pub struct SchemaArgs {
    /// Schema file to write (defaults to the configured schema path)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Leave catalog model references out of the schema
    #[arg(long)]
    pub no_catalog: bool,
}

pub fn execute(args: SchemaArgs, config: &Config) -> Result<()> {
    let registry = PluginRegistry::with_builtins()?;
    let mut composer = SchemaComposer::with_base_schema()?.plugins(&registry);
    if !args.no_catalog {
        composer = composer.catalog(&config.catalog()?);
    }
    let schema = composer.build()?;

    let output = args.output.unwrap_or_else(|| config.schema_path());
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    schema.save(&output)?;
    println!("Schema written to {}", output.display());
    Ok(())
}
