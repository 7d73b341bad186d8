//! Crawl command - index asset libraries into a catalog file

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use sceneforge_core::catalog::crawl;
use tracing::info;

use crate::config::Config;

/// Arguments for the crawl command
#[derive(Args)]
pub struct CrawlArgs {
    /// Library search roots (overrides `library_paths` from the config)
    pub roots: Vec<PathBuf>,

    /// Catalog file to write (defaults to the configured catalog path)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Re-check file existence and checksums after crawling
    #[arg(long)]
    pub verify: bool,
}

pub fn execute(args: CrawlArgs, config: &Config) -> Result<()> {
    let roots = if args.roots.is_empty() {
        config.library_paths.clone()
    } else {
        args.roots
    };
    if roots.is_empty() {
        anyhow::bail!("No library paths given and none configured in sceneforge.toml");
    }

    let catalog = crawl(&roots)?;
    if args.verify {
        let checked = catalog.verify()?;
        info!("Verified {} asset file(s)", checked);
    }

    let output = args.output.unwrap_or_else(|| config.catalog_path());
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    catalog.save(&output)?;

    println!(
        "Indexed {} asset(s) in {} librar{} -> {}",
        catalog.len(),
        catalog.libraries().count(),
        if catalog.libraries().count() == 1 { "y" } else { "ies" },
        output.display()
    );
    Ok(())
}
