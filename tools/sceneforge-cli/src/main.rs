//! Sceneforge CLI - asset catalogs and job preprocessing
//!
//! # Commands
//!
//! - `sceneforge crawl` - Index asset libraries into a catalog file
//! - `sceneforge schema` - Write the composite job schema
//! - `sceneforge validate` - Check a job document without resolving it
//! - `sceneforge preprocess` - Resolve every step of a job into a run directory
//! - `sceneforge plugins` - List the registered plugins
//!
//! # Configuration (sceneforge.toml)
//!
//! ```toml
//! library_paths = ["assets", "/mnt/shared/libraries"]
//! catalog_path = "asset_catalog.yaml"
//! output_dir = "runs"
//! workers = 8
//! ```
//!
//! Relative paths are resolved against the directory holding the file.

mod config;
mod crawl;
mod plugins;
mod preprocess;
mod schema;
mod validate;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Sceneforge CLI - asset catalogs and job preprocessing
#[derive(Parser)]
#[command(name = "sceneforge")]
#[command(about = "Procedural scene configuration for synthetic data jobs")]
#[command(version)]
struct Cli {
    /// Path to sceneforge.toml (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index asset libraries into a catalog file
    Crawl(crawl::CrawlArgs),

    /// Write the composite job schema
    Schema(schema::SchemaArgs),

    /// Check a job document against the schema and the catalog
    Validate(validate::ValidateArgs),

    /// Resolve every step of a job into a run directory
    Preprocess(preprocess::PreprocessArgs),

    /// List the registered plugins
    Plugins,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Crawl(args) => crawl::execute(args, &config),
        Commands::Schema(args) => schema::execute(args, &config),
        Commands::Validate(args) => validate::execute(args, &config),
        Commands::Preprocess(args) => preprocess::execute(args, &config),
        Commands::Plugins => plugins::execute(),
    }
}
