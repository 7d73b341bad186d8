//! sceneforge.toml tool configuration
//!
//! Shared by every command: where asset libraries live, where the catalog
//! and schema are cached, and where run directories are written.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sceneforge_core::catalog::crawl;
use sceneforge_core::{Catalog, CompositeSchema, PluginRegistry, SchemaComposer};
use sceneforge_shared::{MAX_CONFIG_BYTES, read_to_string_with_limit};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const CONFIG_FILE: &str = "sceneforge.toml";

/// Tool configuration.
///
/// Every field is optional; missing ones fall back to the platform data
/// directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Search roots for asset libraries.
    pub library_paths: Vec<PathBuf>,
    /// Cached catalog written by `crawl`.
    pub catalog_path: Option<PathBuf>,
    /// Cached composite schema written by `schema`.
    pub schema_path: Option<PathBuf>,
    /// Parent of the timestamped run directories.
    pub output_dir: Option<PathBuf>,
    /// Thread count for step resolution (defaults to one per core).
    pub workers: Option<usize>,
}

/// Returns the platform-specific configuration directory.
///
/// Returns `None` if the home directory cannot be determined.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io.sceneforge", "", "Sceneforge")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Returns the platform-specific data directory for catalogs and runs.
pub fn data_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io.sceneforge", "", "Sceneforge")
        .map(|dirs| dirs.data_dir().to_path_buf())
}

impl Config {
    /// Load `explicit`, or sceneforge.toml from the config directory.
    ///
    /// A missing default file yields the defaults; a missing explicit file
    /// or a malformed one is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match config_dir().map(|dir| dir.join(CONFIG_FILE)) {
                Some(path) if path.is_file() => path,
                _ => {
                    debug!("No {} found, using defaults", CONFIG_FILE);
                    return Ok(Self::default());
                }
            },
        };

        let content = read_to_string_with_limit(&path, MAX_CONFIG_BYTES)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let base = path.parent().unwrap_or(Path::new("."));
        Self::parse(&content, base).with_context(|| format!("Invalid config: {}", path.display()))
    }

    /// Parse config text, resolving relative paths against `base_dir`.
    pub fn parse(content: &str, base_dir: &Path) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        if config.workers == Some(0) {
            anyhow::bail!("workers must be at least 1");
        }
        for path in &mut config.library_paths {
            *path = base_dir.join(&*path);
        }
        for path in [
            &mut config.catalog_path,
            &mut config.schema_path,
            &mut config.output_dir,
        ]
        .into_iter()
        .flatten()
        {
            *path = base_dir.join(&*path);
        }
        Ok(config)
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.catalog_path
            .clone()
            .unwrap_or_else(|| default_path("asset_catalog.yaml"))
    }

    pub fn schema_path(&self) -> PathBuf {
        self.schema_path
            .clone()
            .unwrap_or_else(|| default_path("job_schema.yaml"))
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| default_path("runs"))
    }

    /// The cached catalog, or a fresh crawl of the library paths when no
    /// catalog has been written yet.
    pub fn catalog(&self) -> Result<Catalog> {
        let path = self.catalog_path();
        if path.is_file() {
            debug!("Loading catalog {}", path.display());
            return Ok(Catalog::load(&path)?);
        }
        if self.library_paths.is_empty() {
            info!("No catalog at {} and no library paths configured", path.display());
            return Ok(Catalog::new());
        }
        Ok(crawl(&self.library_paths)?)
    }

    /// The cached schema, or one composed from `registry` and `catalog`.
    pub fn schema(&self, registry: &PluginRegistry, catalog: &Catalog) -> Result<CompositeSchema> {
        let path = self.schema_path();
        if path.is_file() {
            debug!("Loading schema {}", path.display());
            return Ok(CompositeSchema::load(&path)?);
        }
        Ok(SchemaComposer::with_base_schema()?
            .plugins(registry)
            .catalog(catalog)
            .build()?)
    }
}

fn default_path(name: &str) -> PathBuf {
    data_dir().unwrap_or_else(|| PathBuf::from(".")).join(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolves_relative_paths() {
        let config = Config::parse(
            "library_paths = [\"assets\", \"/abs/libs\"]\ncatalog_path = \"cache/catalog.yaml\"\nworkers = 4\n",
            Path::new("/home/user/project"),
        )
        .unwrap();
        assert_eq!(
            config.library_paths,
            [
                PathBuf::from("/home/user/project/assets"),
                PathBuf::from("/abs/libs")
            ]
        );
        assert_eq!(
            config.catalog_path(),
            PathBuf::from("/home/user/project/cache/catalog.yaml")
        );
        assert_eq!(config.workers, Some(4));
        assert_eq!(config.schema_path, None);
    }

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(Config::parse("", Path::new(".")).unwrap(), Config::default());
    }

    #[test]
    fn test_malformed_config_is_error() {
        assert!(Config::parse("library_paths = 3", Path::new(".")).is_err());
        assert!(Config::parse("workers = 0", Path::new(".")).is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "output_dir = \"runs\"\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.output_dir(), dir.path().join("runs"));
        assert!(Config::load(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn test_oversized_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let padding = "#".repeat(MAX_CONFIG_BYTES as usize + 1);
        std::fs::write(&path, padding).unwrap();

        let err = Config::load(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("File too large"));
    }

    #[test]
    fn test_catalog_falls_back_to_crawl() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path().join("lib");
        std::fs::create_dir_all(&lib).unwrap();
        std::fs::write(
            lib.join("assets.yaml"),
            "name: Plugins\nassets:\n  Mover:\n    type: plugin\n",
        )
        .unwrap();

        let config = Config {
            library_paths: vec![dir.path().to_path_buf()],
            catalog_path: Some(dir.path().join("absent.yaml")),
            ..Config::default()
        };
        let catalog = config.catalog().unwrap();
        assert!(catalog.get("Plugins/Mover").is_some());
    }
}
