//! Asset catalog.
//!
//! A catalog indexes every asset of every discovered asset library by
//! `(library, key)`. Libraries are directories with an `assets.yaml`
//! manifest; see [`crawl`] for the discovery rules.

mod crawl;
mod pattern;
mod verify;

use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::ResolveError;

pub use crawl::{MANIFEST_NAME, crawl};
pub use pattern::glob_match;

/// Kind of a catalogued asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Model,
    PbrTexture,
    EnvironmentTexture,
    Plugin,
    Sensor,
    Output,
    Texture,
}

impl AssetType {
    pub const ALL: [AssetType; 7] = [
        AssetType::Model,
        AssetType::PbrTexture,
        AssetType::EnvironmentTexture,
        AssetType::Plugin,
        AssetType::Sensor,
        AssetType::Output,
        AssetType::Texture,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AssetType::Model => "model",
            AssetType::PbrTexture => "pbr_texture",
            AssetType::EnvironmentTexture => "environment_texture",
            AssetType::Plugin => "plugin",
            AssetType::Sensor => "sensor",
            AssetType::Output => "output",
            AssetType::Texture => "texture",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One catalogued asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(skip)]
    pub library: String,
    #[serde(skip)]
    pub key: String,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Every `*filepath*` field, resolved to absolute paths.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub files: IndexMap<String, Vec<PathBuf>>,
    /// Expected SHA-256 per file field, from `<field>_sha256`.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub checksums: IndexMap<String, String>,
    /// Remaining manifest fields, kept verbatim.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl CatalogEntry {
    pub fn new(library: &str, key: &str, asset_type: AssetType) -> Self {
        Self {
            library: library.to_string(),
            key: key.to_string(),
            asset_type,
            tags: Vec::new(),
            files: IndexMap::new(),
            checksums: IndexMap::new(),
            metadata: Map::new(),
        }
    }

    /// `"library/key"`, the form selection evaluators produce.
    pub fn reference(&self) -> String {
        format!("{}/{}", self.library, self.key)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// A named asset library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Library {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub root_path: PathBuf,
    #[serde(default)]
    pub assets: IndexMap<String, CatalogEntry>,
}

impl Library {
    pub fn new(name: impl Into<String>, root_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            description: None,
            root_path: root_path.into(),
            assets: IndexMap::new(),
        }
    }

    /// Add an entry, filling in its library name.
    pub fn insert(&mut self, mut entry: CatalogEntry) {
        entry.library = self.name.clone();
        self.assets.insert(entry.key.clone(), entry);
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read {}: {message}", .path.display())]
    Read { path: PathBuf, message: String },

    #[error("failed to write {}: {message}", .path.display())]
    Write { path: PathBuf, message: String },

    #[error("library '{inner}' at {} is nested inside library '{outer}'", .inner_path.display())]
    NestedLibrary {
        inner: String,
        inner_path: PathBuf,
        outer: String,
    },

    #[error("key '{key}' of {} conflicts with library '{library}'", .manifest.display())]
    UnmergeableKey {
        library: String,
        key: String,
        manifest: PathBuf,
    },

    #[error("asset '{key}' is declared more than once in library '{library}'")]
    DuplicateAsset { library: String, key: String },

    #[error("asset '{library}/{key}': {message}")]
    InvalidAsset {
        library: String,
        key: String,
        message: String,
    },

    #[error("asset '{library}/{key}': file {} does not exist", .path.display())]
    MissingFile {
        library: String,
        key: String,
        path: PathBuf,
    },

    #[error("asset '{library}/{key}': checksum mismatch for {}", .path.display())]
    ChecksumMismatch {
        library: String,
        key: String,
        path: PathBuf,
    },
}

/// Index of all discovered asset libraries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    libraries: IndexMap<String, Library>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a library. Returns `false` and keeps the existing one if the name
    /// is taken.
    pub fn add_library(&mut self, library: Library) -> bool {
        if self.libraries.contains_key(&library.name) {
            return false;
        }
        self.libraries.insert(library.name.clone(), library);
        true
    }

    pub fn library(&self, name: &str) -> Option<&Library> {
        self.libraries.get(name)
    }

    pub fn libraries(&self) -> impl Iterator<Item = &Library> {
        self.libraries.values()
    }

    /// All entries, library by library, in manifest order.
    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.libraries.values().flat_map(|l| l.assets.values())
    }

    pub fn len(&self) -> usize {
        self.libraries.values().map(|l| l.assets.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up an entry by its `"library/key"` reference.
    pub fn get(&self, reference: &str) -> Option<&CatalogEntry> {
        let (library, key) = reference.split_once('/')?;
        self.libraries.get(library)?.assets.get(key)
    }

    /// Entries matching every given filter.
    pub fn query(
        &self,
        library: Option<&str>,
        asset_type: Option<AssetType>,
        tag: Option<&str>,
    ) -> Vec<&CatalogEntry> {
        self.entries()
            .filter(|e| library.is_none_or(|l| e.library == l))
            .filter(|e| asset_type.is_none_or(|t| e.asset_type == t))
            .filter(|e| tag.is_none_or(|t| e.has_tag(t)))
            .collect()
    }

    /// Entries of `library` whose key matches the glob `pattern`.
    ///
    /// An empty result is not an error here; selection evaluators treat it
    /// as one.
    pub fn resolve_wildcard(
        &self,
        library: &str,
        pattern: &str,
    ) -> Result<Vec<&CatalogEntry>, ResolveError> {
        let lib = self
            .libraries
            .get(library)
            .ok_or_else(|| ResolveError::UnknownLibrary(library.to_string()))?;
        Ok(lib
            .assets
            .values()
            .filter(|e| glob_match(pattern, &e.key))
            .collect())
    }

    /// `"library/key"` of every model asset.
    pub fn model_references(&self) -> Vec<String> {
        self.entries()
            .filter(|e| e.asset_type == AssetType::Model)
            .map(CatalogEntry::reference)
            .collect()
    }

    /// Write the catalog as YAML.
    pub fn save(&self, path: &Path) -> Result<(), CatalogError> {
        let write_err = |message: String| CatalogError::Write {
            path: path.to_path_buf(),
            message,
        };
        let yaml = serde_yaml::to_string(self).map_err(|e| write_err(e.to_string()))?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
        }
        std::fs::write(path, yaml).map_err(|e| write_err(e.to_string()))
    }

    /// Read a catalog written by [`Catalog::save`].
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let read_err = |message: String| CatalogError::Read {
            path: path.to_path_buf(),
            message,
        };
        let content =
            sceneforge_shared::read_to_string_with_limit(path, sceneforge_shared::MAX_MANIFEST_BYTES)
                .map_err(|e| read_err(format!("{e:#}")))?;
        let mut catalog: Catalog =
            serde_yaml::from_str(&content).map_err(|e| read_err(e.to_string()))?;
        catalog.link_entries();
        Ok(catalog)
    }

    /// Restore the names skipped during serialization.
    fn link_entries(&mut self) {
        for (name, library) in &mut self.libraries {
            library.name = name.clone();
            for (key, entry) in &mut library.assets {
                entry.library = name.clone();
                entry.key = key.clone();
            }
        }
    }
}
