//! Library discovery.
//!
//! Rules:
//!
//! - A library root is a directory whose `assets.yaml` has a `name` key.
//! - Manifests below a root without a `name` are sub-manifests; their
//!   `assets` merge into the library. Any other key they repeat is an error.
//! - Library roots may not be nested.
//! - A library name seen twice keeps the first one found.
//! - Every field whose name contains `filepath` is resolved against the
//!   library root and must exist.

use std::path::{Path, PathBuf};

use sceneforge_shared::{MAX_MANIFEST_BYTES, load_yaml_value};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::{AssetType, Catalog, CatalogEntry, CatalogError, Library};

/// File name of a library manifest.
pub const MANIFEST_NAME: &str = "assets.yaml";

const CHECKSUM_SUFFIX: &str = "_sha256";

struct Manifest {
    path: PathBuf,
    dir: PathBuf,
    content: Map<String, Value>,
}

/// Discover every library under `roots` and index its assets.
pub fn crawl<P: AsRef<Path>>(roots: &[P]) -> Result<Catalog, CatalogError> {
    let mut catalog = Catalog::new();
    for root in roots {
        let root = root.as_ref();
        let manifests = find_manifests(root)?;
        debug!(root = %root.display(), manifests = manifests.len(), "found manifests");

        for library in group_libraries(manifests)? {
            let name = library.name.clone();
            let root_path = library.root_path.clone();
            let assets = library.assets.len();
            if catalog.add_library(library) {
                info!(library = %name, assets, path = %root_path.display(), "indexed library");
            } else {
                warn!(
                    library = %name,
                    path = %root_path.display(),
                    "library name already indexed, skipping"
                );
            }
        }
    }
    Ok(catalog)
}

fn find_manifests(root: &Path) -> Result<Vec<Manifest>, CatalogError> {
    let mut manifests = Vec::new();
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| CatalogError::Read {
            path: e.path().unwrap_or(root).to_path_buf(),
            message: e.to_string(),
        })?;
        if !entry.file_type().is_file() || entry.file_name() != MANIFEST_NAME {
            continue;
        }
        let path = entry.path().to_path_buf();
        let value = load_yaml_value(&path, MAX_MANIFEST_BYTES).map_err(|e| CatalogError::Read {
            path: path.clone(),
            message: format!("{e:#}"),
        })?;
        let content = match value {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => {
                return Err(CatalogError::Read {
                    path,
                    message: "manifest must be a mapping".to_string(),
                });
            }
        };
        let dir = path.parent().unwrap_or(root).to_path_buf();
        manifests.push(Manifest { path, dir, content });
    }
    Ok(manifests)
}

fn group_libraries(manifests: Vec<Manifest>) -> Result<Vec<Library>, CatalogError> {
    let (roots, subs): (Vec<_>, Vec<_>) = manifests
        .into_iter()
        .partition(|m| m.content.contains_key("name"));

    for inner in &roots {
        if let Some(outer) = roots
            .iter()
            .find(|o| o.dir != inner.dir && inner.dir.starts_with(&o.dir))
        {
            return Err(CatalogError::NestedLibrary {
                inner: library_name(inner),
                inner_path: inner.dir.clone(),
                outer: library_name(outer),
            });
        }
    }

    let mut merged: Vec<Manifest> = roots;
    for sub in subs {
        let Some(owner) = merged.iter_mut().find(|r| sub.dir.starts_with(&r.dir)) else {
            warn!(path = %sub.path.display(), "manifest without a library name outside any library, skipping");
            continue;
        };
        merge_manifest(owner, sub)?;
    }

    merged.into_iter().map(build_library).collect()
}

fn library_name(manifest: &Manifest) -> String {
    manifest
        .content
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn merge_manifest(owner: &mut Manifest, sub: Manifest) -> Result<(), CatalogError> {
    let library = library_name(owner);
    for (key, value) in sub.content {
        if key != "assets" {
            if owner.content.contains_key(&key) {
                return Err(CatalogError::UnmergeableKey {
                    library,
                    key,
                    manifest: sub.path,
                });
            }
            owner.content.insert(key, value);
            continue;
        }
        let Value::Object(assets) = value else {
            return Err(CatalogError::Read {
                path: sub.path,
                message: "'assets' must be a mapping".to_string(),
            });
        };
        let target = owner
            .content
            .entry("assets")
            .or_insert_with(|| Value::Object(Map::new()));
        let Value::Object(target) = target else {
            return Err(CatalogError::Read {
                path: owner.path.clone(),
                message: "'assets' must be a mapping".to_string(),
            });
        };
        for (asset, body) in assets {
            if target.contains_key(&asset) {
                return Err(CatalogError::DuplicateAsset {
                    library,
                    key: asset,
                });
            }
            target.insert(asset, body);
        }
    }
    debug!(library = %library, path = %owner.dir.display(), "merged sub-manifest");
    Ok(())
}

fn build_library(manifest: Manifest) -> Result<Library, CatalogError> {
    let name = library_name(&manifest);
    if name.is_empty() {
        return Err(CatalogError::Read {
            path: manifest.path,
            message: "'name' must be a non-empty string".to_string(),
        });
    }
    let mut library = Library::new(name.clone(), manifest.dir.clone());
    library.description = manifest
        .content
        .get("description")
        .and_then(Value::as_str)
        .map(str::to_string);

    let assets = match manifest.content.get("assets") {
        Some(Value::Object(assets)) => assets.clone(),
        None | Some(Value::Null) => Map::new(),
        Some(_) => {
            return Err(CatalogError::Read {
                path: manifest.path,
                message: "'assets' must be a mapping".to_string(),
            });
        }
    };

    for (key, body) in &assets {
        library.insert(parse_entry(&name, key, body, &manifest.dir)?);
    }
    Ok(library)
}

/// Build one entry from its manifest body.
fn parse_entry(
    library: &str,
    key: &str,
    body: &Value,
    root: &Path,
) -> Result<CatalogEntry, CatalogError> {
    let invalid = |message: String| CatalogError::InvalidAsset {
        library: library.to_string(),
        key: key.to_string(),
        message,
    };
    let fields = body
        .as_object()
        .ok_or_else(|| invalid("asset must be a mapping".to_string()))?;

    let type_name = fields
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("missing string field 'type'".to_string()))?;
    let asset_type =
        AssetType::parse(type_name).ok_or_else(|| invalid(format!("unknown type '{type_name}'")))?;

    let mut entry = CatalogEntry::new(library, key, asset_type);
    for (field, value) in fields {
        if field == "type" {
            continue;
        }
        if field == "tags" {
            entry.tags = string_list(value).ok_or_else(|| invalid("tags must be strings".into()))?;
        } else if let Some(target) = field.strip_suffix(CHECKSUM_SUFFIX) {
            let digest = value
                .as_str()
                .ok_or_else(|| invalid(format!("{field} must be a string")))?;
            entry.checksums.insert(target.to_string(), digest.to_string());
        } else if field.contains("filepath") {
            let relative = string_list(value)
                .ok_or_else(|| invalid(format!("{field} must be a path or a list of paths")))?;
            let mut paths = Vec::with_capacity(relative.len());
            for rel in relative {
                let path = root.join(rel);
                if !path.exists() {
                    return Err(CatalogError::MissingFile {
                        library: library.to_string(),
                        key: key.to_string(),
                        path,
                    });
                }
                paths.push(std::path::absolute(&path).unwrap_or(path));
            }
            entry.files.insert(field.clone(), paths);
        } else {
            entry.metadata.insert(field.clone(), value.clone());
        }
    }
    Ok(entry)
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|i| i.as_str().map(str::to_string))
            .collect(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_crawl_merges_sub_manifests() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path().join("trees");
        write(&lib.join("models/tree_01.glb"), "glb");
        write(&lib.join("models/tree_02.glb"), "glb");
        write(
            &lib.join(MANIFEST_NAME),
            "name: Trees\ndescription: broadleaf\nassets:\n  Tree_01:\n    type: model\n    tags: [tree]\n    filepath: models/tree_01.glb\n    height: 4.5\n",
        );
        write(
            &lib.join("models").join(MANIFEST_NAME),
            "assets:\n  Tree_02:\n    type: model\n    filepath: models/tree_02.glb\n",
        );

        let catalog = crawl(&[dir.path()]).unwrap();
        let trees = catalog.library("Trees").unwrap();
        assert_eq!(trees.description.as_deref(), Some("broadleaf"));
        assert_eq!(trees.assets.len(), 2);
        let tree = catalog.get("Trees/Tree_01").unwrap();
        assert_eq!(tree.tags, ["tree"]);
        assert!(tree.files["filepath"][0].is_absolute());
        assert_eq!(tree.metadata["height"], 4.5);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("rocks").join(MANIFEST_NAME),
            "name: Rocks\nassets:\n  Rock_01:\n    type: model\n    filepath: rock.glb\n",
        );
        let err = crawl(&[dir.path()]).unwrap_err();
        assert!(matches!(err, CatalogError::MissingFile { .. }), "{err}");
    }

    #[test]
    fn test_nested_libraries_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("outer").join(MANIFEST_NAME), "name: Outer\n");
        write(&dir.path().join("outer/inner").join(MANIFEST_NAME), "name: Inner\n");
        let err = crawl(&[dir.path()]).unwrap_err();
        assert!(matches!(err, CatalogError::NestedLibrary { .. }), "{err}");
    }

    #[test]
    fn test_conflicting_sub_manifest_key() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("lib").join(MANIFEST_NAME), "name: Lib\nlicense: CC0\n");
        write(&dir.path().join("lib/sub").join(MANIFEST_NAME), "license: MIT\n");
        let err = crawl(&[dir.path()]).unwrap_err();
        assert!(matches!(err, CatalogError::UnmergeableKey { .. }), "{err}");
    }

    #[test]
    fn test_duplicate_library_name_keeps_first() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        write(
            &a.path().join("lib").join(MANIFEST_NAME),
            "name: Lib\nassets:\n  A:\n    type: plugin\n",
        );
        write(
            &b.path().join("lib").join(MANIFEST_NAME),
            "name: Lib\nassets:\n  B:\n    type: plugin\n",
        );
        let catalog = crawl(&[a.path(), b.path()]).unwrap();
        assert!(catalog.get("Lib/A").is_some());
        assert!(catalog.get("Lib/B").is_none());
    }

    #[test]
    fn test_unknown_asset_type() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join(MANIFEST_NAME),
            "name: Lib\nassets:\n  A:\n    type: spaceship\n",
        );
        let err = crawl(&[dir.path()]).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidAsset { .. }), "{err}");
    }
}
