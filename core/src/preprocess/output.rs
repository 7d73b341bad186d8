//! Writes resolved steps and their textures to a run directory.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use hashbrown::HashMap;
use indexmap::IndexMap;
use proc_gen::texture::write_png;
use tracing::{debug, info};

use super::{ResolvedStep, StepSink, map_handles};
use crate::catalog::Catalog;
use crate::error::PipelineError;
use crate::texture::{BuiltTexture, PREPROCESSED_LIBRARY};

const TEXTURES_DIR: &str = "textures";
const CATALOG_FILE: &str = "asset_catalog.yaml";

/// Run directory layout:
///
/// ```text
/// <root>/step_<n>.yaml
/// <root>/textures/<id>_<instance>.png            static textures, written once
/// <root>/textures/<id>_<instance>_step_<n>.png   per-step textures
/// <root>/asset_catalog.yaml
/// ```
#[derive(Debug)]
pub struct OutputWriter {
    root: PathBuf,
    static_files: HashMap<String, Vec<PathBuf>>,
    files: IndexMap<String, Vec<PathBuf>>,
    steps: usize,
}

impl OutputWriter {
    /// Create a timestamped run directory below `output_dir`.
    pub fn create(output_dir: &Path) -> Result<Self, PipelineError> {
        let stamp = Local::now().format("%Y_%m_%d_%H_%M_%S").to_string();
        Self::with_root(output_dir.join(stamp))
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let root = root.into();
        let textures = root.join(TEXTURES_DIR);
        fs::create_dir_all(&textures).map_err(|e| output_error(&textures, e))?;
        Ok(Self {
            root,
            static_files: HashMap::new(),
            files: IndexMap::new(),
            steps: 0,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write a step's textures and its document, with texture handles
    /// rewritten to the written file paths. Returns the document path.
    pub fn write_step(&mut self, step: &ResolvedStep) -> Result<PathBuf, PipelineError> {
        let mut paths: HashMap<&str, Vec<PathBuf>> = HashMap::new();
        for (id, texture) in &step.textures {
            let written = if texture.is_static {
                match self.static_files.get(id) {
                    Some(files) => files.clone(),
                    None => {
                        let files = self.write_texture(id, texture, None)?;
                        self.static_files.insert(id.clone(), files.clone());
                        self.files.entry(id.clone()).or_default().extend(files.iter().cloned());
                        files
                    }
                }
            } else {
                let files = self.write_texture(id, texture, Some(step.step))?;
                self.files.entry(id.clone()).or_default().extend(files.iter().cloned());
                files
            };
            paths.insert(id.as_str(), written);
        }

        let document = map_handles(&step.document, &|handle| {
            paths
                .get(handle.id.as_str())
                .and_then(|files| files.get(handle.instance))
                .map(|path| path.display().to_string())
        });

        let path = self.root.join(format!("step_{}.yaml", step.step));
        let yaml = serde_yaml::to_string(&document).map_err(|e| output_error(&path, e))?;
        fs::write(&path, yaml).map_err(|e| output_error(&path, e))?;
        debug!("Wrote {}", path.display());
        self.steps += 1;
        Ok(path)
    }

    fn write_texture(
        &self,
        id: &str,
        texture: &BuiltTexture,
        step: Option<usize>,
    ) -> Result<Vec<PathBuf>, PipelineError> {
        let dir = self.root.join(TEXTURES_DIR);
        let mut files = Vec::with_capacity(texture.instances.len());
        for (i, buffer) in texture.instances.iter().enumerate() {
            let name = match step {
                Some(step) => format!("{id}_{i}_step_{step}.png"),
                None => format!("{id}_{i}.png"),
            };
            let path = dir.join(name);
            write_png(buffer, &path, texture.bit_depth).map_err(|e| output_error(&path, e))?;
            files.push(path);
        }
        Ok(files)
    }

    /// Write `catalog` with the generated texture files attached to the
    /// preprocessed library's entries. Returns the catalog path.
    pub fn finish(self, catalog: &Catalog) -> Result<PathBuf, PipelineError> {
        let mut out = Catalog::new();
        for library in catalog.libraries() {
            let mut library = library.clone();
            if library.name == PREPROCESSED_LIBRARY {
                library.root_path = self.root.join(TEXTURES_DIR);
                for (id, entry) in library.assets.iter_mut() {
                    if let Some(files) = self.files.get(id) {
                        entry.files.insert("filepath".to_string(), files.clone());
                    }
                }
            }
            out.add_library(library);
        }

        let path = self.root.join(CATALOG_FILE);
        out.save(&path).map_err(|e| output_error(&path, e))?;
        info!(
            "Wrote {} step(s) to {}",
            self.steps,
            self.root.display()
        );
        Ok(path)
    }
}

impl StepSink for OutputWriter {
    fn accept(&mut self, step: &ResolvedStep) -> Result<(), PipelineError> {
        self.write_step(step).map(|_| ())
    }
}

fn output_error(path: &Path, err: impl std::fmt::Display) -> PipelineError {
    PipelineError::Output {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}
