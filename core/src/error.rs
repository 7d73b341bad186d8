//! Error types shared across the resolution pipeline.
//!
//! Catalog, schema and texture errors live next to their modules; this file
//! holds the errors raised while resolving documents and the top-level
//! [`PipelineError`] the preprocessor returns.

use std::path::PathBuf;

use thiserror::Error;

use crate::schema::ValidationReport;
use crate::texture::TextureError;

/// A structurally invalid job document.
///
/// Raised before any step is resolved; `path` is a JSON pointer into the
/// document.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}: {message}", display_path(.path))]
pub struct ConfigError {
    pub path: String,
    pub message: String,
}

impl ConfigError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() { "/" } else { path }
}

/// Errors raised while resolving a single step.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("no asset in library '{library}' matches {filter}")]
    AssetNotFound { library: String, filter: String },

    #[error("asset library '{0}' is not in the catalog")]
    UnknownLibrary(String),

    #[error("global evaluator '{0}' is not declared in global_evaluators")]
    UnknownGlobalEvaluator(String),

    #[error("texture '{0}' is not defined in textures")]
    UnknownTexture(String),

    #[error("{evaluator} evaluator produced {value}, which is not a finite number")]
    NonFinite { evaluator: &'static str, value: f64 },
}

/// Top-level error of a preprocessing run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The document does not conform to the composite schema.
    #[error("job document failed validation:\n{0}")]
    Invalid(ValidationReport),

    #[error("invalid job document at {0}")]
    Config(#[from] ConfigError),

    #[error("step {step}: {}: {source}", display_path(.path))]
    Step {
        step: usize,
        path: String,
        #[source]
        source: ResolveError,
    },

    #[error("step {step}: {source}")]
    Texture {
        step: usize,
        #[source]
        source: TextureError,
    },

    #[error("plugin '{plugin}' failed at step {step}: {message}")]
    Plugin {
        plugin: String,
        step: usize,
        message: String,
    },

    #[error("failed to write {}: {message}", .path.display())]
    Output { path: PathBuf, message: String },
}

impl PipelineError {
    /// The step the error was raised in, if it is tied to one.
    pub fn step(&self) -> Option<usize> {
        match self {
            Self::Step { step, .. } | Self::Texture { step, .. } | Self::Plugin { step, .. } => {
                Some(*step)
            }
            _ => None,
        }
    }
}
