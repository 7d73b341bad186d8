//! Composite schema assembly and job document validation.
//!
//! The composite schema is the base schema with every plugin's fragment
//! spliced in at its extension point. It is compiled once when built, so a
//! malformed plugin fragment fails at startup rather than while validating
//! a job.

mod compile;
mod compose;
mod validate;

use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use compile::CompiledSchema;

pub use compose::{SchemaComposer, SchemaFragment, base_schema, compose};

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("malformed schema at {pointer}: {message}")]
    Malformed { pointer: String, message: String },

    #[error("unresolved $ref '{target}' at {pointer}")]
    UnresolvedRef { pointer: String, target: String },

    #[error("base schema has no extension point at {0}")]
    MissingExtensionPoint(String),

    #[error("schema fragment '{id}' is registered twice at {pointer}")]
    DuplicateFragment { id: String, pointer: String },

    #[error("failed to read schema {}: {message}", .path.display())]
    Read { path: PathBuf, message: String },

    #[error("failed to write schema {}: {message}", .path.display())]
    Write { path: PathBuf, message: String },
}

/// One validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// JSON pointer into the document; empty for the root.
    pub path: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        write!(f, "{path}: {}", self.message)
    }
}

/// Every issue found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  - {issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationReport {}

/// A compiled composite schema.
#[derive(Debug)]
pub struct CompositeSchema {
    document: Value,
    compiled: CompiledSchema,
}

impl CompositeSchema {
    /// Compile an already composed schema document.
    pub fn from_document(document: Value) -> Result<Self, SchemaError> {
        let compiled = CompiledSchema::compile(&document)?;
        Ok(Self { document, compiled })
    }

    /// Read a schema written by [`CompositeSchema::save`] (YAML or JSON).
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let document = sceneforge_shared::load_yaml_value(path, sceneforge_shared::MAX_SCHEMA_BYTES)
            .map_err(|e| SchemaError::Read {
                path: path.to_path_buf(),
                message: format!("{e:#}"),
            })?;
        Self::from_document(document)
    }

    pub fn save(&self, path: &Path) -> Result<(), SchemaError> {
        let write_err = |message: String| SchemaError::Write {
            path: path.to_path_buf(),
            message,
        };
        let yaml = serde_yaml::to_string(&self.document).map_err(|e| write_err(e.to_string()))?;
        std::fs::write(path, yaml).map_err(|e| write_err(e.to_string()))
    }

    /// The composed schema document.
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Check a job document, collecting every issue.
    pub fn validate(&self, document: &Value) -> Result<(), ValidationReport> {
        let issues = self.compiled.validate(document);
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationReport { issues })
        }
    }
}
