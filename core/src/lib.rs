//! Sceneforge core library
//!
//! Turns a declarative job document into a sequence of fully resolved,
//! per-step scene configurations:
//!
//! - [`catalog`] - asset library discovery and queries
//! - [`schema`] - composite schema assembly and document validation
//! - [`eval`] - evaluator expressions and per-step resolution
//! - [`texture`] - procedural texture definitions and builds
//! - [`plugin`] - plugin descriptors, registry and the per-step host
//! - [`preprocess`] - the driver tying everything together
//!
//! Resolution is deterministic: the same document, catalog and seed always
//! produce the same documents and the same texture bytes.

pub mod catalog;
pub mod document;
pub mod error;
pub mod eval;
pub mod plugin;
pub mod preprocess;
pub mod schema;
pub mod texture;

pub use catalog::{AssetType, Catalog, CatalogEntry, CatalogError, Library};
pub use document::{DocPath, JobDocument, Node};
pub use error::{ConfigError, PipelineError, ResolveError};
pub use eval::{Evaluator, Operand, ResolvedDocument, StepResolver, resolve_step};
pub use plugin::{PluginDescriptor, PluginHost, PluginKind, PluginRegistry};
pub use preprocess::{OutputWriter, PreparedJob, Preprocessor, ResolvedStep, StepSink};
pub use schema::{CompositeSchema, SchemaComposer, SchemaError, ValidationIssue, ValidationReport};
pub use texture::{BuiltTexture, TextureDefinition, TextureError, TextureHandle, TexturePipeline};
