//! Procedural textures of a job.
//!
//! A texture definition is a config plus an ordered list of operations that
//! the [`TexturePipeline`] runs on `proc-gen` buffers. Definitions without
//! evaluators (and whose inputs are likewise fixed) are built once and
//! reused by every step; the rest are rebuilt from each step's resolved
//! document.

mod build;
mod definition;
mod pipeline;
mod plan;

use std::fmt;
use std::sync::Arc;

use proc_gen::texture::{BitDepth, ExprError, TextureBuffer};
use thiserror::Error;

pub use build::build_texture;
pub use definition::{Operation, PerlinOp, TextureConfig, TextureDefinition};
pub use pipeline::TexturePipeline;
pub use plan::{PlannedTexture, TexturePlan};

/// Pseudo-library that generated textures are published under.
pub const PREPROCESSED_LIBRARY: &str = "Preprocessed Assets";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TextureError {
    #[error("texture '{texture}' references '{reference}', which is declared after it")]
    ForwardReference { texture: String, reference: String },

    #[error("texture '{texture}' references unknown texture '{reference}'")]
    UnknownTexture { texture: String, reference: String },

    #[error("texture '{0}' references itself")]
    CyclicReference(String),

    #[error("texture id '{0}' may only contain letters, digits, '_' and '-'")]
    InvalidId(String),

    #[error("texture '{texture}': {message}")]
    InvalidParameter { texture: String, message: String },

    #[error("texture '{texture}': invalid math expression: {source}")]
    Expression {
        texture: String,
        #[source]
        source: ExprError,
    },

    #[error("texture '{texture}': bit_depth must be 8 or 16, found {found}")]
    BitDepth { texture: String, found: String },
}

impl TextureError {
    /// Id of the texture the error was raised for.
    pub fn texture(&self) -> &str {
        match self {
            TextureError::ForwardReference { texture, .. }
            | TextureError::UnknownTexture { texture, .. }
            | TextureError::InvalidParameter { texture, .. }
            | TextureError::Expression { texture, .. }
            | TextureError::BitDepth { texture, .. } => texture,
            TextureError::CyclicReference(texture) | TextureError::InvalidId(texture) => texture,
        }
    }
}

/// Every instance of one built texture.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltTexture {
    pub instances: Arc<Vec<TextureBuffer>>,
    pub bit_depth: BitDepth,
    /// Built once and shared by every step.
    pub is_static: bool,
}

impl BuiltTexture {
    /// Instance `i`, wrapping around when fewer instances exist.
    pub fn instance(&self, i: usize) -> Option<&TextureBuffer> {
        if self.instances.is_empty() {
            return None;
        }
        self.instances.get(i % self.instances.len())
    }
}

/// Built textures by id, in declaration order.
pub type BuiltTextures = indexmap::IndexMap<String, BuiltTexture>;

/// Reference to one texture instance inside a resolved step.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureHandle {
    pub id: String,
    pub instance: usize,
}

impl TextureHandle {
    const SCHEME: &'static str = "texture://";

    pub fn new(id: impl Into<String>, instance: usize) -> Self {
        Self {
            id: id.into(),
            instance,
        }
    }

    /// Parse the string form produced by `Display`.
    pub fn parse(text: &str) -> Option<Self> {
        let rest = text.strip_prefix(Self::SCHEME)?;
        let (id, instance) = rest.rsplit_once('/')?;
        if id.is_empty() {
            return None;
        }
        Some(Self::new(id, instance.parse().ok()?))
    }
}

impl fmt::Display for TextureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", Self::SCHEME, self.id, self.instance)
    }
}
