//! Job document model.
//!
//! A job document arrives as YAML and is parsed into an order-preserving
//! [`serde_json::Value`]. [`Node`] is the normalized form: every evaluator
//! expression is recognized up front, so malformed evaluators surface as
//! [`ConfigError`](crate::ConfigError)s before any step runs.

mod job;
mod node;
mod path;

pub use job::{
    GLOBAL_EVALUATORS_KEY, GeneralSection, JobDocument, RenderDevice, Seeds, TEXTURES_KEY,
};
pub use node::Node;
pub use path::DocPath;
