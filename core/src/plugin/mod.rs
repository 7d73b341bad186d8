//! Plugin descriptors and registry.
//!
//! Every scene, sensor, output and postprocessing section of a job document
//! is keyed by a plugin identifier. A [`PluginDescriptor`] names the plugin,
//! carries its schema fragment and, optionally, a factory for a runtime
//! implementation that the [`PluginHost`] drives step by step. Plugins
//! without a factory are resolved and validated but executed elsewhere.

mod builtin;
mod host;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

use crate::document::{DocPath, JobDocument, Node};
use crate::error::ConfigError;
use crate::schema::SchemaFragment;

pub use host::PluginHost;

/// Extension point a plugin attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
    Scene,
    Sensor,
    Output,
    Postprocessing,
}

impl PluginKind {
    /// Top-level document section of the plugin kind. Outputs live inside
    /// sensor configs under `outputs`.
    pub fn section(self) -> &'static str {
        match self {
            PluginKind::Scene => "scene",
            PluginKind::Sensor => "sensor",
            PluginKind::Output => "outputs",
            PluginKind::Postprocessing => "postprocessing",
        }
    }
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PluginKind::Scene => "scene",
            PluginKind::Sensor => "sensor",
            PluginKind::Output => "output",
            PluginKind::Postprocessing => "postprocessing",
        };
        f.write_str(name)
    }
}

/// Runtime side of a scene or sensor plugin.
pub trait ScenePlugin: Send {
    /// Called once, with the plugin's config from the first step.
    fn load(&mut self, config: &Value) -> anyhow::Result<()>;

    /// Called every step with that step's resolved config.
    fn configure(&mut self, config: &Value, step: usize) -> anyhow::Result<()>;
}

/// Runtime side of an output or postprocessing plugin.
pub trait OutputPlugin: Send {
    fn generate_output(&mut self, config: &Value, step: usize) -> anyhow::Result<()>;
}

pub type SceneFactory = Arc<dyn Fn() -> Box<dyn ScenePlugin> + Send + Sync>;
pub type OutputFactory = Arc<dyn Fn() -> Box<dyn OutputPlugin> + Send + Sync>;

#[derive(Clone)]
pub enum PluginFactory {
    Scene(SceneFactory),
    Output(OutputFactory),
}

/// Identity, schema fragment and optional runtime of one plugin.
#[derive(Clone)]
pub struct PluginDescriptor {
    pub id: String,
    pub kind: PluginKind,
    pub schema: Option<Value>,
    pub factory: Option<PluginFactory>,
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("has_schema", &self.schema.is_some())
            .field("has_runtime", &self.factory.is_some())
            .finish()
    }
}

impl PluginDescriptor {
    pub fn new(kind: PluginKind, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            schema: None,
            factory: None,
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_scene_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn ScenePlugin> + Send + Sync + 'static,
    {
        self.factory = Some(PluginFactory::Scene(Arc::new(factory)));
        self
    }

    pub fn with_output_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn OutputPlugin> + Send + Sync + 'static,
    {
        self.factory = Some(PluginFactory::Output(Arc::new(factory)));
        self
    }

    /// Short description taken from the schema fragment, if any.
    pub fn description(&self) -> Option<&str> {
        self.schema.as_ref()?.get("description")?.as_str()
    }
}

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("{kind} plugin '{id}' is already registered")]
    Duplicate { kind: PluginKind, id: String },

    #[error("built-in schema of {kind} plugin '{id}' is malformed: {message}")]
    BuiltinSchema {
        kind: PluginKind,
        id: String,
        message: String,
    },
}

/// All known plugins, keyed by kind and identifier.
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    plugins: IndexMap<(PluginKind, String), PluginDescriptor>,
}

impl PluginRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in plugin descriptors.
    pub fn with_builtins() -> Result<Self, PluginError> {
        let mut registry = Self::new();
        for descriptor in builtin::descriptors()? {
            registry.register(descriptor)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, descriptor: PluginDescriptor) -> Result<(), PluginError> {
        let key = (descriptor.kind, descriptor.id.clone());
        if self.plugins.contains_key(&key) {
            return Err(PluginError::Duplicate {
                kind: descriptor.kind,
                id: descriptor.id,
            });
        }
        self.plugins.insert(key, descriptor);
        Ok(())
    }

    /// Register or replace, e.g. to attach a runtime to a built-in descriptor.
    pub fn replace(&mut self, descriptor: PluginDescriptor) {
        self.plugins
            .insert((descriptor.kind, descriptor.id.clone()), descriptor);
    }

    pub fn get(&self, kind: PluginKind, id: &str) -> Option<&PluginDescriptor> {
        self.plugins.get(&(kind, id.to_string()))
    }

    pub fn contains(&self, kind: PluginKind, id: &str) -> bool {
        self.get(kind, id).is_some()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &PluginDescriptor> {
        self.plugins.values()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Schema fragments of every plugin that has one.
    pub fn fragments(&self) -> impl Iterator<Item = SchemaFragment> + '_ {
        self.plugins.values().filter_map(|d| {
            d.schema.as_ref().map(|schema| SchemaFragment {
                kind: d.kind,
                id: d.id.clone(),
                schema: schema.clone(),
            })
        })
    }

    /// Check that every plugin identifier used in `document` is registered.
    pub fn check_document(&self, document: &JobDocument) -> Result<(), ConfigError> {
        for kind in [PluginKind::Scene, PluginKind::Sensor, PluginKind::Postprocessing] {
            let Some(section) = document.section(kind.section()).and_then(Node::as_mapping) else {
                continue;
            };
            let section_path = DocPath::root().key(kind.section());
            for (id, configs) in section {
                let path = section_path.key(id);
                if !self.contains(kind, id) {
                    return Err(ConfigError::new(
                        path.pointer(),
                        format!("unknown {kind} plugin '{id}'"),
                    ));
                }
                if kind == PluginKind::Sensor {
                    self.check_outputs(configs, &path)?;
                }
            }
        }
        Ok(())
    }

    fn check_outputs(&self, configs: &Node, path: &DocPath) -> Result<(), ConfigError> {
        let Node::Sequence(configs) = configs else {
            return Ok(());
        };
        for (i, config) in configs.iter().enumerate() {
            let Some(outputs) = config.get("outputs").and_then(Node::as_mapping) else {
                continue;
            };
            for id in outputs.keys() {
                if !self.contains(PluginKind::Output, id) {
                    return Err(ConfigError::new(
                        path.index(i).key("outputs").key(id).pointer(),
                        format!("unknown output plugin '{id}'"),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtins_are_registered() {
        let registry = PluginRegistry::with_builtins().unwrap();
        for (kind, id) in [
            (PluginKind::Scene, "object"),
            (PluginKind::Scene, "ground"),
            (PluginKind::Scene, "environment"),
            (PluginKind::Scene, "scatter"),
            (PluginKind::Scene, "simulated_scatter"),
            (PluginKind::Scene, "crop"),
            (PluginKind::Sensor, "camera"),
            (PluginKind::Output, "rgb"),
            (PluginKind::Output, "pixel_annotation"),
            (PluginKind::Output, "keypoints"),
            (PluginKind::Output, "object_positions"),
            (PluginKind::Postprocessing, "bounding_boxes"),
        ] {
            let descriptor = registry.get(kind, id).unwrap();
            assert!(descriptor.schema.is_some(), "{kind} {id}");
            assert!(descriptor.description().is_some(), "{kind} {id}");
        }
        assert_eq!(registry.fragments().count(), registry.len());
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry = PluginRegistry::new();
        registry
            .register(PluginDescriptor::new(PluginKind::Scene, "object"))
            .unwrap();
        let err = registry
            .register(PluginDescriptor::new(PluginKind::Scene, "object"))
            .unwrap_err();
        assert!(matches!(err, PluginError::Duplicate { .. }));
        // Same id under another kind is fine.
        registry
            .register(PluginDescriptor::new(PluginKind::Output, "object"))
            .unwrap();
    }

    #[test]
    fn test_check_document_rejects_unknown_ids() {
        let registry = PluginRegistry::with_builtins().unwrap();
        let general = json!({"steps": 1, "seeds": {"numpy": 0}});

        let doc = JobDocument::from_value(json!({
            "general": general,
            "scene": {"object": []},
            "sensor": {"camera": [{"outputs": {"rgb": [], "thermal": []}}]},
        }))
        .unwrap();
        let err = registry.check_document(&doc).unwrap_err();
        assert_eq!(err.path, "/sensor/camera/0/outputs/thermal");

        let doc = JobDocument::from_value(json!({"general": general, "scene": {"spaceship": []}}))
            .unwrap();
        let err = registry.check_document(&doc).unwrap_err();
        assert_eq!(err.path, "/scene/spaceship");
    }
}
