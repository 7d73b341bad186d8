use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{DocPath, Node};
use crate::error::ConfigError;
use crate::eval::Evaluator;

/// Top-level section holding named evaluators shared by the whole document.
pub const GLOBAL_EVALUATORS_KEY: &str = "global_evaluators";
/// Top-level section holding texture definitions.
pub const TEXTURES_KEY: &str = "textures";

/// Seeds for the random streams of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Seeds {
    /// Run seed for evaluator draws.
    pub numpy: u64,
    /// Seed forwarded to the renderer.
    #[serde(default)]
    pub cycles: u64,
    /// Offset added to every texture's own seed.
    #[serde(default)]
    pub textures: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RenderDevice {
    #[default]
    Cpu,
    Gpu,
}

/// The `general` section of a job document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralSection {
    pub steps: usize,
    pub seeds: Seeds,
    #[serde(default)]
    pub render_device: RenderDevice,
    #[serde(default)]
    pub render_hardware: Option<String>,
    #[serde(default)]
    pub denoising_enabled: bool,
    #[serde(default)]
    pub denoising_algorithm: Option<String>,
}

/// A normalized job document.
#[derive(Debug, Clone)]
pub struct JobDocument {
    raw: Value,
    root: IndexMap<String, Node>,
    general: GeneralSection,
    globals: IndexMap<String, Evaluator>,
}

impl JobDocument {
    /// Normalize a parsed document.
    ///
    /// Checks structure only; schema validation is the caller's job.
    pub fn from_value(raw: Value) -> Result<Self, ConfigError> {
        let root = match Node::from_value(&raw)? {
            Node::Mapping(members) => members,
            _ => return Err(ConfigError::new("", "job document must be a mapping")),
        };

        let general_value = raw
            .get("general")
            .cloned()
            .ok_or_else(|| ConfigError::new("", "missing required section 'general'"))?;
        let general: GeneralSection = serde_json::from_value(general_value)
            .map_err(|e| ConfigError::new("/general", e.to_string()))?;
        if general.steps == 0 {
            return Err(ConfigError::new("/general/steps", "steps must be at least 1"));
        }

        let mut globals = IndexMap::new();
        if let Some(section) = root.get(GLOBAL_EVALUATORS_KEY) {
            let path = DocPath::root().key(GLOBAL_EVALUATORS_KEY);
            let members = section.as_mapping().ok_or_else(|| {
                ConfigError::new(path.pointer(), "global_evaluators must be a mapping")
            })?;
            for (name, node) in members {
                let evaluator = match node {
                    Node::Evaluator(Evaluator::GlobalRef(_)) => {
                        return Err(ConfigError::new(
                            path.key(name).pointer(),
                            "global evaluators cannot reference other global evaluators",
                        ));
                    }
                    Node::Evaluator(evaluator) => evaluator.clone(),
                    _ => {
                        return Err(ConfigError::new(
                            path.key(name).pointer(),
                            "global evaluators must be evaluator expressions",
                        ));
                    }
                };
                globals.insert(name.clone(), evaluator);
            }
        }

        Ok(Self {
            raw,
            root,
            general,
            globals,
        })
    }

    /// The document as it was parsed.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn general(&self) -> &GeneralSection {
        &self.general
    }

    pub fn steps(&self) -> usize {
        self.general.steps
    }

    /// Seed of the per-step evaluator streams.
    pub fn run_seed(&self) -> u64 {
        self.general.seeds.numpy
    }

    /// Declared global evaluators, in declaration order.
    pub fn globals(&self) -> &IndexMap<String, Evaluator> {
        &self.globals
    }

    /// Top-level sections in document order.
    pub fn sections(&self) -> &IndexMap<String, Node> {
        &self.root
    }

    pub fn section(&self, name: &str) -> Option<&Node> {
        self.root.get(name)
    }

    /// Texture definitions in declaration order.
    pub fn textures(&self) -> Option<&IndexMap<String, Node>> {
        self.root.get(TEXTURES_KEY).and_then(Node::as_mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn general() -> Value {
        json!({"steps": 3, "seeds": {"numpy": 7, "cycles": 1}, "render_device": "GPU", "render_hardware": "CUDA"})
    }

    #[test]
    fn test_parses_general_section() {
        let doc = JobDocument::from_value(json!({"general": general()})).unwrap();
        assert_eq!(doc.steps(), 3);
        assert_eq!(doc.run_seed(), 7);
        assert_eq!(doc.general().seeds.textures, 0);
        assert_eq!(doc.general().render_device, RenderDevice::Gpu);
    }

    #[test]
    fn test_rejects_non_mapping_document() {
        let err = JobDocument::from_value(json!([1, 2, 3])).unwrap_err();
        assert_eq!(err.path, "");
    }

    #[test]
    fn test_rejects_zero_steps() {
        let err = JobDocument::from_value(json!({"general": {"steps": 0, "seeds": {"numpy": 0}}}))
            .unwrap_err();
        assert_eq!(err.path, "/general/steps");
    }

    #[test]
    fn test_global_evaluators_must_be_evaluators() {
        let doc = json!({"general": general(), "global_evaluators": {"size": 3}});
        let err = JobDocument::from_value(doc).unwrap_err();
        assert_eq!(err.path, "/global_evaluators/size");

        let doc = json!({"general": general(), "global_evaluators": {"size": "$global.other"}});
        let err = JobDocument::from_value(doc).unwrap_err();
        assert!(err.message.contains("cannot reference"));
    }

    #[test]
    fn test_globals_keep_declaration_order() {
        let doc = json!({
            "general": general(),
            "global_evaluators": {
                "zeta": {"uniform": [0, 1]},
                "alpha": {"step": [1, 2]},
            }
        });
        let doc = JobDocument::from_value(doc).unwrap();
        let names: Vec<_> = doc.globals().keys().cloned().collect();
        assert_eq!(names, ["zeta", "alpha"]);
    }
}
