//! Job preprocessing.
//!
//! The [`Preprocessor`] validates a raw job document once, plans and builds
//! its static textures, then resolves every step into a [`ResolvedStep`]:
//! the document with evaluators replaced by values and
//! `"Preprocessed Assets/<id>"` references replaced by texture handles.
//! Steps are independent and are resolved on the rayon pool.

mod output;

use indexmap::IndexMap;
use proc_gen::texture::TextureBuffer;
use rayon::prelude::*;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::catalog::{AssetType, Catalog, CatalogEntry, Library};
use crate::document::{DocPath, JobDocument, Node, TEXTURES_KEY};
use crate::error::{ConfigError, PipelineError, ResolveError};
use crate::eval::{Evaluator, StepResolver};
use crate::plugin::PluginRegistry;
use crate::schema::CompositeSchema;
use crate::texture::{BuiltTextures, PREPROCESSED_LIBRARY, TextureHandle, TexturePipeline};

pub use output::OutputWriter;

/// Consumer of resolved steps, fed in step order.
pub trait StepSink {
    fn accept(&mut self, step: &ResolvedStep) -> Result<(), PipelineError>;
}

impl StepSink for Vec<ResolvedStep> {
    fn accept(&mut self, step: &ResolvedStep) -> Result<(), PipelineError> {
        self.push(step.clone());
        Ok(())
    }
}

/// One fully resolved step.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStep {
    pub step: usize,
    /// Resolved document with texture references replaced by handle strings.
    pub document: Value,
    pub globals: IndexMap<String, Value>,
    /// Every texture of the job for this step, static ones included.
    pub textures: BuiltTextures,
}

impl ResolvedStep {
    /// Buffer behind a handle found in [`ResolvedStep::document`].
    pub fn texture(&self, handle: &TextureHandle) -> Option<&TextureBuffer> {
        self.textures.get(&handle.id)?.instances.get(handle.instance)
    }
}

pub struct Preprocessor<'a> {
    catalog: &'a Catalog,
    schema: &'a CompositeSchema,
    registry: &'a PluginRegistry,
}

impl<'a> Preprocessor<'a> {
    pub fn new(catalog: &'a Catalog, schema: &'a CompositeSchema, registry: &'a PluginRegistry) -> Self {
        Self {
            catalog,
            schema,
            registry,
        }
    }

    /// Check a raw document and get it ready for step resolution.
    ///
    /// Every configuration error surfaces here, before any step runs.
    pub fn prepare(&self, raw: &Value) -> Result<PreparedJob, PipelineError> {
        self.schema.validate(raw).map_err(PipelineError::Invalid)?;
        let document = JobDocument::from_value(raw.clone())?;
        self.registry.check_document(&document)?;

        let textures = TexturePipeline::prepare(&document).map_err(|err| {
            let path = DocPath::root().key(TEXTURES_KEY).key(err.texture());
            ConfigError::new(path.pointer(), err.to_string())
        })?;

        let ids: Vec<&str> = textures.plan().textures().iter().map(|t| t.id.as_str()).collect();
        for (key, node) in document.sections() {
            if key != TEXTURES_KEY {
                check_texture_references(node, &DocPath::root().key(key), &ids, document.globals())?;
            }
        }

        let catalog = self.catalog_with_textures(&textures)?;

        info!(
            "Job valid: {} step(s), {} texture definition(s)",
            document.steps(),
            ids.len()
        );
        Ok(PreparedJob {
            document,
            catalog,
            textures,
        })
    }

    /// Resolve every step of a document.
    pub fn run(&self, raw: &Value) -> Result<Vec<ResolvedStep>, PipelineError> {
        self.prepare(raw)?.resolve_all()
    }

    /// Resolve every step and hand them to `sink` in step order.
    pub fn run_into(&self, raw: &Value, sink: &mut dyn StepSink) -> Result<usize, PipelineError> {
        self.prepare(raw)?.run_into(sink)
    }

    /// The catalog plus one `texture` entry per job texture, so selections
    /// over the preprocessed library see them.
    fn catalog_with_textures(&self, textures: &TexturePipeline) -> Result<Catalog, PipelineError> {
        let mut catalog = self.catalog.clone();
        if textures.is_empty() {
            return Ok(catalog);
        }

        let mut library = Library::new(PREPROCESSED_LIBRARY, "");
        library.description = Some("Textures generated by the job".to_string());
        for planned in textures.plan().textures() {
            let mut entry = CatalogEntry::new(PREPROCESSED_LIBRARY, &planned.id, AssetType::Texture);
            entry
                .metadata
                .insert("static".to_string(), Value::Bool(planned.is_static));
            library.insert(entry);
        }
        if !catalog.add_library(library) {
            return Err(ConfigError::new(
                DocPath::root().key(TEXTURES_KEY).pointer(),
                format!("the catalog already contains a library named '{PREPROCESSED_LIBRARY}'"),
            )
            .into());
        }
        Ok(catalog)
    }
}

/// A validated job, ready to resolve steps in any order.
#[derive(Debug, Clone)]
pub struct PreparedJob {
    document: JobDocument,
    catalog: Catalog,
    textures: TexturePipeline,
}

impl PreparedJob {
    pub fn steps(&self) -> usize {
        self.document.steps()
    }

    pub fn document(&self) -> &JobDocument {
        &self.document
    }

    /// The input catalog extended with the job's textures.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn textures(&self) -> &TexturePipeline {
        &self.textures
    }

    pub fn resolve_step(&self, step: usize) -> Result<ResolvedStep, PipelineError> {
        let resolved = StepResolver::new(&self.document, &self.catalog).resolve(step)?;
        let textures = self
            .textures
            .build_step(&resolved.value)
            .map_err(|source| PipelineError::Texture { step, source })?;

        let mut document = resolved.value;
        substitute_textures(&mut document, &DocPath::root(), &textures)
            .map_err(|(path, source)| PipelineError::Step { step, path, source })?;
        debug!(step, textures = textures.len(), "resolved step");

        Ok(ResolvedStep {
            step,
            document,
            globals: resolved.globals,
            textures,
        })
    }

    /// Resolve every step in parallel.
    pub fn resolve_all(&self) -> Result<Vec<ResolvedStep>, PipelineError> {
        (0..self.steps())
            .into_par_iter()
            .map(|step| self.resolve_step(step))
            .collect()
    }

    /// Resolve steps in parallel batches, feeding `sink` in step order.
    ///
    /// Stops at the first failing step; steps before it have been delivered.
    pub fn run_into(&self, sink: &mut dyn StepSink) -> Result<usize, PipelineError> {
        let batch = rayon::current_num_threads().max(1);
        let steps = self.steps();
        let mut start = 0;
        while start < steps {
            let end = (start + batch).min(steps);
            let resolved: Vec<Result<ResolvedStep, PipelineError>> = (start..end)
                .into_par_iter()
                .map(|step| self.resolve_step(step))
                .collect();
            for step in resolved {
                sink.accept(&step?)?;
            }
            start = end;
        }
        Ok(steps)
    }
}

/// Reject `"Preprocessed Assets/<id>"` strings naming no job texture.
fn check_texture_references(
    node: &Node,
    path: &DocPath,
    ids: &[&str],
    globals: &IndexMap<String, Evaluator>,
) -> Result<(), ConfigError> {
    match node {
        Node::Mapping(members) => members.iter().try_for_each(|(key, member)| {
            check_texture_references(member, &path.key(key), ids, globals)
        }),
        Node::Sequence(items) => items.iter().enumerate().try_for_each(|(i, item)| {
            check_texture_references(item, &path.index(i), ids, globals)
        }),
        leaf => {
            for candidate in leaf.string_candidates(globals) {
                if let Some(id) = texture_reference(candidate)
                    && !ids.contains(&id)
                {
                    return Err(ConfigError::new(
                        path.pointer(),
                        format!("texture '{id}' is not defined in textures"),
                    ));
                }
            }
            Ok(())
        }
    }
}

fn texture_reference(text: &str) -> Option<&str> {
    text.strip_prefix(PREPROCESSED_LIBRARY)?
        .strip_prefix('/')
        .filter(|id| !id.is_empty())
}

/// Replace texture references with the list of their instance handles.
fn substitute_textures(
    value: &mut Value,
    path: &DocPath,
    textures: &BuiltTextures,
) -> Result<(), (String, ResolveError)> {
    match value {
        Value::String(text) => {
            let Some(id) = texture_reference(text) else {
                return Ok(());
            };
            let texture = textures
                .get(id)
                .ok_or_else(|| (path.pointer(), ResolveError::UnknownTexture(id.to_string())))?;
            let handles = (0..texture.instances.len())
                .map(|i| Value::String(TextureHandle::new(id, i).to_string()))
                .collect();
            *value = Value::Array(handles);
            Ok(())
        }
        Value::Array(items) => items
            .iter_mut()
            .enumerate()
            .try_for_each(|(i, v)| substitute_textures(v, &path.index(i), textures)),
        Value::Object(map) => map
            .iter_mut()
            .try_for_each(|(k, v)| substitute_textures(v, &path.key(k), textures)),
        _ => Ok(()),
    }
}

/// Rewrite every handle string in `value` through `rename`.
pub(crate) fn map_handles(value: &Value, rename: &dyn Fn(&TextureHandle) -> Option<String>) -> Value {
    match value {
        Value::String(text) => TextureHandle::parse(text)
            .and_then(|handle| rename(&handle))
            .map_or_else(|| value.clone(), Value::String),
        Value::Array(items) => Value::Array(items.iter().map(|v| map_handles(v, rename)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), map_handles(v, rename)))
                .collect::<Map<String, Value>>(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaComposer;
    use serde_json::json;

    fn schema() -> CompositeSchema {
        SchemaComposer::with_base_schema()
            .unwrap()
            .plugins(&PluginRegistry::with_builtins().unwrap())
            .build()
            .unwrap()
    }

    fn job(textures: Value, ground_texture: Value) -> Value {
        json!({
            "general": {"steps": 2, "seeds": {"numpy": 42}},
            "scene": {"ground": [{"name": "floor", "size": 10, "texture": ground_texture}]},
            "sensor": {},
            "textures": textures,
        })
    }

    fn mask() -> Value {
        json!({"mask": {
            "config": {"image_size": [4, 4], "bit_depth": 8, "num_textures": 2},
            "ops": [{"perlin": {"octaves": 1}}],
        }})
    }

    #[test]
    fn test_texture_reference_becomes_handles() {
        let catalog = Catalog::new();
        let schema = schema();
        let registry = PluginRegistry::with_builtins().unwrap();
        let pre = Preprocessor::new(&catalog, &schema, &registry);

        let steps = pre.run(&job(mask(), json!("Preprocessed Assets/mask"))).unwrap();
        assert_eq!(steps.len(), 2);
        let handles = &steps[1].document["scene"]["ground"][0]["texture"];
        assert_eq!(handles, &json!(["texture://mask/0", "texture://mask/1"]));

        let handle = TextureHandle::parse("texture://mask/1").unwrap();
        assert_eq!(steps[1].texture(&handle).unwrap().width, 4);
    }

    #[test]
    fn test_unknown_texture_reference_is_config_error() {
        let catalog = Catalog::new();
        let schema = schema();
        let registry = PluginRegistry::with_builtins().unwrap();
        let pre = Preprocessor::new(&catalog, &schema, &registry);

        let err = pre
            .prepare(&job(mask(), json!("Preprocessed Assets/other")))
            .unwrap_err();
        match err {
            PipelineError::Config(err) => assert_eq!(err.path, "/scene/ground/0/texture"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_document_runs_no_steps() {
        let catalog = Catalog::new();
        let schema = schema();
        let registry = PluginRegistry::with_builtins().unwrap();
        let pre = Preprocessor::new(&catalog, &schema, &registry);

        let mut collected: Vec<ResolvedStep> = Vec::new();
        let raw = json!({"general": {"steps": 2, "seeds": {"numpy": 1}}, "scene": {}});
        let err = pre.run_into(&raw, &mut collected).unwrap_err();
        assert!(matches!(err, PipelineError::Invalid(_)));
        assert!(collected.is_empty());
    }

    #[test]
    fn test_run_into_delivers_in_order() {
        let catalog = Catalog::new();
        let schema = schema();
        let registry = PluginRegistry::with_builtins().unwrap();
        let pre = Preprocessor::new(&catalog, &schema, &registry);

        let mut raw = job(mask(), json!("Preprocessed Assets/mask"));
        raw["general"]["steps"] = json!(5);
        let mut collected: Vec<ResolvedStep> = Vec::new();
        assert_eq!(pre.run_into(&raw, &mut collected).unwrap(), 5);
        let order: Vec<usize> = collected.iter().map(|s| s.step).collect();
        assert_eq!(order, [0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_texture_selection_from_catalog() {
        let catalog = Catalog::new();
        let schema = schema();
        let registry = PluginRegistry::with_builtins().unwrap();
        let pre = Preprocessor::new(&catalog, &schema, &registry);

        let ground = json!({"selection_asset": {"library": "Preprocessed Assets", "type": "texture"}});
        let steps = pre.run(&job(mask(), ground)).unwrap();
        assert_eq!(
            steps[0].document["scene"]["ground"][0]["texture"],
            json!(["texture://mask/0", "texture://mask/1"])
        );
    }

    #[test]
    fn test_texture_reference_through_global() {
        let catalog = Catalog::new();
        let schema = schema();
        let registry = PluginRegistry::with_builtins().unwrap();
        let pre = Preprocessor::new(&catalog, &schema, &registry);

        let mut raw = job(mask(), json!("$global.ground"));
        raw["global_evaluators"] = json!({"ground": {"step": ["Preprocessed Assets/mask"]}});
        let steps = pre.run(&raw).unwrap();
        assert_eq!(
            steps[0].document["scene"]["ground"][0]["texture"],
            json!(["texture://mask/0", "texture://mask/1"])
        );

        raw["global_evaluators"] = json!({"ground": {"step": ["Preprocessed Assets/other"]}});
        match pre.prepare(&raw).unwrap_err() {
            PipelineError::Config(err) => assert_eq!(err.path, "/scene/ground/0/texture"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_substitution_rejects_unbuilt_texture() {
        let mut document = json!({"scene": {"ground": [{"texture": "Preprocessed Assets/gone"}]}});
        let (path, err) =
            substitute_textures(&mut document, &DocPath::root(), &BuiltTextures::new()).unwrap_err();
        assert_eq!(path, "/scene/ground/0/texture");
        assert_eq!(err, ResolveError::UnknownTexture("gone".to_string()));
    }
}
