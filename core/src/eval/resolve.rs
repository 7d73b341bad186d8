use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::trace;

use super::sampler::Sampler;
use crate::catalog::Catalog;
use crate::document::{DocPath, GLOBAL_EVALUATORS_KEY, JobDocument, Node};
use crate::error::PipelineError;

/// A document with every evaluator replaced by its value for one step.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDocument {
    pub step: usize,
    /// The resolved document. The `global_evaluators` section is dropped.
    pub value: Value,
    /// Values of the global evaluators for this step.
    pub globals: IndexMap<String, Value>,
}

/// Resolves steps of one document against one catalog.
pub struct StepResolver<'a> {
    document: &'a JobDocument,
    catalog: &'a Catalog,
}

impl<'a> StepResolver<'a> {
    pub fn new(document: &'a JobDocument, catalog: &'a Catalog) -> Self {
        Self { document, catalog }
    }

    /// Resolve a step using the document's own run seed.
    pub fn resolve(&self, step: usize) -> Result<ResolvedDocument, PipelineError> {
        self.resolve_with_seed(step, self.document.run_seed())
    }

    pub fn resolve_with_seed(
        &self,
        step: usize,
        seed: u64,
    ) -> Result<ResolvedDocument, PipelineError> {
        let mut sampler = Sampler::new(self.catalog, seed, step);

        let globals_path = DocPath::root().key(GLOBAL_EVALUATORS_KEY);
        for (name, evaluator) in self.document.globals() {
            let value = sampler
                .evaluate(evaluator)
                .map_err(|source| PipelineError::Step {
                    step,
                    path: globals_path.key(name).pointer(),
                    source,
                })?;
            trace!(step, global = %name, "resolved global evaluator");
            sampler.define_global(name, value);
        }

        let mut out = Map::with_capacity(self.document.sections().len());
        for (key, node) in self.document.sections() {
            if key == GLOBAL_EVALUATORS_KEY {
                continue;
            }
            let value = resolve_node(node, &DocPath::root().key(key), step, &mut sampler)?;
            out.insert(key.clone(), value);
        }

        Ok(ResolvedDocument {
            step,
            value: Value::Object(out),
            globals: sampler.into_globals(),
        })
    }
}

/// Resolve one step of `document`, drawing from the stream seeded by `seed`.
pub fn resolve_step(
    document: &JobDocument,
    step: usize,
    seed: u64,
    catalog: &Catalog,
) -> Result<ResolvedDocument, PipelineError> {
    StepResolver::new(document, catalog).resolve_with_seed(step, seed)
}

fn resolve_node(
    node: &Node,
    path: &DocPath,
    step: usize,
    sampler: &mut Sampler<'_>,
) -> Result<Value, PipelineError> {
    match node {
        Node::Literal(value) => Ok(value.clone()),
        Node::Evaluator(evaluator) => {
            sampler
                .evaluate(evaluator)
                .map_err(|source| PipelineError::Step {
                    step,
                    path: path.pointer(),
                    source,
                })
        }
        Node::Mapping(members) => {
            let mut map = Map::with_capacity(members.len());
            for (key, member) in members {
                map.insert(key.clone(), resolve_node(member, &path.key(key), step, sampler)?);
            }
            Ok(Value::Object(map))
        }
        Node::Sequence(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| resolve_node(item, &path.index(i), step, sampler))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolveError;
    use serde_json::json;

    fn document(body: Value) -> JobDocument {
        let mut raw = json!({"general": {"steps": 3, "seeds": {"numpy": 5}}});
        if let (Some(target), Value::Object(extra)) = (raw.as_object_mut(), body) {
            target.extend(extra);
        }
        JobDocument::from_value(raw).unwrap()
    }

    #[test]
    fn test_resolved_document_has_no_evaluators() {
        let doc = document(json!({
            "scene": {"object": [{"location": {"uniform": [[0, 0, 0], [1, 1, 1]]}, "tag": "x"}]},
        }));
        let catalog = Catalog::default();
        let resolved = StepResolver::new(&doc, &catalog).resolve(0).unwrap();
        let location = &resolved.value["scene"]["object"][0]["location"];
        assert_eq!(location.as_array().unwrap().len(), 3);
        assert_eq!(resolved.value["scene"]["object"][0]["tag"], "x");
        assert!(Node::from_value(&resolved.value).unwrap().is_static());
    }

    #[test]
    fn test_same_seed_same_document() {
        let doc = document(json!({"sensor": {"exposure": {"normal": [0, 1]}}}));
        let catalog = Catalog::default();
        let a = resolve_step(&doc, 2, 11, &catalog).unwrap();
        let b = resolve_step(&doc, 2, 11, &catalog).unwrap();
        let c = resolve_step(&doc, 2, 12, &catalog).unwrap();
        assert_eq!(a, b);
        assert_ne!(a.value, c.value);
    }

    #[test]
    fn test_global_is_shared_within_step() {
        let doc = document(json!({
            "global_evaluators": {"size": {"uniform": [0, 100]}},
            "scene": {"a": "$global.size", "b": {"nested": ["$global.size"]}},
        }));
        let catalog = Catalog::default();
        for step in 0..3 {
            let resolved = resolve_step(&doc, step, 1, &catalog).unwrap();
            let size = resolved.globals["size"].clone();
            assert_eq!(resolved.value["scene"]["a"], size);
            assert_eq!(resolved.value["scene"]["b"]["nested"][0], size);
            assert!(resolved.value.get("global_evaluators").is_none());
        }
    }

    #[test]
    fn test_error_carries_step_and_path() {
        let doc = document(json!({"scene": {"object": [{"size": "$global.missing"}]}}));
        let catalog = Catalog::default();
        match resolve_step(&doc, 1, 0, &catalog) {
            Err(PipelineError::Step { step, path, source }) => {
                assert_eq!(step, 1);
                assert_eq!(path, "/scene/object/0/size");
                assert_eq!(source, ResolveError::UnknownGlobalEvaluator("missing".into()));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
