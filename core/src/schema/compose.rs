use serde_json::{Map, Value, json};
use tracing::debug;

use super::{CompositeSchema, SchemaError};
use crate::catalog::Catalog;
use crate::plugin::{PluginKind, PluginRegistry};

const BASE_SCHEMA: &str = include_str!("base_schema.yaml");

/// A plugin's contribution to the composite schema.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaFragment {
    pub kind: PluginKind,
    pub id: String,
    pub schema: Value,
}

/// The built-in base schema.
pub fn base_schema() -> Result<Value, SchemaError> {
    sceneforge_shared::parse_yaml_value(BASE_SCHEMA).map_err(|e| SchemaError::Malformed {
        pointer: "/".to_string(),
        message: format!("{e:#}"),
    })
}

/// Splice `fragments` into `base` and compile the result.
///
/// Neither input is modified.
pub fn compose(base: &Value, fragments: &[SchemaFragment]) -> Result<CompositeSchema, SchemaError> {
    let mut document = base.clone();
    for fragment in fragments {
        splice(&mut document, fragment)?;
    }
    CompositeSchema::from_document(document)
}

/// Builder over [`compose`] that gathers fragments from a plugin registry and
/// model references from a catalog.
pub struct SchemaComposer {
    base: Value,
    fragments: Vec<SchemaFragment>,
    models: Vec<String>,
}

impl SchemaComposer {
    pub fn new(base: Value) -> Self {
        Self {
            base,
            fragments: Vec::new(),
            models: Vec::new(),
        }
    }

    /// Start from the built-in base schema.
    pub fn with_base_schema() -> Result<Self, SchemaError> {
        Ok(Self::new(base_schema()?))
    }

    pub fn fragment(mut self, fragment: SchemaFragment) -> Self {
        self.fragments.push(fragment);
        self
    }

    /// Add the fragment of every registered plugin that has one.
    pub fn plugins(mut self, registry: &PluginRegistry) -> Self {
        self.fragments.extend(registry.fragments());
        self
    }

    /// Offer the catalog's models as `definitions.asset_models.enum`.
    pub fn catalog(mut self, catalog: &Catalog) -> Self {
        self.models.extend(catalog.model_references());
        self
    }

    pub fn build(self) -> Result<CompositeSchema, SchemaError> {
        let mut base = self.base;
        if !self.models.is_empty() {
            let definitions = object_at(&mut base, "/definitions")?;
            definitions.insert(
                "asset_models".to_string(),
                json!({"type": "string", "enum": self.models}),
            );
        }
        let schema = compose(&base, &self.fragments)?;
        debug!(fragments = self.fragments.len(), "composed schema");
        Ok(schema)
    }
}

fn splice(document: &mut Value, fragment: &SchemaFragment) -> Result<(), SchemaError> {
    let pointer = match fragment.kind {
        PluginKind::Output => "/definitions".to_string(),
        kind => format!("/properties/{}/properties", kind.section()),
    };
    insert_unique(document, &pointer, &fragment.id, fragment.schema.clone())?;

    if fragment.kind == PluginKind::Output {
        let reference = json!({"$ref": format!("#/definitions/{}", fragment.id)});
        insert_unique(document, "/definitions/outputs/properties", &fragment.id, reference)?;
    }
    Ok(())
}

fn insert_unique(
    document: &mut Value,
    pointer: &str,
    id: &str,
    schema: Value,
) -> Result<(), SchemaError> {
    let target = object_at(document, pointer)?;
    if target.contains_key(id) {
        return Err(SchemaError::DuplicateFragment {
            id: id.to_string(),
            pointer: pointer.to_string(),
        });
    }
    target.insert(id.to_string(), schema);
    Ok(())
}

fn object_at<'a>(document: &'a mut Value, pointer: &str) -> Result<&'a mut Map<String, Value>, SchemaError> {
    document
        .pointer_mut(pointer)
        .and_then(Value::as_object_mut)
        .ok_or_else(|| SchemaError::MissingExtensionPoint(pointer.to_string()))
}
