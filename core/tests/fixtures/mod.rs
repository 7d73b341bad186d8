//! Shared fixtures: a crawled asset library and job documents.

use std::fs;
use std::path::Path;

use sceneforge_core::catalog::{MANIFEST_NAME, crawl};
use sceneforge_core::{Catalog, CompositeSchema, PluginRegistry, SchemaComposer};
use serde_json::Value;

/// Parse an inline YAML job.
pub fn job(yaml: &str) -> Value {
    sceneforge_shared::parse_yaml_value(yaml).expect("Fixture job is valid YAML")
}

pub fn registry() -> PluginRegistry {
    PluginRegistry::with_builtins().expect("Built-in plugins register")
}

pub fn schema(registry: &PluginRegistry, catalog: &Catalog) -> CompositeSchema {
    SchemaComposer::with_base_schema()
        .expect("Base schema parses")
        .plugins(registry)
        .catalog(catalog)
        .build()
        .expect("Composite schema builds")
}

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().expect("Fixture path has a parent"))
        .expect("Failed to create fixture dir");
    fs::write(path, content).expect("Failed to write fixture file");
}

/// A `Trees` library with two tree models and a rock, crawled from `dir`.
pub fn tree_catalog(dir: &Path) -> Catalog {
    let root = dir.join("nature");
    write(&root.join("trees/tree_01.glb"), "glb");
    write(&root.join("trees/tree_02.glb"), "glb");
    write(&root.join("rocks/rock_01.glb"), "glb");
    write(
        &root.join(MANIFEST_NAME),
        "name: Trees\ndescription: Trees and rocks\n",
    );
    write(
        &root.join("trees").join(MANIFEST_NAME),
        concat!(
            "assets:\n",
            "  Tree_01:\n    type: model\n    tags: [tree]\n    filepath: trees/tree_01.glb\n",
            "  Tree_02:\n    type: model\n    tags: [tree]\n    filepath: trees/tree_02.glb\n",
        ),
    );
    write(
        &root.join("rocks").join(MANIFEST_NAME),
        "assets:\n  Rock_01:\n    type: model\n    filepath: rocks/rock_01.glb\n",
    );
    crawl(&[dir]).expect("Fixture library crawls")
}

/// A minimal valid job around the given scene and transformations sections.
pub fn scene_job(steps: usize, scene: &str) -> Value {
    job(&format!(
        "general:\n  steps: {steps}\n  seeds:\n    numpy: 42\nscene:\n{scene}\nsensor: {{}}\n"
    ))
}
