//! Dependency planning for a job's texture definitions.
//!
//! Runs once per job, on the unresolved document: dependencies are collected
//! from every string an operation could resolve to, including the choices of
//! a `$global` it names, so a reference that only some steps select is still
//! checked before the first step runs.

use indexmap::IndexMap;
use proc_gen::texture::Expr;

use super::TextureError;
use crate::document::Node;
use crate::eval::Evaluator;

#[derive(Debug, Clone)]
pub struct PlannedTexture {
    pub id: String,
    pub node: Node,
    /// Indices of earlier textures this one may read.
    pub dependencies: Vec<usize>,
    pub is_static: bool,
}

/// Texture definitions in declaration order, grouped into build levels.
///
/// Every texture of a level only depends on textures of earlier levels, so
/// a level can be built in parallel.
#[derive(Debug, Clone, Default)]
pub struct TexturePlan {
    textures: Vec<PlannedTexture>,
    levels: Vec<Vec<usize>>,
}

impl TexturePlan {
    pub fn new(
        definitions: &IndexMap<String, Node>,
        globals: &IndexMap<String, Evaluator>,
    ) -> Result<Self, TextureError> {
        let mut textures: Vec<PlannedTexture> = Vec::with_capacity(definitions.len());
        let mut depth: Vec<usize> = Vec::with_capacity(definitions.len());

        for (position, (id, node)) in definitions.iter().enumerate() {
            if !is_valid_id(id) {
                return Err(TextureError::InvalidId(id.clone()));
            }
            let mut dependencies = Vec::new();
            for reference in referenced_ids(id, node, globals)? {
                let index = match definitions.get_index_of(reference.as_str()) {
                    Some(i) if i == position => return Err(TextureError::CyclicReference(id.clone())),
                    Some(i) if i > position => {
                        return Err(TextureError::ForwardReference {
                            texture: id.clone(),
                            reference,
                        });
                    }
                    Some(i) => i,
                    None => {
                        return Err(TextureError::UnknownTexture {
                            texture: id.clone(),
                            reference,
                        });
                    }
                };
                if !dependencies.contains(&index) {
                    dependencies.push(index);
                }
            }

            let is_static = node.is_static() && dependencies.iter().all(|&d| textures[d].is_static);
            depth.push(dependencies.iter().map(|&d| depth[d] + 1).max().unwrap_or(0));
            textures.push(PlannedTexture {
                id: id.clone(),
                node: node.clone(),
                dependencies,
                is_static,
            });
        }

        let mut levels: Vec<Vec<usize>> = Vec::new();
        for (index, &level) in depth.iter().enumerate() {
            if levels.len() <= level {
                levels.resize_with(level + 1, Vec::new);
            }
            levels[level].push(index);
        }

        Ok(Self { textures, levels })
    }

    pub fn textures(&self) -> &[PlannedTexture] {
        &self.textures
    }

    pub fn levels(&self) -> &[Vec<usize>] {
        &self.levels
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&PlannedTexture> {
        self.textures.iter().find(|t| t.id == id)
    }
}

/// Ids end up in output file names.
fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Texture ids an unresolved definition may reference.
fn referenced_ids(
    texture: &str,
    node: &Node,
    globals: &IndexMap<String, Evaluator>,
) -> Result<Vec<String>, TextureError> {
    let mut ids = Vec::new();
    let Some(Node::Sequence(ops)) = node.get("ops") else {
        return Ok(ids);
    };

    for (name, params) in ops.iter().filter_map(Node::as_mapping).flatten() {
        match name.as_str() {
            "input_texture" => ids.extend(params.string_candidates(globals).into_iter().map(str::to_string)),
            "keep_overlap" => {
                if let Some(target) = params.get("texture") {
                    ids.extend(target.string_candidates(globals).into_iter().map(str::to_string));
                }
            }
            "math_expression" => {
                for source in params.string_candidates(globals) {
                    let expr = Expr::parse(source).map_err(|source| TextureError::Expression {
                        texture: texture.to_string(),
                        source,
                    })?;
                    ids.extend(expr.variables().iter().cloned());
                }
            }
            _ => {}
        }
    }
    Ok(ids)
}
