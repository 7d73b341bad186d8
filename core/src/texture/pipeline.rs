use std::sync::Arc;

use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, info};

use super::{
    BuiltTexture, BuiltTextures, PlannedTexture, TextureDefinition, TextureError, TexturePlan,
    build_texture,
};
use crate::document::{JobDocument, TEXTURES_KEY};

/// Builds a job's textures, caching the static ones across steps.
#[derive(Debug, Clone, Default)]
pub struct TexturePipeline {
    plan: TexturePlan,
    cache: BuiltTextures,
    textures_seed: u64,
}

impl TexturePipeline {
    /// Plan the job's textures and build every static one.
    pub fn prepare(document: &JobDocument) -> Result<Self, TextureError> {
        let plan = match document.textures() {
            Some(definitions) => TexturePlan::new(definitions, document.globals())?,
            None => TexturePlan::default(),
        };
        let mut pipeline = Self {
            plan,
            cache: BuiltTextures::new(),
            textures_seed: document.general().seeds.textures,
        };

        let cache = pipeline.build_levels(BuiltTextures::new(), true, |texture| {
            let value = texture
                .node
                .to_static_value()
                .ok_or_else(|| TextureError::InvalidParameter {
                    texture: texture.id.clone(),
                    message: "static texture contains an evaluator".to_string(),
                })?;
            TextureDefinition::from_value(&texture.id, &value)
        })?;
        if !cache.is_empty() {
            info!("Built {} static texture(s)", cache.len());
        }
        pipeline.cache = cache;
        Ok(pipeline)
    }

    pub fn plan(&self) -> &TexturePlan {
        &self.plan
    }

    /// Textures built once for the whole job.
    pub fn cached(&self) -> &BuiltTextures {
        &self.cache
    }

    pub fn is_empty(&self) -> bool {
        self.plan.is_empty()
    }

    /// All textures of one step, in declaration order.
    ///
    /// Dynamic textures are parsed from `resolved`, the step's resolved
    /// document; static ones come from the cache.
    pub fn build_step(&self, resolved: &Value) -> Result<BuiltTextures, TextureError> {
        let definitions = resolved.get(TEXTURES_KEY);
        let mut built = self.build_levels(self.cache.clone(), false, |texture| {
            let value = definitions
                .and_then(|d| d.get(&texture.id))
                .ok_or_else(|| TextureError::InvalidParameter {
                    texture: texture.id.clone(),
                    message: "missing from the resolved document".to_string(),
                })?;
            TextureDefinition::from_value(&texture.id, value)
        })?;

        Ok(self
            .plan
            .textures()
            .iter()
            .filter_map(|t| built.swap_remove(&t.id).map(|b| (t.id.clone(), b)))
            .collect())
    }

    /// Build the textures whose static flag equals `statics`, level by level.
    fn build_levels<F>(
        &self,
        mut built: BuiltTextures,
        statics: bool,
        definition: F,
    ) -> Result<BuiltTextures, TextureError>
    where
        F: Fn(&PlannedTexture) -> Result<TextureDefinition, TextureError> + Sync,
    {
        for level in self.plan.levels() {
            let pending: Vec<&PlannedTexture> = level
                .iter()
                .map(|&i| &self.plan.textures()[i])
                .filter(|t| t.is_static == statics)
                .collect();

            let results = pending
                .par_iter()
                .map(|texture| {
                    let def = definition(texture)?;
                    for reference in def.dependencies() {
                        let planned = texture
                            .dependencies
                            .iter()
                            .any(|&d| self.plan.textures()[d].id == reference);
                        if !planned {
                            return Err(TextureError::UnknownTexture {
                                texture: def.id.clone(),
                                reference: reference.to_string(),
                            });
                        }
                    }
                    let instances = build_texture(&def, &built, self.textures_seed)?;
                    debug!(
                        "Built texture '{}' ({} x {}, {} instance(s))",
                        def.id,
                        def.config.width,
                        def.config.height,
                        instances.len()
                    );
                    Ok((
                        texture.id.clone(),
                        BuiltTexture {
                            instances: Arc::new(instances),
                            bit_depth: def.config.bit_depth,
                            is_static: texture.is_static,
                        },
                    ))
                })
                .collect::<Result<Vec<_>, TextureError>>()?;
            built.extend(results);
        }
        Ok(built)
    }
}
