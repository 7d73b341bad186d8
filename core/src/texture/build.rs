//! Runs a texture definition's operation chain.

use proc_gen::texture::{
    Blur, Clip, Contrast, Dilate, Erode, KeepOverlap, PerlinConfig, TextureApply, TextureBuffer,
};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use rayon::prelude::*;
use sceneforge_shared::instance_seed;

use super::{BuiltTextures, Operation, TextureDefinition, TextureError};

/// Build every instance of `def`.
///
/// Instance `i` starts from a blank canvas and draws from its own generator
/// seeded with `config.seed + textures_seed + i`. Textures referenced by the
/// chain must already be in `built`.
pub fn build_texture(
    def: &TextureDefinition,
    built: &BuiltTextures,
    textures_seed: u64,
) -> Result<Vec<TextureBuffer>, TextureError> {
    (0..def.config.num_textures)
        .into_par_iter()
        .map(|instance| build_instance(def, built, textures_seed, instance))
        .collect()
}

fn build_instance(
    def: &TextureDefinition,
    built: &BuiltTextures,
    textures_seed: u64,
    instance: usize,
) -> Result<TextureBuffer, TextureError> {
    let (width, height) = (def.config.width, def.config.height);
    let mut rng = Pcg64::seed_from_u64(instance_seed(def.config.seed, textures_seed, instance));
    let mut current = TextureBuffer::new(width, height);

    for op in &def.ops {
        match op {
            Operation::Perlin(p) => {
                current = PerlinConfig {
                    octaves: p.octaves,
                    persistence: p.persistence,
                    lacunarity: p.lacunarity,
                    frequency: p.frequency,
                    seed: rng.random(),
                }
                .generate(width, height);
            }
            Operation::MathExpression(expr) => {
                let inputs = expr
                    .variables()
                    .iter()
                    .map(|name| input(def, built, name, instance))
                    .collect::<Result<Vec<_>, _>>()?;
                let inputs: Vec<&TextureBuffer> = inputs.iter().collect();
                current = expr
                    .evaluate(&current, &inputs)
                    .map_err(|source| TextureError::Expression {
                        texture: def.id.clone(),
                        source,
                    })?;
            }
            Operation::InputTexture(id) => current = input(def, built, id, instance)?,
            Operation::Erode {
                kernel_size,
                iterations,
            } => {
                current.apply(Erode {
                    kernel_size: *kernel_size,
                    iterations: *iterations,
                });
            }
            Operation::Dilate {
                kernel_size,
                iterations,
            } => {
                current.apply(Dilate {
                    kernel_size: *kernel_size,
                    iterations: *iterations,
                });
            }
            Operation::Clip { min, max } => {
                current.apply(Clip {
                    min: *min,
                    max: *max,
                });
            }
            Operation::Blur { kernel_size } => {
                current.apply(Blur {
                    kernel_size: *kernel_size,
                });
            }
            Operation::Contrast(factor) => {
                current.apply(Contrast { factor: *factor });
            }
            Operation::KeepOverlap(id) => {
                let mask = input(def, built, id, instance)?;
                current.apply(KeepOverlap { mask: &mask });
            }
            Operation::RandomRectangles(rects) => rects.stamp(&mut current, &mut rng),
        }
    }
    Ok(current)
}

/// Instance of a referenced texture, resampled to `def`'s size.
fn input(
    def: &TextureDefinition,
    built: &BuiltTextures,
    id: &str,
    instance: usize,
) -> Result<TextureBuffer, TextureError> {
    built
        .get(id)
        .and_then(|texture| texture.instance(instance))
        .map(|buffer| buffer.resized(def.config.width, def.config.height))
        .ok_or_else(|| TextureError::UnknownTexture {
            texture: def.id.clone(),
            reference: id.to_string(),
        })
}
