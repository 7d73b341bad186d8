//! Deterministic seed derivation.
//!
//! Every generation step gets its own generator seed, derived from the run-level
//! seed and the step index. Steps can therefore be resolved in any order, or in
//! parallel, and still reproduce the same values.

use xxhash_rust::xxh3::xxh3_64_with_seed;

/// Seed for the generator of one step.
pub fn step_seed(run_seed: u64, step: usize) -> u64 {
    xxh3_64_with_seed(&(step as u64).to_le_bytes(), run_seed)
}

/// Seed for one instance of a procedural texture.
///
/// `texture_seed` comes from the texture's own config, `textures_seed` from the
/// job-wide `general.seeds.textures`.
pub fn instance_seed(texture_seed: u64, textures_seed: u64, instance: usize) -> u64 {
    texture_seed
        .wrapping_add(textures_seed)
        .wrapping_add(instance as u64)
}
