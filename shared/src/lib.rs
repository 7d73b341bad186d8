//! Shared helpers for sceneforge.
//!
//! - [`fs`] - bounded file reads and YAML document loading
//! - [`seed`] - deterministic seed derivation for steps and texture instances
//! - [`sampling`] - distribution helpers on top of `rand`

pub mod fs;
pub mod sampling;
pub mod seed;

pub use fs::{
    MAX_CONFIG_BYTES, MAX_JOB_BYTES, MAX_MANIFEST_BYTES, MAX_SCHEMA_BYTES, load_yaml_value, parse_yaml_value,
    read_file_with_limit, read_to_string_with_limit,
};
pub use sampling::{gaussian, standard_normal};
pub use seed::{instance_seed, step_seed};
