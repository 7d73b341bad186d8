//! Filesystem helpers shared across sceneforge tools and the core library.

use std::path::Path;

use anyhow::{Context, Result};

/// Maximum allowed job document size.
pub const MAX_JOB_BYTES: u64 = 16 * 1024 * 1024; // 16 MiB
/// Maximum allowed size of a single library manifest or catalog file.
pub const MAX_MANIFEST_BYTES: u64 = 64 * 1024 * 1024; // 64 MiB
/// Maximum allowed schema document size.
pub const MAX_SCHEMA_BYTES: u64 = 8 * 1024 * 1024; // 8 MiB
/// Maximum allowed tool configuration file size.
pub const MAX_CONFIG_BYTES: u64 = 1024 * 1024; // 1 MiB

/// Read a file into memory with a size cap.
pub fn read_file_with_limit(path: &Path, max_bytes: u64) -> Result<Vec<u8>> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Failed to read file metadata: {}", path.display()))?;
    let len = metadata.len();
    if len > max_bytes {
        anyhow::bail!(
            "File too large: {} ({} bytes, max {} bytes)",
            path.display(),
            len,
            max_bytes
        );
    }
    std::fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))
}

/// Read a UTF-8 text file into memory with a size cap.
pub fn read_to_string_with_limit(path: &Path, max_bytes: u64) -> Result<String> {
    let bytes = read_file_with_limit(path, max_bytes)?;
    String::from_utf8(bytes).with_context(|| format!("File is not valid UTF-8: {}", path.display()))
}

/// Parse YAML (or JSON, which is a YAML subset) into an order-preserving value tree.
pub fn parse_yaml_value(content: &str) -> Result<serde_json::Value> {
    let value: serde_json::Value = serde_yaml::from_str(content).context("Failed to parse YAML")?;
    Ok(value)
}

/// Load a YAML document from disk.
///
/// An empty file yields `Value::Null`.
pub fn load_yaml_value(path: &Path, max_bytes: u64) -> Result<serde_json::Value> {
    let content = read_to_string_with_limit(path, max_bytes)?;
    if content.trim().is_empty() {
        return Ok(serde_json::Value::Null);
    }
    parse_yaml_value(&content).with_context(|| format!("Invalid YAML in {}", path.display()))
}
