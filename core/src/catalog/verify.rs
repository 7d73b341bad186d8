use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::debug;

use super::{Catalog, CatalogEntry, CatalogError};

impl Catalog {
    /// Check that every referenced file exists and matches its recorded
    /// checksum. Returns the number of files checked.
    ///
    /// A `<field>_sha256` checksum applies to single-file fields only.
    pub fn verify(&self) -> Result<usize, CatalogError> {
        let mut checked = 0;
        for entry in self.entries() {
            for (field, paths) in &entry.files {
                for path in paths {
                    if !path.is_file() {
                        return Err(missing(entry, path));
                    }
                    checked += 1;
                }
                if let (Some(expected), [path]) = (entry.checksums.get(field), paths.as_slice()) {
                    let actual = sha256_file(path).map_err(|e| CatalogError::Read {
                        path: path.clone(),
                        message: e.to_string(),
                    })?;
                    if !actual.eq_ignore_ascii_case(expected) {
                        return Err(CatalogError::ChecksumMismatch {
                            library: entry.library.clone(),
                            key: entry.key.clone(),
                            path: path.clone(),
                        });
                    }
                    debug!(asset = %entry.reference(), field = %field, "checksum ok");
                }
            }
        }
        Ok(checked)
    }
}

fn missing(entry: &CatalogEntry, path: &Path) -> CatalogError {
    CatalogError::MissingFile {
        library: entry.library.clone(),
        key: entry.key.clone(),
        path: path.to_path_buf(),
    }
}

/// Hex-encoded SHA-256 of a file's contents.
pub(crate) fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    std::io::copy(&mut reader, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}
