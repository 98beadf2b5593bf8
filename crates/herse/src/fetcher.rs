//! File-backed schema content fetcher.
//!
//! Serves inline documents directly and `path:` locations from disk (YAML
//! or JSON). Remote and registry locations belong to external
//! collaborators and are reported as unsupported.

use std::path::Path;

use serde_json::Value;

use herse_composer::{FetchError, SchemaFetcher, SchemaLocation};

/// Fetcher for CLI runs: inline documents plus files on disk. Relative
/// `path:` locations must already be resolved against their manifest's
/// directory (see `resolve_locations` in `main.rs`).
#[derive(Debug, Default)]
pub struct FileFetcher;

impl SchemaFetcher for FileFetcher {
    fn fetch(&self, location: &SchemaLocation) -> Result<Value, FetchError> {
        match location {
            SchemaLocation::Inline { inline } => Ok(inline.clone()),
            SchemaLocation::Path { path } => read_document(Path::new(path)),
            other => Err(FetchError::Unsupported(other.describe())),
        }
    }
}

/// Read a schema document from disk. YAML parsing also accepts JSON.
fn read_document(path: &Path) -> Result<Value, FetchError> {
    let content = std::fs::read_to_string(path).map_err(|e| FetchError::Io {
        location: path.display().to_string(),
        source: e,
    })?;
    serde_yaml::from_str(&content).map_err(|e| FetchError::Invalid {
        location: path.display().to_string(),
        message: e.to_string(),
    })
}
