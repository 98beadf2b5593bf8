use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conflict::NamespaceKind;

/// Errors produced during composition.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// Schema parsing failed (fatal only when a caller parses directly; the
    /// mergers degrade this to a warning + exclusion).
    #[error(transparent)]
    Parse(#[from] herse_spec_parser::ParseError),

    /// E2010: naming conflict under the `error` strategy. Aborts the merge;
    /// no partial unified document is produced.
    #[error("E2010: naming conflict on {namespace} '{key}': contributed by both '{first_service}' and '{second_service}' (strategy: error)")]
    Conflict {
        namespace: NamespaceKind,
        key: String,
        first_service: String,
        second_service: String,
    },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A non-fatal composition issue, reported alongside the merge result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeWarning {
    pub code: String,
    pub message: String,
    pub location: Option<String>,
}

/// Errors produced by schema content fetchers.
#[derive(Debug, Error)]
pub enum FetchError {
    /// E2021: the fetcher has no content for the location.
    #[error("E2021: no schema content for {0}")]
    Missing(String),

    /// The fetcher does not handle this location kind.
    #[error("unsupported schema location: {0}")]
    Unsupported(String),

    /// Underlying I/O failure (file-based fetchers).
    #[error("I/O error reading {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },

    /// Content exists but is not a valid document tree.
    #[error("invalid schema content at {location}: {message}")]
    Invalid { location: String, message: String },
}
