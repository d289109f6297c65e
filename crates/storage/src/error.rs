//! Error types for artifact and manifest storage.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while persisting artifacts or the manifest.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("render failed: {0}")]
    Render(#[from] renderer::RenderError),

    /// Refused to write an artifact for a fully masked grid.
    #[error("grid has no valid cells, artifact not written")]
    NoValidData,
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
