//! Project error types.

use std::path::PathBuf;

/// Errors produced while loading or exporting a project.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no project manifest at {0}")]
    ManifestMissing(PathBuf),

    #[error("source directory not found: {0}")]
    SourceMissing(PathBuf),
}
