//! Error types for fluxport-renderer.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from rendering a row set.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Nothing to render; an export needs at least one row.
    #[error("no rows to render")]
    EmptyInput,

    /// Tera template engine error.
    #[error("template engine error: {0}")]
    Tera(#[from] tera::Error),

    /// Filesystem error while loading user templates.
    #[error("template io error at {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}
