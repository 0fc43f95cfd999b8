//! Error types for fluxport-pipeline.

use std::path::PathBuf;

use thiserror::Error;

use fluxport_core::{BlobError, DispatchError, StoreError};
use fluxport_renderer::RenderError;

/// Why a pipeline run ended in FAILED.
///
/// The `Display` text of this error is what gets recorded as the task's
/// error message, so every variant keeps the underlying cause verbatim.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The business query returned no rows.
    #[error("query {target}.{operation} returned no rows")]
    EmptyResult { target: String, operation: String },

    #[error("fetch failed: {0}")]
    Fetch(#[from] DispatchError),

    #[error("render failed: {0}")]
    Render(#[from] RenderError),

    #[error("publish failed: {0}")]
    Publish(#[from] BlobError),

    /// The store refused a terminal write.
    #[error("task store error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn store_io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`BlobError::Io`].
pub(crate) fn blob_io_err(path: impl Into<PathBuf>, source: std::io::Error) -> BlobError {
    BlobError::Io {
        path: path.into(),
        source,
    }
}
