use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use fluxport_core::{BizType, RegistryError, StoreError, TaskId};
use fluxport_renderer::RenderError;

/// Synchronous rejection of a submission. No task exists when this is
/// returned.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("no export unit registered for biz type '{0}'")]
    ConfigNotFound(BizType),

    #[error("orchestrator is shutting down")]
    ShuttingDown,

    #[error("could not record task: {0}")]
    Store(#[from] StoreError),
}

/// Error surface for runtime configuration, assembly and waiting.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse runtime config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("task store error: {0}")]
    Store(#[from] StoreError),

    #[error("renderer error: {0}")]
    Render(#[from] RenderError),

    #[error("task {task_id} not terminal after {waited:?}")]
    Timeout { task_id: TaskId, waited: Duration },

    #[error("task {0} does not exist")]
    UnknownTask(TaskId),

    #[error("{task} task join failure: {message}")]
    Join { task: &'static str, message: String },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RuntimeError {
    RuntimeError::Io {
        path: path.into(),
        source,
    }
}
