//! Error types for fluxport-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::task::TaskStatus;
use crate::types::{ParamShape, TaskId};

/// Errors loading unit manifests into the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse unit manifest at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A manifest entry with a blank `biz_type`.
    #[error("unit manifest at {path} has an entry with an empty biz_type")]
    BlankBizType { path: PathBuf },
}

/// Rejected writes to an [`ExportTask`](crate::task::ExportTask).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("task {task_id} is already {status}")]
    AlreadyTerminal { task_id: TaskId, status: TaskStatus },

    #[error("task {task_id} progress cannot go from {current} back to {requested}")]
    ProgressRegressed {
        task_id: TaskId,
        current: u8,
        requested: u8,
    },
}

/// Failures resolving or invoking a business operation.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no handler registered for {target}.{operation}")]
    TargetNotFound { target: String, operation: String },

    #[error("{target}.{operation} accepts {actual} parameters, unit declares {expected}")]
    ShapeMismatch {
        target: String,
        operation: String,
        expected: ParamShape,
        actual: ParamShape,
    },

    #[error("parameters do not fit shape {shape}: {source}")]
    InvalidParams {
        shape: ParamShape,
        #[source]
        source: serde_json::Error,
    },

    #[error("rows returned by {target}.{operation} are not serializable: {source}")]
    Rows {
        target: String,
        operation: String,
        #[source]
        source: serde_json::Error,
    },

    /// The handler itself failed; the message is kept verbatim.
    #[error("{0}")]
    Invocation(String),
}

/// Failures of a task store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task {0} already exists")]
    Duplicate(TaskId),

    #[error("task {0} not found")]
    NotFound(TaskId),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("task ledger JSON error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures of artifact storage.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid artifact file name '{0}'")]
    InvalidName(String),

    #[error("artifact url '{0}' is not managed by this store")]
    ForeignUrl(String),
}

/// A named authorizer could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocateError {
    #[error("no authorizer named '{0}'")]
    NotFound(String),
}
