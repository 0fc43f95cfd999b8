//! fluxport core library: export units, task model, registry, contracts.
//!
//! - [`types`]: newtypes, [`ExportUnit`], parameter shapes, [`RowSet`]
//! - [`task`]: [`ExportTask`] and its status transitions
//! - [`registry`]: [`ConfigRegistry`] and YAML unit manifests
//! - [`contracts`]: collaborator traits the orchestrator depends on
//! - [`error`]: error enums shared across the workspace

pub mod contracts;
pub mod error;
pub mod registry;
pub mod task;
pub mod types;

pub use contracts::{
    AllowAll, AllowList, Authorizer, AuthorizerLocator, BlobStore, Dispatcher, IdentityProvider,
    NamedAuthorizers, StaticIdentity, TaskStore,
};
pub use error::{
    BlobError, DispatchError, LocateError, RegistryError, StoreError, TransitionError,
};
pub use registry::ConfigRegistry;
pub use task::{ExportTask, TaskStatus};
pub use types::{BizType, ExportUnit, OwnerId, ParamShape, ParamShaped, RowSet, TaskId};
