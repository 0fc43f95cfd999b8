//! Collaborator contracts the orchestrator depends on.
//!
//! | Contract              | Implemented by                                   |
//! |-----------------------|--------------------------------------------------|
//! | [`Dispatcher`]        | `fluxport_pipeline::HandlerTable`                |
//! | [`TaskStore`]         | `fluxport_pipeline::{MemoryTaskStore, FileTaskStore}` |
//! | [`BlobStore`]         | `fluxport_pipeline::LocalBlobStore`              |
//! | [`IdentityProvider`]  | [`StaticIdentity`]                               |
//! | [`Authorizer`]        | [`AllowAll`], [`AllowList`]                      |
//! | [`AuthorizerLocator`] | [`NamedAuthorizers`]                             |
//!
//! Every contract is synchronous and may block; the runtime calls them from
//! blocking worker threads.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{BlobError, DispatchError, LocateError, StoreError};
use crate::task::ExportTask;
use crate::types::{BizType, OwnerId, ParamShape, RowSet, TaskId};

/// Resolves a business operation by name and runs it.
pub trait Dispatcher: Send + Sync {
    fn invoke(
        &self,
        target: &str,
        operation: &str,
        shape: &ParamShape,
        params: &Value,
    ) -> Result<RowSet, DispatchError>;
}

/// Durable record of every task.
///
/// Implementations should coalesce rapid non-terminal progress writes for the
/// same task; terminal writes must always be applied.
pub trait TaskStore: Send + Sync {
    fn create_task(&self, task: ExportTask) -> Result<(), StoreError>;

    fn update_progress(&self, task_id: &TaskId, progress: u8) -> Result<(), StoreError>;

    fn mark_success(&self, task_id: &TaskId, artifact_url: &str) -> Result<(), StoreError>;

    fn mark_failed(&self, task_id: &TaskId, message: &str) -> Result<(), StoreError>;

    fn find_by_id(&self, task_id: &TaskId) -> Result<Option<ExportTask>, StoreError>;

    /// At most `limit` tasks of `owner_id`, newest first.
    fn find_by_owner(&self, owner_id: &OwnerId, limit: usize)
        -> Result<Vec<ExportTask>, StoreError>;
}

/// Artifact storage.
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `file_name` and return the download URL.
    fn upload(&self, file_name: &str, bytes: &[u8]) -> Result<String, BlobError>;

    /// Best-effort removal. Failures are logged by the implementation and
    /// never surfaced.
    fn delete(&self, _url: &str) {}
}

/// Resolves the caller of the current request.
pub trait IdentityProvider: Send + Sync {
    fn current_owner_id(&self) -> OwnerId;
}

/// Permission decision for one owner and business type.
pub trait Authorizer: Send + Sync {
    fn has_permission(&self, owner_id: &OwnerId, biz_type: &BizType) -> bool;
}

/// Looks up named authorizers configured on export units.
pub trait AuthorizerLocator: Send + Sync {
    fn resolve(&self, name: &str) -> Result<Arc<dyn Authorizer>, LocateError>;
}

// ---------------------------------------------------------------------------
// Stock implementations
// ---------------------------------------------------------------------------

/// Identity fixed at construction.
#[derive(Debug, Clone)]
pub struct StaticIdentity(pub OwnerId);

impl IdentityProvider for StaticIdentity {
    fn current_owner_id(&self) -> OwnerId {
        self.0.clone()
    }
}

/// Permits every export.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn has_permission(&self, _owner_id: &OwnerId, _biz_type: &BizType) -> bool {
        true
    }
}

/// Permits a fixed set of owners.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    owners: BTreeSet<OwnerId>,
}

impl AllowList {
    pub fn new<I, O>(owners: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<OwnerId>,
    {
        Self {
            owners: owners.into_iter().map(Into::into).collect(),
        }
    }
}

impl Authorizer for AllowList {
    fn has_permission(&self, owner_id: &OwnerId, biz_type: &BizType) -> bool {
        let allowed = self.owners.contains(owner_id);
        if !allowed {
            tracing::warn!(owner = %owner_id, biz_type = %biz_type, "owner not on allow list");
        }
        allowed
    }
}

/// Name → authorizer table handed to the access gate.
#[derive(Clone, Default)]
pub struct NamedAuthorizers {
    by_name: HashMap<String, Arc<dyn Authorizer>>,
}

impl NamedAuthorizers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, authorizer: impl Authorizer + 'static) -> Self {
        self.by_name.insert(name.into(), Arc::new(authorizer));
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, authorizer: Arc<dyn Authorizer>) {
        self.by_name.insert(name.into(), authorizer);
    }
}

impl fmt::Debug for NamedAuthorizers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.by_name.keys().collect();
        names.sort();
        f.debug_struct("NamedAuthorizers").field("names", &names).finish()
    }
}

impl AuthorizerLocator for NamedAuthorizers {
    fn resolve(&self, name: &str) -> Result<Arc<dyn Authorizer>, LocateError> {
        self.by_name
            .get(name)
            .cloned()
            .ok_or_else(|| LocateError::NotFound(name.to_owned()))
    }
}
