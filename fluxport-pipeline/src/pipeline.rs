//! The per-task export pipeline: fetch → render → publish.
//!
//! Milestones written to the task store, in order:
//!
//! | Step          | Progress after |
//! |---------------|----------------|
//! | start         | 0              |
//! | fetch rows    | 50             |
//! | render        | 80             |
//! | publish       | 100 (SUCCESS)  |
//!
//! A failure at any step ends the run with exactly one `mark_failed`; the
//! progress stays at the last milestone reached. Nothing is retried.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use fluxport_core::{BizType, BlobStore, Dispatcher, ExportUnit, StoreError, TaskId, TaskStore};
use fluxport_renderer::Renderer;

use crate::error::PipelineError;

pub const PROGRESS_STARTED: u8 = 0;
pub const PROGRESS_FETCHED: u8 = 50;
pub const PROGRESS_RENDERED: u8 = 80;

/// Artifact file name for a unit rendered at `at`:
/// `{biz_type}_{yyyyMMdd_HHmmss}.{ext}` in UTC.
///
/// Two exports of the same business type within one second share a name.
pub fn artifact_file_name(biz_type: &BizType, at: DateTime<Utc>, extension: &str) -> String {
    format!("{}_{}.{}", biz_type, at.format("%Y%m%d_%H%M%S"), extension)
}

/// Collaborators one pipeline run needs.
#[derive(Clone)]
pub struct Pipeline {
    dispatcher: Arc<dyn Dispatcher>,
    renderer: Arc<dyn Renderer>,
    blob: Arc<dyn BlobStore>,
    store: Arc<dyn TaskStore>,
}

impl Pipeline {
    pub fn new(
        dispatcher: Arc<dyn Dispatcher>,
        renderer: Arc<dyn Renderer>,
        blob: Arc<dyn BlobStore>,
        store: Arc<dyn TaskStore>,
    ) -> Self {
        Self {
            dispatcher,
            renderer,
            blob,
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    /// Run the pipeline for one task to a terminal state.
    ///
    /// Returns the artifact URL on success. Errors are already recorded on the
    /// task when this returns; the caller only needs them for logging.
    pub fn execute(
        &self,
        task_id: &TaskId,
        unit: &ExportUnit,
        params: &Value,
    ) -> Result<String, PipelineError> {
        tracing::info!(task_id = %task_id, biz_type = %unit.biz_type, "export started");

        let url = match self.run(task_id, unit, params) {
            Ok(url) => url,
            Err(err) => {
                let message = err.to_string();
                tracing::error!(task_id = %task_id, biz_type = %unit.biz_type, "export failed: {message}");
                if let Err(store_err) = self.store.mark_failed(task_id, &message) {
                    tracing::error!(task_id = %task_id, "could not record failure: {store_err}");
                }
                return Err(err);
            }
        };

        if let Err(err) = self.store.mark_success(task_id, &url) {
            tracing::error!(task_id = %task_id, %url, "could not record success: {err}");
            if matches!(err, StoreError::NotFound(_)) {
                self.blob.delete(&url);
            }
            return Err(err.into());
        }

        tracing::info!(task_id = %task_id, biz_type = %unit.biz_type, %url, "export succeeded");
        Ok(url)
    }

    fn run(
        &self,
        task_id: &TaskId,
        unit: &ExportUnit,
        params: &Value,
    ) -> Result<String, PipelineError> {
        self.milestone(task_id, PROGRESS_STARTED);

        let rows = self
            .dispatcher
            .invoke(&unit.target, &unit.operation, &unit.param_shape, params)?;
        if rows.is_empty() {
            return Err(PipelineError::EmptyResult {
                target: unit.target.clone(),
                operation: unit.operation.clone(),
            });
        }
        tracing::debug!(task_id = %task_id, rows = rows.len(), "rows fetched");
        self.milestone(task_id, PROGRESS_FETCHED);

        let bytes = self.renderer.render(&rows)?;
        self.milestone(task_id, PROGRESS_RENDERED);

        let file_name =
            artifact_file_name(&unit.biz_type, Utc::now(), self.renderer.file_extension());
        let url = self.blob.upload(&file_name, &bytes)?;
        Ok(url)
    }

    /// Progress writes are fire-and-forget.
    fn milestone(&self, task_id: &TaskId, progress: u8) {
        tracing::debug!(task_id = %task_id, progress, "milestone");
        if let Err(err) = self.store.update_progress(task_id, progress) {
            tracing::warn!(task_id = %task_id, progress, "progress write failed: {err}");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
