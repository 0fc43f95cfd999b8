//! The orchestrator: submission, bounded job queue and worker pool.
//!
//! ```text
//! submit ──▶ registry lookup ──▶ reserve queue slot ──▶ create PENDING task
//!                                                        │
//!                          mpsc::channel<Job> ◀──────────┘
//!                                │
//!              worker 1..N (tokio tasks, shared receiver)
//!                                │
//!                   spawn_blocking(Pipeline::execute)
//! ```
//!
//! A queue slot is reserved before the task is created, so a submission that
//! fails leaves no task behind and a created task always has a job queued.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use fluxport_core::{
    BizType, ConfigRegistry, Dispatcher, ExportTask, ExportUnit, OwnerId, StoreError, TaskId,
    TaskStore,
};
use fluxport_pipeline::{FileTaskStore, LocalBlobStore, Pipeline};
use fluxport_renderer::TableRenderer;

use crate::config::RuntimeConfig;
use crate::error::{RuntimeError, SubmitError};

struct Job {
    task_id: TaskId,
    unit: ExportUnit,
    params: Value,
}

/// Worker pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolOptions {
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            workers: crate::config::default_workers(),
            queue_capacity: crate::paths::DEFAULT_QUEUE_CAPACITY,
        }
    }
}

pub struct Orchestrator {
    registry: Arc<ConfigRegistry>,
    store: Arc<dyn TaskStore>,
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
}

impl Orchestrator {
    /// Spawn the worker pool. Must be called from within a tokio runtime.
    pub fn start(registry: Arc<ConfigRegistry>, pipeline: Pipeline, options: PoolOptions) -> Self {
        let worker_count = options.workers.max(1);
        let (sender, receiver) = mpsc::channel::<Job>(options.queue_capacity.max(1));
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let store = Arc::clone(pipeline.store());

        let workers = (0..worker_count)
            .map(|worker| {
                let receiver = Arc::clone(&receiver);
                let pipeline = pipeline.clone();
                tokio::spawn(worker_loop(worker, receiver, pipeline))
            })
            .collect();

        tracing::info!(workers = worker_count, queue_capacity = options.queue_capacity, "orchestrator started");
        Self {
            registry,
            store,
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            worker_count,
        }
    }

    /// Assemble the standard collaborators from `config`: a file-backed task
    /// ledger, a local blob store and the configured table renderer.
    pub fn from_config(
        config: &RuntimeConfig,
        registry: Arc<ConfigRegistry>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Result<Self, RuntimeError> {
        let store = FileTaskStore::open_with_throttle(&config.task_ledger, config.progress_throttle)?;
        let renderer = TableRenderer::with_template_dir(config.format, Some(config.template_dir.as_path()))?;
        let blob = LocalBlobStore::with_url_prefix(&config.storage_dir, config.url_prefix.clone());
        let pipeline = Pipeline::new(dispatcher, Arc::new(renderer), Arc::new(blob), Arc::new(store));
        Ok(Self::start(
            registry,
            pipeline,
            PoolOptions {
                workers: config.workers,
                queue_capacity: config.queue_capacity,
            },
        ))
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// The unit registered for `biz_type`, for the host's authorization gate.
    pub fn get_config(&self, biz_type: &BizType) -> Option<ExportUnit> {
        self.registry.get(biz_type)
    }

    /// Submit an export and return its task id without waiting for it.
    pub async fn submit(
        &self,
        biz_type: &BizType,
        owner_id: &OwnerId,
        params: Value,
    ) -> Result<TaskId, SubmitError> {
        let unit = self
            .registry
            .get(biz_type)
            .ok_or_else(|| SubmitError::ConfigNotFound(biz_type.clone()))?;
        let sender = self
            .sender
            .lock()
            .clone()
            .ok_or(SubmitError::ShuttingDown)?;
        let permit = sender
            .reserve()
            .await
            .map_err(|_| SubmitError::ShuttingDown)?;

        // No await between creating the task and queueing its job, so a
        // dropped submit future never strands a PENDING task.
        let task_id = TaskId::generate();
        let task = ExportTask::pending(task_id.clone(), biz_type.clone(), owner_id.clone(), params.clone());
        self.store.create_task(task)?;

        permit.send(Job {
            task_id: task_id.clone(),
            unit,
            params,
        });
        tracing::info!(task_id = %task_id, biz_type = %biz_type, owner = %owner_id, "export submitted");
        Ok(task_id)
    }

    pub fn find_by_id(&self, task_id: &TaskId) -> Result<Option<ExportTask>, StoreError> {
        self.store.find_by_id(task_id)
    }

    pub fn find_by_owner(
        &self,
        owner_id: &OwnerId,
        limit: usize,
    ) -> Result<Vec<ExportTask>, StoreError> {
        self.store.find_by_owner(owner_id, limit)
    }

    /// Poll the store every `poll` until the task is terminal.
    pub async fn wait_for_terminal(
        &self,
        task_id: &TaskId,
        poll: Duration,
        timeout: Duration,
    ) -> Result<ExportTask, RuntimeError> {
        let started = Instant::now();
        loop {
            let task = self
                .find_by_id(task_id)?
                .ok_or_else(|| RuntimeError::UnknownTask(task_id.clone()))?;
            if task.is_terminal() {
                return Ok(task);
            }
            if started.elapsed() >= timeout {
                return Err(RuntimeError::Timeout {
                    task_id: task_id.clone(),
                    waited: started.elapsed(),
                });
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// Stop accepting submissions and wait for queued tasks to finish.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        drop(self.sender.lock().take());
        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            handle.await.map_err(|err| RuntimeError::Join {
                task: "worker",
                message: err.to_string(),
            })?;
        }
        tracing::info!("orchestrator stopped");
        Ok(())
    }
}

async fn worker_loop(
    worker: usize,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
    pipeline: Pipeline,
) {
    loop {
        let job = receiver.lock().await.recv().await;
        let Some(job) = job else { break };

        let task_id = job.task_id.clone();
        let run = pipeline.clone();
        let outcome =
            tokio::task::spawn_blocking(move || run.execute(&job.task_id, &job.unit, &job.params))
                .await;
        // A panic skipped the pipeline's own failure handling.
        if let Err(err) = outcome {
            let message = format!("pipeline panicked: {err}");
            tracing::error!(worker, task_id = %task_id, "{message}");
            if let Err(store_err) = pipeline.store().mark_failed(&task_id, &message) {
                tracing::error!(worker, task_id = %task_id, "could not record failure: {store_err}");
            }
        }
    }
    tracing::debug!(worker, "worker exiting");
}
