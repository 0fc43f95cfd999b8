//! In-memory task store with per-task progress throttling.
//!
//! Non-terminal progress writes for a task are accepted at most once per
//! throttle window; anything in between is dropped. Terminal writes always
//! go through and clear the task's throttle entry.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;

use fluxport_core::{ExportTask, OwnerId, StoreError, TaskId, TaskStore, TransitionError};

/// Minimum spacing between two accepted progress writes for one task.
pub const DEFAULT_PROGRESS_THROTTLE: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct Slot {
    seq: u64,
    task: ExportTask,
}

#[derive(Debug, Default)]
struct Inner {
    tasks: HashMap<TaskId, Slot>,
    last_progress: HashMap<TaskId, Instant>,
    next_seq: u64,
}

/// Outcome of a write against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Write {
    Applied,
    Skipped,
}

/// Thread-safe [`TaskStore`] holding every task in memory.
#[derive(Debug)]
pub struct MemoryTaskStore {
    inner: Mutex<Inner>,
    throttle: Duration,
}

impl Default for MemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::with_throttle(DEFAULT_PROGRESS_THROTTLE)
    }

    /// `Duration::ZERO` disables throttling.
    pub fn with_throttle(throttle: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            throttle,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every task in insertion order.
    pub fn snapshot(&self) -> Vec<ExportTask> {
        let inner = self.inner.lock();
        let mut slots: Vec<&Slot> = inner.tasks.values().collect();
        slots.sort_by_key(|slot| slot.seq);
        slots.into_iter().map(|slot| slot.task.clone()).collect()
    }

    pub(crate) fn insert(&self, task: ExportTask) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.tasks.contains_key(&task.task_id) {
            return Err(StoreError::Duplicate(task.task_id));
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.tasks.insert(task.task_id.clone(), Slot { seq, task });
        Ok(())
    }

    pub(crate) fn apply_progress(&self, task_id: &TaskId, progress: u8) -> Result<Write, StoreError> {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        if let Some(last) = inner.last_progress.get(task_id) {
            if now.duration_since(*last) < self.throttle {
                tracing::debug!(task_id = %task_id, progress, "progress write throttled");
                return Ok(Write::Skipped);
            }
        }

        let slot = inner.tasks.get_mut(task_id).ok_or_else(|| {
            tracing::warn!(task_id = %task_id, "progress write for unknown task");
            StoreError::NotFound(task_id.clone())
        })?;
        if let Err(err) = slot.task.record_progress(progress) {
            tracing::warn!(task_id = %task_id, "progress write ignored: {err}");
            return Ok(Write::Skipped);
        }
        inner.last_progress.insert(task_id.clone(), now);
        Ok(Write::Applied)
    }

    pub(crate) fn apply_terminal<F>(&self, task_id: &TaskId, transition: F) -> Result<Write, StoreError>
    where
        F: FnOnce(&mut ExportTask) -> Result<(), TransitionError>,
    {
        let mut inner = self.inner.lock();
        let slot = inner.tasks.get_mut(task_id).ok_or_else(|| {
            tracing::warn!(task_id = %task_id, "terminal write for unknown task");
            StoreError::NotFound(task_id.clone())
        })?;
        if let Err(err) = transition(&mut slot.task) {
            tracing::warn!(task_id = %task_id, "terminal write ignored: {err}");
            return Ok(Write::Skipped);
        }
        inner.last_progress.remove(task_id);
        Ok(Write::Applied)
    }

    /// Drop a task that could not be made durable.
    pub(crate) fn remove(&self, task_id: &TaskId) -> Option<ExportTask> {
        let mut inner = self.inner.lock();
        inner.last_progress.remove(task_id);
        inner.tasks.remove(task_id).map(|slot| slot.task)
    }

    #[cfg(test)]
    pub(crate) fn has_throttle_entry(&self, task_id: &TaskId) -> bool {
        self.inner.lock().last_progress.contains_key(task_id)
    }
}

impl TaskStore for MemoryTaskStore {
    fn create_task(&self, task: ExportTask) -> Result<(), StoreError> {
        self.insert(task)
    }

    fn update_progress(&self, task_id: &TaskId, progress: u8) -> Result<(), StoreError> {
        self.apply_progress(task_id, progress).map(drop)
    }

    fn mark_success(&self, task_id: &TaskId, artifact_url: &str) -> Result<(), StoreError> {
        self.apply_terminal(task_id, |task| task.succeed(artifact_url, Utc::now()))
            .map(drop)
    }

    fn mark_failed(&self, task_id: &TaskId, message: &str) -> Result<(), StoreError> {
        self.apply_terminal(task_id, |task| task.fail(message, Utc::now()))
            .map(drop)
    }

    fn find_by_id(&self, task_id: &TaskId) -> Result<Option<ExportTask>, StoreError> {
        Ok(self
            .inner
            .lock()
            .tasks
            .get(task_id)
            .map(|slot| slot.task.clone()))
    }

    fn find_by_owner(
        &self,
        owner_id: &OwnerId,
        limit: usize,
    ) -> Result<Vec<ExportTask>, StoreError> {
        let inner = self.inner.lock();
        let mut owned: Vec<&Slot> = inner
            .tasks
            .values()
            .filter(|slot| &slot.task.owner_id == owner_id)
            .collect();
        owned.sort_by(|a, b| {
            b.task
                .created_at
                .cmp(&a.task.created_at)
                .then(b.seq.cmp(&a.seq))
        });
        Ok(owned
            .into_iter()
            .take(limit)
            .map(|slot| slot.task.clone())
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use fluxport_core::{BizType, TaskStatus};
    use serde_json::json;

    fn task(id: &str, owner: &str) -> ExportTask {
        ExportTask::pending(
            TaskId::from(id),
            BizType::from("WIDGET_EXPORT"),
            OwnerId::from(owner),
            json!({}),
        )
    }

    fn unthrottled() -> MemoryTaskStore {
        MemoryTaskStore::with_throttle(Duration::ZERO)
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let store = unthrottled();
        store.create_task(task("t1", "u1")).unwrap();
        let err = store.create_task(task("t1", "u2")).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn progress_moves_task_to_processing() {
        let store = unthrottled();
        let id = TaskId::from("t1");
        store.create_task(task("t1", "u1")).unwrap();
        store.update_progress(&id, 0).unwrap();
        let found = store.find_by_id(&id).unwrap().unwrap();
        assert_eq!(found.status, TaskStatus::Processing);
        assert_eq!(found.progress, 0);
    }

    #[test]
    fn rapid_progress_writes_are_coalesced() {
        let store = MemoryTaskStore::with_throttle(Duration::from_secs(60));
        let id = TaskId::from("t1");
        store.create_task(task("t1", "u1")).unwrap();

        assert_eq!(store.apply_progress(&id, 0).unwrap(), Write::Applied);
        assert_eq!(store.apply_progress(&id, 50).unwrap(), Write::Skipped);
        assert_eq!(store.apply_progress(&id, 80).unwrap(), Write::Skipped);
        assert_eq!(store.find_by_id(&id).unwrap().unwrap().progress, 0);

        store.mark_success(&id, "file:///x/a.csv").unwrap();
        let done = store.find_by_id(&id).unwrap().unwrap();
        assert_eq!(done.status, TaskStatus::Success);
        assert_eq!(done.progress, 100);
        assert!(!store.has_throttle_entry(&id));
    }

    #[test]
    fn progress_is_clamped_and_never_regresses() {
        let store = unthrottled();
        let id = TaskId::from("t1");
        store.create_task(task("t1", "u1")).unwrap();
        store.update_progress(&id, 200).unwrap();
        assert_eq!(store.find_by_id(&id).unwrap().unwrap().progress, 99);
        store.update_progress(&id, 10).unwrap();
        assert_eq!(store.find_by_id(&id).unwrap().unwrap().progress, 99);
    }

    #[test]
    fn first_terminal_write_wins() {
        let store = unthrottled();
        let id = TaskId::from("t1");
        store.create_task(task("t1", "u1")).unwrap();
        store.update_progress(&id, 50).unwrap();
        store.mark_failed(&id, "boom").unwrap();
        store.mark_success(&id, "file:///late.csv").unwrap();
        store.update_progress(&id, 80).unwrap();

        let found = store.find_by_id(&id).unwrap().unwrap();
        assert_eq!(found.status, TaskStatus::Failed);
        assert_eq!(found.progress, 50);
        assert_eq!(found.error_message.as_deref(), Some("boom"));
        assert!(found.artifact_url.is_none());
        assert!(found.finished_at.is_some());
    }

    #[test]
    fn success_records_artifact_name() {
        let store = unthrottled();
        let id = TaskId::from("t1");
        store.create_task(task("t1", "u1")).unwrap();
        store
            .mark_success(&id, "file:///exports/WIDGET_EXPORT_20240102_030405.csv")
            .unwrap();
        let found = store.find_by_id(&id).unwrap().unwrap();
        assert_eq!(
            found.artifact_name.as_deref(),
            Some("WIDGET_EXPORT_20240102_030405.csv")
        );
    }

    #[test]
    fn writes_to_unknown_tasks_fail() {
        let store = unthrottled();
        let id = TaskId::from("ghost");
        assert!(matches!(store.update_progress(&id, 1), Err(StoreError::NotFound(_))));
        assert!(matches!(store.mark_failed(&id, "x"), Err(StoreError::NotFound(_))));
        assert!(store.find_by_id(&id).unwrap().is_none());
    }

    #[test]
    fn find_by_owner_is_newest_first_and_limited() {
        let store = unthrottled();
        for i in 0..5 {
            store.create_task(task(&format!("t{i}"), "u1")).unwrap();
        }
        store.create_task(task("other", "u2")).unwrap();

        let found = store.find_by_owner(&OwnerId::from("u1"), 3).unwrap();
        let ids: Vec<&str> = found.iter().map(|t| t.task_id.0.as_str()).collect();
        assert_eq!(ids, vec!["t4", "t3", "t2"]);
        assert!(store.find_by_owner(&OwnerId::from("nobody"), 10).unwrap().is_empty());
    }
}
