//! File-backed task store.
//!
//! Wraps [`MemoryTaskStore`] and persists a JSON snapshot of every task after
//! each accepted write, at `<home>/.fluxport/tasks.json` by default. Writes
//! use the `.tmp` + rename pattern so a crash never leaves a torn ledger.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use fluxport_core::{ExportTask, OwnerId, StoreError, TaskId, TaskStore};

use crate::error::store_io_err;
use crate::store::{MemoryTaskStore, Write, DEFAULT_PROGRESS_THROTTLE};

/// On-disk ledger payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerFile {
    #[serde(default)]
    pub tasks: Vec<ExportTask>,
}

/// Default ledger path rooted at `home`.
///
/// `~/.fluxport/tasks.json`
pub fn ledger_path_at(home: &Path) -> PathBuf {
    home.join(".fluxport").join("tasks.json")
}

/// Load a ledger. Returns an empty ledger if the file does not yet exist.
pub fn load_ledger(path: &Path) -> Result<LedgerFile, StoreError> {
    if !path.exists() {
        return Ok(LedgerFile::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|e| store_io_err(path, e))?;
    serde_json::from_str(&contents).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Save a ledger atomically: write `<path>.tmp`, then rename over `<path>`.
pub fn save_ledger(path: &Path, ledger: &LedgerFile) -> Result<(), StoreError> {
    let Some(dir) = path.parent() else {
        return Err(store_io_err(
            path,
            std::io::Error::other("invalid task ledger path"),
        ));
    };
    std::fs::create_dir_all(dir).map_err(|e| store_io_err(dir, e))?;

    let json = serde_json::to_string_pretty(ledger).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|e| store_io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(store_io_err(path, e));
    }
    Ok(())
}

/// Tasks known to this process replace their on-disk copies; every other
/// on-disk task is kept in place. Ours that are new to the file go last.
pub fn merge_ledger(on_disk: LedgerFile, ours: Vec<ExportTask>) -> LedgerFile {
    let mut fresh: HashMap<TaskId, ExportTask> = ours
        .iter()
        .map(|task| (task.task_id.clone(), task.clone()))
        .collect();
    let mut tasks: Vec<ExportTask> = on_disk
        .tasks
        .into_iter()
        .map(|task| fresh.remove(&task.task_id).unwrap_or(task))
        .collect();
    tasks.extend(ours.into_iter().filter(|task| fresh.contains_key(&task.task_id)));
    LedgerFile { tasks }
}

/// [`TaskStore`] that survives process restarts.
///
/// One process at a time owns a task: each save re-reads the file and merges
/// by task id, but there is no file lock, so two processes saving at the
/// same instant can still lose the other's newest write. Tasks are never
/// pruned.
#[derive(Debug)]
pub struct FileTaskStore {
    path: PathBuf,
    memory: MemoryTaskStore,
    // Serialises snapshot + write so the newest state always lands last.
    persist: Mutex<()>,
}

impl FileTaskStore {
    /// Open the ledger at `path`, loading any tasks recorded by earlier runs.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::open_with_throttle(path, DEFAULT_PROGRESS_THROTTLE)
    }

    pub fn open_with_throttle(
        path: impl Into<PathBuf>,
        throttle: Duration,
    ) -> Result<Self, StoreError> {
        let path = path.into();
        let ledger = load_ledger(&path)?;
        let memory = MemoryTaskStore::with_throttle(throttle);
        let count = ledger.tasks.len();
        for task in ledger.tasks {
            memory.insert(task)?;
        }
        tracing::debug!(path = %path.display(), tasks = count, "task ledger loaded");
        Ok(Self {
            path,
            memory,
            persist: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Merge this process's tasks into the ledger currently on disk, so
    /// tasks recorded by another process since we opened it are kept.
    fn persist(&self) -> Result<(), StoreError> {
        let _guard = self.persist.lock();
        let on_disk = match load_ledger(&self.path) {
            Ok(ledger) => ledger,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), "rewriting unreadable task ledger: {err}");
                LedgerFile::default()
            }
        };
        let ledger = merge_ledger(on_disk, self.memory.snapshot());
        save_ledger(&self.path, &ledger)
    }

    fn persist_if(&self, write: Write) -> Result<(), StoreError> {
        match write {
            Write::Applied => self.persist(),
            Write::Skipped => Ok(()),
        }
    }
}

impl TaskStore for FileTaskStore {
    fn create_task(&self, task: ExportTask) -> Result<(), StoreError> {
        let task_id = task.task_id.clone();
        self.memory.insert(task)?;
        if let Err(err) = self.persist() {
            self.memory.remove(&task_id);
            return Err(err);
        }
        Ok(())
    }

    fn update_progress(&self, task_id: &TaskId, progress: u8) -> Result<(), StoreError> {
        let write = self.memory.apply_progress(task_id, progress)?;
        self.persist_if(write)
    }

    fn mark_success(&self, task_id: &TaskId, artifact_url: &str) -> Result<(), StoreError> {
        let write = self
            .memory
            .apply_terminal(task_id, |task| task.succeed(artifact_url, Utc::now()))?;
        self.persist_if(write)
    }

    fn mark_failed(&self, task_id: &TaskId, message: &str) -> Result<(), StoreError> {
        let write = self
            .memory
            .apply_terminal(task_id, |task| task.fail(message, Utc::now()))?;
        self.persist_if(write)
    }

    fn find_by_id(&self, task_id: &TaskId) -> Result<Option<ExportTask>, StoreError> {
        self.memory.find_by_id(task_id)
    }

    fn find_by_owner(
        &self,
        owner_id: &OwnerId,
        limit: usize,
    ) -> Result<Vec<ExportTask>, StoreError> {
        self.memory.find_by_owner(owner_id, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxport_core::{BizType, TaskStatus};
    use serde_json::json;
    use tempfile::TempDir;

    fn task(id: &str) -> ExportTask {
        ExportTask::pending(
            TaskId::from(id),
            BizType::from("ORDER_EXPORT"),
            OwnerId::from("u1"),
            json!({"status": "paid"}),
        )
    }

    #[test]
    fn empty_ledger_when_file_missing() {
        let tmp = TempDir::new().unwrap();
        let ledger = load_ledger(&ledger_path_at(tmp.path())).unwrap();
        assert!(ledger.tasks.is_empty());
    }

    #[test]
    fn tasks_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = ledger_path_at(tmp.path());
        {
            let store = FileTaskStore::open_with_throttle(&path, Duration::ZERO).unwrap();
            store.create_task(task("t1")).unwrap();
            store.create_task(task("t2")).unwrap();
            store.update_progress(&TaskId::from("t1"), 50).unwrap();
            store.mark_success(&TaskId::from("t1"), "file:///e/a.xml").unwrap();
            store.mark_failed(&TaskId::from("t2"), "no rows").unwrap();
        }

        let reopened = FileTaskStore::open(&path).unwrap();
        let t1 = reopened.find_by_id(&TaskId::from("t1")).unwrap().unwrap();
        assert_eq!(t1.status, TaskStatus::Success);
        assert_eq!(t1.artifact_name.as_deref(), Some("a.xml"));
        assert_eq!(t1.params, json!({"status": "paid"}));
        let t2 = reopened.find_by_id(&TaskId::from("t2")).unwrap().unwrap();
        assert_eq!(t2.error_message.as_deref(), Some("no rows"));

        let newest = reopened.find_by_owner(&OwnerId::from("u1"), 1).unwrap();
        assert_eq!(newest[0].task_id, TaskId::from("t2"));
    }

    #[test]
    fn tmp_file_cleaned_up_after_save() {
        let tmp = TempDir::new().unwrap();
        let path = ledger_path_at(tmp.path());
        let store = FileTaskStore::open(&path).unwrap();
        store.create_task(task("t1")).unwrap();
        assert!(path.exists());
        assert!(
            !path.with_extension("json.tmp").exists(),
            "tmp file should be removed after atomic rename"
        );
    }

    #[test]
    fn corrupt_ledger_reports_path() {
        let tmp = TempDir::new().unwrap();
        let path = ledger_path_at(tmp.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();

        let err = FileTaskStore::open(&path).unwrap_err();
        assert!(matches!(err, StoreError::Json { .. }), "got: {err}");
        assert!(err.to_string().contains("tasks.json"));
    }

    #[test]
    fn failed_save_leaves_no_task_behind() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let store = FileTaskStore::open(blocker.join("tasks.json")).unwrap();
        let err = store.create_task(task("t1")).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }), "got: {err}");
        assert!(store.find_by_id(&TaskId::from("t1")).unwrap().is_none());
        assert!(store.find_by_owner(&OwnerId::from("u1"), 10).unwrap().is_empty());
    }

    #[test]
    fn concurrent_stores_keep_each_others_tasks() {
        let tmp = TempDir::new().unwrap();
        let path = ledger_path_at(tmp.path());
        let first = FileTaskStore::open_with_throttle(&path, Duration::ZERO).unwrap();
        let second = FileTaskStore::open_with_throttle(&path, Duration::ZERO).unwrap();

        first.create_task(task("a")).unwrap();
        second.create_task(task("b")).unwrap();
        first.mark_failed(&TaskId::from("a"), "no rows").unwrap();

        let ids: Vec<String> = load_ledger(&path)
            .unwrap()
            .tasks
            .into_iter()
            .map(|t| t.task_id.0)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
        let reopened = FileTaskStore::open(&path).unwrap();
        let a = reopened.find_by_id(&TaskId::from("a")).unwrap().unwrap();
        assert_eq!(a.status, TaskStatus::Failed);
    }

    #[test]
    fn duplicate_ids_in_ledger_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = ledger_path_at(tmp.path());
        save_ledger(
            &path,
            &LedgerFile {
                tasks: vec![task("t1"), task("t1")],
            },
        )
        .unwrap();
        assert!(matches!(
            FileTaskStore::open(&path),
            Err(StoreError::Duplicate(_))
        ));
    }
}
