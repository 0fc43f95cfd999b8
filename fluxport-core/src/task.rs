//! The export task entity and its status transitions.
//!
//! ```text
//! PENDING ──record_progress──▶ PROCESSING ──succeed──▶ SUCCESS
//!    │                             │
//!    └─────────────fail────────────┴──────fail──────▶ FAILED
//! ```
//!
//! Terminal tasks reject every further write, so the first terminal
//! transition is the only one that sticks.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TransitionError;
use crate::types::{BizType, OwnerId, TaskId};

/// Highest progress value a non-terminal task may report.
pub const MAX_RUNNING_PROGRESS: u8 = 99;

/// Lifecycle state of an export task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    Pending,
    Processing,
    Success,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "PENDING"),
            TaskStatus::Processing => write!(f, "PROCESSING"),
            TaskStatus::Success => write!(f, "SUCCESS"),
            TaskStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// One asynchronous execution of an export unit for a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportTask {
    pub task_id: TaskId,
    pub biz_type: BizType,
    pub owner_id: OwnerId,
    /// Parameters captured at submission.
    pub params: Value,
    pub status: TaskStatus,
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl ExportTask {
    /// A freshly submitted task, stamped with the current time.
    pub fn pending(task_id: TaskId, biz_type: BizType, owner_id: OwnerId, params: Value) -> Self {
        Self {
            task_id,
            biz_type,
            owner_id,
            params,
            status: TaskStatus::Pending,
            progress: 0,
            artifact_url: None,
            artifact_name: None,
            error_message: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to PROCESSING and record a progress milestone.
    ///
    /// Values of 100 or more are held at [`MAX_RUNNING_PROGRESS`]; only
    /// [`succeed`](Self::succeed) completes a task.
    pub fn record_progress(&mut self, progress: u8) -> Result<(), TransitionError> {
        self.ensure_open()?;
        let progress = progress.min(MAX_RUNNING_PROGRESS);
        if progress < self.progress {
            return Err(TransitionError::ProgressRegressed {
                task_id: self.task_id.clone(),
                current: self.progress,
                requested: progress,
            });
        }
        self.status = TaskStatus::Processing;
        self.progress = progress;
        Ok(())
    }

    pub fn succeed(
        &mut self,
        artifact_url: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.ensure_open()?;
        let url = artifact_url.into();
        self.artifact_name = Some(artifact_name_from_url(&url));
        self.artifact_url = Some(url);
        self.status = TaskStatus::Success;
        self.progress = 100;
        self.error_message = None;
        self.finished_at = Some(at);
        Ok(())
    }

    /// Record a failure. Progress stays at its last milestone.
    pub fn fail(
        &mut self,
        message: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.ensure_open()?;
        self.status = TaskStatus::Failed;
        self.error_message = Some(message.into());
        self.finished_at = Some(at);
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError::AlreadyTerminal {
                task_id: self.task_id.clone(),
                status: self.status,
            });
        }
        Ok(())
    }
}

/// Last path segment of an artifact URL.
pub fn artifact_name_from_url(url: &str) -> String {
    url.rsplit('/').next().unwrap_or(url).to_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task() -> ExportTask {
        ExportTask::pending(
            TaskId::from("t1"),
            BizType::from("ORDER_EXPORT"),
            OwnerId::from("u1"),
            json!({"status": "paid"}),
        )
    }

    #[test]
    fn pending_task_starts_at_zero() {
        let t = task();
        assert_eq!(t.status, TaskStatus::Pending);
        assert_eq!(t.progress, 0);
        assert!(t.finished_at.is_none());
    }

    #[test]
    fn progress_moves_task_to_processing() {
        let mut t = task();
        t.record_progress(0).unwrap();
        assert_eq!(t.status, TaskStatus::Processing);
        t.record_progress(50).unwrap();
        assert_eq!(t.progress, 50);
    }

    #[test]
    fn progress_never_goes_backwards() {
        let mut t = task();
        t.record_progress(80).unwrap();
        let err = t.record_progress(50).unwrap_err();
        assert!(matches!(err, TransitionError::ProgressRegressed { current: 80, requested: 50, .. }));
        assert_eq!(t.progress, 80);
    }

    #[test]
    fn progress_of_100_is_held_below_completion() {
        let mut t = task();
        t.record_progress(100).unwrap();
        assert_eq!(t.progress, MAX_RUNNING_PROGRESS);
        assert_eq!(t.status, TaskStatus::Processing);
    }

    #[test]
    fn success_sets_url_name_and_full_progress() {
        let mut t = task();
        t.record_progress(80).unwrap();
        t.succeed("file:///tmp/exports/ORDER_EXPORT_20240101_000000.xml", Utc::now())
            .unwrap();
        assert_eq!(t.status, TaskStatus::Success);
        assert_eq!(t.progress, 100);
        assert_eq!(t.artifact_name.as_deref(), Some("ORDER_EXPORT_20240101_000000.xml"));
        assert!(t.finished_at.is_some());
    }

    #[test]
    fn failure_keeps_last_milestone() {
        let mut t = task();
        t.record_progress(50).unwrap();
        t.fail("upload refused", Utc::now()).unwrap();
        assert_eq!(t.status, TaskStatus::Failed);
        assert_eq!(t.progress, 50);
        assert_eq!(t.error_message.as_deref(), Some("upload refused"));
    }

    #[test]
    fn terminal_task_rejects_further_writes() {
        let mut t = task();
        t.fail("boom", Utc::now()).unwrap();
        let frozen = t.clone();

        assert!(matches!(t.record_progress(60), Err(TransitionError::AlreadyTerminal { .. })));
        assert!(t.succeed("file:///x", Utc::now()).is_err());
        assert!(t.fail("again", Utc::now()).is_err());
        assert_eq!(t, frozen);
    }

    #[test]
    fn status_serializes_upper_case() {
        assert_eq!(serde_json::to_string(&TaskStatus::Processing).unwrap(), "\"PROCESSING\"");
        assert_eq!(TaskStatus::Failed.to_string(), "FAILED");
    }
}
