//! Caller-facing projection of an [`ExportTask`].

use chrono::{DateTime, Utc};
use serde::Serialize;

use fluxport_core::{BizType, ExportTask, OwnerId, TaskId, TaskStatus};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskView {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub progress: u8,
    /// Human-readable summary of the status.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub biz_type: Option<BizType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<OwnerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskView {
    /// Acknowledgement returned right after a submission.
    pub fn submitted(task_id: TaskId) -> Self {
        Self {
            task_id,
            status: TaskStatus::Pending,
            progress: 0,
            message: status_message(TaskStatus::Pending, 0, None),
            biz_type: None,
            owner_id: None,
            artifact_url: None,
            artifact_name: None,
            error_message: None,
            created_at: None,
            finished_at: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == TaskStatus::Failed
    }
}

impl From<&ExportTask> for TaskView {
    fn from(task: &ExportTask) -> Self {
        Self {
            task_id: task.task_id.clone(),
            status: task.status,
            progress: task.progress,
            message: status_message(task.status, task.progress, task.error_message.as_deref()),
            biz_type: Some(task.biz_type.clone()),
            owner_id: Some(task.owner_id.clone()),
            artifact_url: task.artifact_url.clone(),
            artifact_name: task.artifact_name.clone(),
            error_message: task.error_message.clone(),
            created_at: Some(task.created_at),
            finished_at: task.finished_at,
        }
    }
}

pub fn status_message(status: TaskStatus, progress: u8, error: Option<&str>) -> String {
    match status {
        TaskStatus::Pending => "queued".to_string(),
        TaskStatus::Processing => format!("processing, progress: {progress}%"),
        TaskStatus::Success => "export succeeded".to_string(),
        TaskStatus::Failed => format!("export failed: {}", error.unwrap_or("unknown error")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;
    use serde_json::json;

    fn task() -> ExportTask {
        ExportTask::pending(
            TaskId::from("t1"),
            BizType::from("ORDER_EXPORT"),
            OwnerId::from("admin"),
            json!({}),
        )
    }

    #[rstest]
    #[case::pending(TaskStatus::Pending, 0, None, "queued")]
    #[case::processing(TaskStatus::Processing, 50, None, "processing, progress: 50%")]
    #[case::success(TaskStatus::Success, 100, None, "export succeeded")]
    #[case::failed(TaskStatus::Failed, 0, Some("boom"), "export failed: boom")]
    fn messages_follow_status(
        #[case] status: TaskStatus,
        #[case] progress: u8,
        #[case] error: Option<&str>,
        #[case] expected: &str,
    ) {
        assert_eq!(status_message(status, progress, error), expected);
    }

    #[test]
    fn submitted_view_is_queued() {
        let view = TaskView::submitted(TaskId::from("abc"));
        assert_eq!(view.status, TaskStatus::Pending);
        assert_eq!(view.message, "queued");
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["status"], "PENDING");
        assert!(json.get("artifact_url").is_none());
    }

    #[test]
    fn succeeded_task_projects_artifact() {
        let mut task = task();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        task.succeed("file:///tmp/x/ORDER_EXPORT_1.csv", at).unwrap();
        let view = TaskView::from(&task);
        assert_eq!(view.progress, 100);
        assert_eq!(view.message, "export succeeded");
        assert_eq!(view.artifact_name.as_deref(), Some("ORDER_EXPORT_1.csv"));
        assert_eq!(view.finished_at, Some(at));
        assert!(!view.is_failed());
    }
}
