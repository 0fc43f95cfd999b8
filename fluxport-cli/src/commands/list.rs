//! `fluxport list`: an owner's recent exports, newest first.

use anyhow::{Context, Result};
use chrono::Local;
use clap::Args;
use tabled::{settings::Style, Table, Tabled};

use fluxport_core::TaskStore;
use fluxport_pipeline::FileTaskStore;
use fluxport_runtime::{RuntimeConfig, TaskView};

/// Arguments for `fluxport list`.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Owner whose tasks to list (defaults to $USER).
    #[arg(long)]
    pub owner: Option<String>,

    /// Maximum number of tasks to show.
    #[arg(long, default_value_t = 20)]
    pub limit: usize,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "task")]
    task_id: String,
    #[tabled(rename = "biz type")]
    biz_type: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "progress")]
    progress: String,
    #[tabled(rename = "created")]
    created: String,
    #[tabled(rename = "detail")]
    detail: String,
}

impl ListArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home_dir()?;
        let config = RuntimeConfig::load_at(&home).context("failed to load runtime config")?;
        let store = FileTaskStore::open(&config.task_ledger).with_context(|| {
            format!("failed to open task ledger {}", config.task_ledger.display())
        })?;

        let owner = super::owner_id(self.owner);
        let tasks = store
            .find_by_owner(&owner, self.limit)
            .context("failed to read task ledger")?;
        let views: Vec<TaskView> = tasks.iter().map(TaskView::from).collect();

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&views).context("failed to serialize task JSON")?
            );
            return Ok(());
        }

        println!("fluxport v{} | owner {} | {} tasks", env!("CARGO_PKG_VERSION"), owner, views.len());
        if views.is_empty() {
            println!("No exports recorded.");
            return Ok(());
        }

        let rows: Vec<TaskRow> = tasks
            .iter()
            .zip(&views)
            .map(|(task, view)| TaskRow {
                task_id: view.task_id.to_string(),
                biz_type: task.biz_type.to_string(),
                status: view.status.to_string(),
                progress: format!("{}%", view.progress),
                created: task
                    .created_at
                    .with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string(),
                detail: view.artifact_name.clone().unwrap_or_else(|| view.message.clone()),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}
