//! `fluxport status`: one task from the ledger.

use anyhow::{Context, Result};
use clap::Args;

use fluxport_core::{TaskId, TaskStore};
use fluxport_pipeline::FileTaskStore;
use fluxport_runtime::{RuntimeConfig, TaskView};

/// Arguments for `fluxport status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Id printed by `fluxport export`.
    pub task_id: String,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home_dir()?;
        let config = RuntimeConfig::load_at(&home).context("failed to load runtime config")?;
        let store = FileTaskStore::open(&config.task_ledger).with_context(|| {
            format!("failed to open task ledger {}", config.task_ledger.display())
        })?;

        let task_id = TaskId::from(self.task_id.as_str());
        let task = store
            .find_by_id(&task_id)
            .context("failed to read task ledger")?
            .with_context(|| format!("no task with id '{task_id}'"))?;
        super::print_view(&TaskView::from(&task), self.json)
    }
}
