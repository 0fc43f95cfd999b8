//! `fluxport export`: run one export end to end.
//!
//! Gate → parameter check → submit → wait for the terminal state → print the
//! task view. The process exits non-zero when the gate denies, the parameters
//! do not fit the unit, the unit is unknown or the task fails.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::Value;

use fluxport_core::{BizType, ConfigRegistry, ExportTask, OwnerId};
use fluxport_pipeline::HandlerTable;
use fluxport_renderer::TableFormat;
use fluxport_runtime::{
    paths::DEFAULT_POLL_INTERVAL, AccessGate, Orchestrator, RuntimeConfig, TaskView,
};

use crate::demo;

/// Arguments for `fluxport export`.
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Business type of the unit to export, e.g. ORDER_EXPORT.
    pub biz_type: String,

    /// Export on behalf of this owner (defaults to $USER).
    #[arg(long)]
    pub owner: Option<String>,

    /// Query parameters as a JSON object.
    #[arg(long, default_value = "{}")]
    pub params: String,

    /// Unit manifest (YAML) to load on top of the built-in units.
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Artifact format: csv or spreadsheet. Overrides config.yaml.
    #[arg(long)]
    pub format: Option<TableFormat>,

    /// Give up waiting after this many seconds.
    #[arg(long, default_value_t = 300)]
    pub timeout: u64,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl ExportArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home_dir()?;
        let params: Value =
            serde_json::from_str(&self.params).context("--params must be a JSON document")?;
        let mut config = RuntimeConfig::load_at(&home).context("failed to load runtime config")?;
        if let Some(format) = self.format {
            config.format = format;
        }

        let registry = Arc::new(super::load_registry(&home, self.manifest.as_deref())?);
        let biz_type = BizType::from(self.biz_type.as_str());
        let owner = super::owner_id(self.owner);

        // Unknown types fall through to submit, which reports them as such.
        let handlers = Arc::new(demo::handlers());
        let gate = AccessGate::with_named(demo::authorizers());
        if let Some(unit) = registry.get(&biz_type) {
            if !gate.check(&owner, &unit) {
                bail!("'{owner}' is not permitted to export {biz_type}");
            }
            handlers
                .validate(&unit.target, &unit.operation, &unit.param_shape, &params)
                .with_context(|| format!("invalid parameters for {biz_type}"))?;
        }

        let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
        let task = runtime.block_on(run_export(
            &config,
            registry,
            handlers,
            Submission {
                biz_type: &biz_type,
                owner: &owner,
                params,
            },
            Duration::from_secs(self.timeout),
            self.json,
        ))?;

        let view = TaskView::from(&task);
        super::print_view(&view, self.json)?;
        if view.is_failed() {
            bail!("export {} failed", view.task_id);
        }
        Ok(())
    }
}

struct Submission<'a> {
    biz_type: &'a BizType,
    owner: &'a OwnerId,
    params: Value,
}

async fn run_export(
    config: &RuntimeConfig,
    registry: Arc<ConfigRegistry>,
    handlers: Arc<HandlerTable>,
    submission: Submission<'_>,
    timeout: Duration,
    quiet: bool,
) -> Result<ExportTask> {
    let Submission {
        biz_type,
        owner,
        params,
    } = submission;
    let orchestrator = Orchestrator::from_config(config, registry, handlers)
        .context("failed to start orchestrator")?;

    let submitted = orchestrator.submit(biz_type, owner, params).await;
    let outcome = match submitted {
        Ok(task_id) => {
            if !quiet {
                let ack = TaskView::submitted(task_id.clone());
                println!("{} {} ({})", "submitted".bold(), ack.task_id, ack.message);
            }
            orchestrator
                .wait_for_terminal(&task_id, DEFAULT_POLL_INTERVAL, timeout)
                .await
                .with_context(|| format!("export {task_id} did not finish"))
        }
        Err(err) => Err(err).with_context(|| format!("failed to submit {biz_type}")),
    };

    orchestrator.shutdown().await.context("failed to stop orchestrator")?;
    outcome
}
