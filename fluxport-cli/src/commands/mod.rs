//! Subcommands and the helpers they share.

pub mod export;
pub mod list;
pub mod status;
pub mod units;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;

use fluxport_core::registry::load_manifest_at;
use fluxport_core::{ConfigRegistry, IdentityProvider, OwnerId, StaticIdentity, TaskStatus};
use fluxport_runtime::{paths, TaskView};

use crate::demo;

pub(crate) fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

/// Demo units, overlaid by `manifest` or, when none is given, by
/// `~/.fluxport/units.yaml` if it exists.
pub(crate) fn load_registry(home: &Path, manifest: Option<&Path>) -> Result<ConfigRegistry> {
    let registry = ConfigRegistry::new();
    for unit in demo::units() {
        registry.register(unit);
    }

    let path = match manifest {
        Some(path) => Some(path.to_path_buf()),
        None => Some(paths::units_path(home)).filter(|p| p.exists()),
    };
    if let Some(path) = path {
        let manifest = load_manifest_at(&path)
            .with_context(|| format!("failed to load unit manifest {}", path.display()))?;
        tracing::debug!(path = %path.display(), units = manifest.units.len(), "unit manifest loaded");
        registry.register_manifest(manifest);
    }
    Ok(registry)
}

/// `--owner`, else `$USER`, else `anonymous`.
pub(crate) fn identity(owner: Option<String>) -> StaticIdentity {
    let owner = owner
        .or_else(|| std::env::var("USER").ok())
        .or_else(|| std::env::var("USERNAME").ok())
        .filter(|o| !o.trim().is_empty())
        .unwrap_or_else(|| "anonymous".to_string());
    StaticIdentity(OwnerId::from(owner))
}

pub(crate) fn owner_id(owner: Option<String>) -> OwnerId {
    identity(owner).current_owner_id()
}

pub(crate) fn colored_status(status: TaskStatus) -> String {
    let label = status.to_string();
    match status {
        TaskStatus::Pending => label.bright_black().bold().to_string(),
        TaskStatus::Processing => label.yellow().bold().to_string(),
        TaskStatus::Success => label.green().bold().to_string(),
        TaskStatus::Failed => label.red().bold().to_string(),
    }
}

pub(crate) fn print_view(view: &TaskView, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(view).context("failed to serialize task JSON")?
        );
        return Ok(());
    }

    println!("{:<10} {}", "task".bold(), view.task_id);
    if let Some(biz_type) = &view.biz_type {
        println!("{:<10} {biz_type}", "biz type".bold());
    }
    if let Some(owner) = &view.owner_id {
        println!("{:<10} {owner}", "owner".bold());
    }
    println!(
        "{:<10} {} ({})",
        "status".bold(),
        colored_status(view.status),
        view.message
    );
    println!("{:<10} {}%", "progress".bold(), view.progress);
    if let Some(url) = &view.artifact_url {
        println!("{:<10} {url}", "artifact".bold());
    }
    if let Some(finished) = view.finished_at {
        println!("{:<10} {}", "finished".bold(), finished.to_rfc3339());
    }
    Ok(())
}
