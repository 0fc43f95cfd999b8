//! Runtime configuration: `~/.fluxport/config.yaml`.
//!
//! Every field is optional; a missing file yields the defaults. Relative
//! paths are resolved against `~/.fluxport`.
//!
//! ```yaml
//! workers: 4
//! queue_capacity: 256
//! progress_throttle_ms: 1000
//! storage_dir: exports
//! url_prefix: https://downloads.example.com/exports/
//! task_ledger: tasks.json
//! format: csv
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use fluxport_pipeline::blob::default_url_prefix;
use fluxport_renderer::TableFormat;

use crate::error::{io_err, RuntimeError};
use crate::paths;

/// On-disk shape of the config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_capacity: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_throttle_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_ledger: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<TableFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_dir: Option<PathBuf>,
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Size of the worker pool. Always at least 1.
    pub workers: usize,
    /// Capacity of the submission queue. Always at least 1.
    pub queue_capacity: usize,
    pub progress_throttle: Duration,
    pub storage_dir: PathBuf,
    /// Prefix of artifact URLs; ends with `/`.
    pub url_prefix: String,
    pub task_ledger: PathBuf,
    pub format: TableFormat,
    /// Directory of `*.tera` overrides for the embedded table templates.
    pub template_dir: PathBuf,
}

/// Host parallelism, falling back to 1 when it cannot be determined.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl RuntimeConfig {
    /// Defaults rooted at `home`.
    pub fn defaults_at(home: &Path) -> Self {
        Self::resolve(ConfigFile::default(), home)
    }

    /// Load `<home>/.fluxport/config.yaml`, or the defaults if it is absent.
    pub fn load_at(home: &Path) -> Result<Self, RuntimeError> {
        let path = paths::config_path(home);
        let file = load_config_file(&path)?;
        Ok(Self::resolve(file, home))
    }

    pub fn resolve(file: ConfigFile, home: &Path) -> Self {
        let root = paths::fluxport_root(home);
        let rooted = |p: PathBuf| if p.is_absolute() { p } else { root.join(p) };

        let storage_dir = file
            .storage_dir
            .map(rooted)
            .unwrap_or_else(|| paths::exports_dir(home));
        let url_prefix = match file.url_prefix {
            Some(prefix) if prefix.ends_with('/') => prefix,
            Some(prefix) => format!("{prefix}/"),
            None => default_url_prefix(&storage_dir),
        };

        Self {
            workers: file.workers.unwrap_or_else(default_workers).max(1),
            queue_capacity: file
                .queue_capacity
                .unwrap_or(paths::DEFAULT_QUEUE_CAPACITY)
                .max(1),
            progress_throttle: Duration::from_millis(file.progress_throttle_ms.unwrap_or(1000)),
            storage_dir,
            url_prefix,
            task_ledger: file
                .task_ledger
                .map(rooted)
                .unwrap_or_else(|| paths::ledger_path(home)),
            format: file.format.unwrap_or_default(),
            template_dir: file
                .template_dir
                .map(rooted)
                .unwrap_or_else(|| paths::templates_dir(home)),
        }
    }
}

fn load_config_file(path: &Path) -> Result<ConfigFile, RuntimeError> {
    if !path.exists() {
        return Ok(ConfigFile::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    if contents.trim().is_empty() {
        return Ok(ConfigFile::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| RuntimeError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
