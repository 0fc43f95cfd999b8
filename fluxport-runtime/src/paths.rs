use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "config.yaml";
pub const UNITS_FILE: &str = "units.yaml";

pub const DEFAULT_QUEUE_CAPACITY: usize = 256;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub fn fluxport_root(home: &Path) -> PathBuf {
    home.join(".fluxport")
}

pub fn config_path(home: &Path) -> PathBuf {
    fluxport_root(home).join(CONFIG_FILE)
}

pub fn exports_dir(home: &Path) -> PathBuf {
    fluxport_root(home).join("exports")
}

pub fn ledger_path(home: &Path) -> PathBuf {
    fluxport_pipeline::ledger::ledger_path_at(home)
}

pub fn templates_dir(home: &Path) -> PathBuf {
    fluxport_root(home).join("templates")
}

/// Unit manifest picked up when no `--manifest` is given.
pub fn units_path(home: &Path) -> PathBuf {
    fluxport_root(home).join(UNITS_FILE)
}
