//! `fluxport units`: registered export units.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use fluxport_core::registry::{save_manifest_at, UnitManifest};

use crate::demo;

/// Arguments for `fluxport units`.
#[derive(Args, Debug)]
pub struct UnitsArgs {
    /// Unit manifest (YAML) to load on top of the built-in units.
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Write the registered units to this manifest file.
    #[arg(long, value_name = "PATH")]
    pub export_manifest: Option<PathBuf>,
}

#[derive(Tabled)]
struct UnitRow {
    #[tabled(rename = "biz type")]
    biz_type: String,
    #[tabled(rename = "handler")]
    handler: String,
    #[tabled(rename = "params")]
    params: String,
    #[tabled(rename = "authorizer")]
    authorizer: String,
    #[tabled(rename = "bound")]
    bound: String,
}

impl UnitsArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home_dir()?;
        let registry = super::load_registry(&home, self.manifest.as_deref())?;
        let handlers = demo::handlers();
        let units = registry.list_all();

        if let Some(path) = self.export_manifest.as_ref() {
            let manifest = UnitManifest {
                units: units.values().cloned().collect(),
            };
            save_manifest_at(path, &manifest)
                .with_context(|| format!("failed to write manifest {}", path.display()))?;
            println!("{} {} units to {}", "Wrote".green().bold(), manifest.units.len(), path.display());
            return Ok(());
        }

        let rows: Vec<UnitRow> = units
            .values()
            .map(|unit| UnitRow {
                biz_type: unit.biz_type.to_string(),
                handler: format!("{}.{}", unit.target, unit.operation),
                params: unit.param_shape.to_string(),
                authorizer: unit.custom_authorizer().unwrap_or("default").to_string(),
                bound: if handlers.contains(&unit.target, &unit.operation) {
                    "yes".to_string()
                } else {
                    "no handler".to_string()
                },
            })
            .collect();

        println!("fluxport v{} | {} units", env!("CARGO_PKG_VERSION"), rows.len());
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}
