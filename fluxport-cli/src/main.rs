//! fluxport: asynchronous table exports from the command line.
//!
//! # Usage
//!
//! ```text
//! fluxport units [--manifest <path>] [--export-manifest <path>]
//! fluxport export <biz_type> [--owner <id>] [--params <json>] [--manifest <path>]
//!                 [--format csv|spreadsheet] [--timeout <secs>] [--json]
//! fluxport status <task_id> [--json]
//! fluxport list [--owner <id>] [--limit N] [--json]
//! ```
//!
//! `--json-logs` switches the stderr log stream to JSON lines.

mod commands;
mod demo;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{export::ExportArgs, list::ListArgs, status::StatusArgs, units::UnitsArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "fluxport",
    version,
    about = "Run table exports asynchronously and track their progress",
    long_about = None,
)]
struct Cli {
    /// Write logs to stderr as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the registered export units.
    Units(UnitsArgs),

    /// Submit an export and wait for it to finish.
    Export(ExportArgs),

    /// Show one task from the ledger.
    Status(StatusArgs),

    /// List an owner's tasks, newest first.
    List(ListArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    fluxport_runtime::init_tracing(cli.json_logs);
    match cli.command {
        Commands::Units(args) => args.run(),
        Commands::Export(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::List(args) => args.run(),
    }
}
