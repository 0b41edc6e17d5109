//! Pickup: marks store-pickup orders ready on the storefront once the ERP
//! says they are waiting for the customer.
//!
//! # Usage
//!
//! ```text
//! pickup config init [--force]
//! pickup config show
//! pickup run [--order <id>] [--json]
//! pickup inspect <id> [--json]
//! pickup daemon start [--log-json]|stop|status|run [--order <id>]|inspect <id>|authorize <code>
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{config::ConfigCommand, daemon::DaemonCommand, inspect::InspectArgs, run::RunArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "pickup",
    version,
    about = "Reconcile ERP pickup orders with storefront fulfillment state",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create or print `~/.pickup/config.yaml`.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Run one reconciliation pass in this process.
    Run(RunArgs),

    /// Show what a pass would do with one Source order, without mutating.
    Inspect(InspectArgs),

    /// Run or talk to the background reconciliation daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Config { command } => commands::config::run(command),
        Commands::Run(args) => args.run(),
        Commands::Inspect(args) => args.run(),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}
