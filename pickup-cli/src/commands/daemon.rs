//! `pickup daemon`: foreground daemon and its socket commands.

use anyhow::{Context, Result};
use clap::Subcommand;
use serde_json::Value;

use pickup_daemon::paths::socket_path;
use pickup_daemon::{
    request_authorize, request_inspect, request_run, request_status, request_stop,
    start_blocking, DaemonError,
};
use pickup_sync::TickReport;

use super::render::print_report;

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run the daemon in the foreground (ticker + socket server).
    Start {
        /// Log as JSON lines instead of human-readable text.
        #[arg(long)]
        log_json: bool,
    },
    /// Request graceful daemon shutdown over the Unix socket.
    Stop,
    /// Query daemon runtime status over the Unix socket.
    Status,
    /// Ask the daemon for an immediate pass.
    Run {
        /// Reconcile only this Source order id.
        #[arg(long)]
        order: Option<u64>,
    },
    /// Ask the daemon to inspect one Source order.
    Inspect {
        /// Source order id.
        order: u64,
    },
    /// Exchange an OAuth authorization code for a Source access token.
    Authorize {
        /// Code from the Bling consent redirect.
        code: String,
    },
}

pub fn run(command: DaemonCommand) -> Result<()> {
    let home = dirs::home_dir().context("could not determine home directory")?;

    match command {
        DaemonCommand::Start { log_json } => {
            start_blocking(&home, log_json).context("daemon exited with error")?;
        }
        DaemonCommand::Stop => match request_stop(&home) {
            Ok(()) => println!("daemon stop requested"),
            Err(DaemonError::DaemonNotRunning { .. }) => {
                println!("daemon is not running");
            }
            Err(err) => return Err(err).context("failed to stop daemon"),
        },
        DaemonCommand::Status => match request_status(&home) {
            Ok(status) => print_json(&status)?,
            Err(DaemonError::DaemonNotRunning { .. }) => {
                let payload = serde_json::json!({
                    "running": false,
                    "socket": socket_path(&home).display().to_string(),
                });
                print_json(&payload)?;
            }
            Err(err) => return Err(err).context("failed to query daemon status"),
        },
        DaemonCommand::Run { order } => {
            let data = request_run(&home, order).context("daemon run failed")?;
            let report: TickReport =
                serde_json::from_value(data).context("daemon returned a malformed tick report")?;
            print_report(&report);
        }
        DaemonCommand::Inspect { order } => {
            let data = request_inspect(&home, order)
                .with_context(|| format!("daemon failed to inspect source order {order}"))?;
            print_json(&data)?;
        }
        DaemonCommand::Authorize { code } => {
            let data = request_authorize(&home, &code).context("authorization failed")?;
            print_json(&data)?;
        }
    }

    Ok(())
}

fn print_json(value: &Value) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to render daemon response JSON")?
    );
    Ok(())
}
