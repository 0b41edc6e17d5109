//! `pickup run`: one reconciliation pass in the foreground.

use anyhow::{Context, Result};
use clap::Args;

use pickup_core::SourceOrderId;
use pickup_daemon::{build_engine, init_tracing};
use pickup_sync::{pipeline, RunScope};

use super::render::print_report;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Reconcile only this Source order id.
    #[arg(long)]
    pub order: Option<u64>,

    /// Emit the full tick report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        let engine = build_engine(&home).context("failed to prepare reconciliation engine")?;
        init_tracing(engine.config.daemon.log_json);

        let scope = match self.order {
            Some(id) => RunScope::Order(SourceOrderId(id)),
            None => RunScope::All,
        };
        let report = pipeline::run(&engine.reconciler, scope);

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize tick report")?
            );
        } else {
            print_report(&report);
        }
        Ok(())
    }
}
