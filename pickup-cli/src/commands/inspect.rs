//! `pickup inspect <id>`: read-only view of one Source order's reconciliation.

use anyhow::{Context, Result};
use clap::Args;

use pickup_core::SourceOrderId;
use pickup_daemon::{build_engine, init_tracing};

use super::render::print_inspection;

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Source order id.
    pub order: u64,

    /// Emit the inspection as JSON.
    #[arg(long)]
    pub json: bool,
}

impl InspectArgs {
    pub fn run(self) -> Result<()> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        let engine = build_engine(&home).context("failed to prepare reconciliation engine")?;
        init_tracing(engine.config.daemon.log_json);

        let inspection = engine
            .reconciler
            .inspect(SourceOrderId(self.order))
            .with_context(|| format!("failed to inspect source order {}", self.order))?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&inspection)
                    .context("failed to serialize inspection")?
            );
        } else {
            print_inspection(&inspection);
        }
        Ok(())
    }
}
