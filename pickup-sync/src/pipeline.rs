//! Shared reconciliation entrypoint used by CLI and daemon.

use pickup_core::SourceOrderId;

use crate::outcome::TickReport;
use crate::reconcile::Reconciler;

/// Scope for a reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunScope {
    /// Every candidate order.
    All,
    /// A single Source order, regardless of whether it was listed.
    Order(SourceOrderId),
}

/// Run the reconciliation pipeline for a scope.
///
/// This is the canonical entrypoint for both `pickup run` and the daemon's
/// ticker and `run` socket command.
pub fn run(reconciler: &Reconciler, scope: RunScope) -> TickReport {
    match scope {
        RunScope::All => reconciler.run_once(),
        RunScope::Order(id) => reconciler.run_order(id),
    }
}
