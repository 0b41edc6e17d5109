//! # pickup-sync
//!
//! The reconciliation engine.
//!
//! Build a [`Reconciler`] from the three ports (credentials, Source, Target)
//! and call [`Reconciler::run_once`] per tick, or go through
//! [`pipeline::run`] with a [`RunScope`] from the CLI and the daemon.

pub mod fetch;
pub mod outcome;
pub mod pipeline;
pub mod reconcile;
pub mod resolver;
pub mod transition;
pub mod writeback;

pub use fetch::SourceOrderFetcher;
pub use outcome::{OutcomeKind, ReconciliationOutcome, SkipReason, TickReport, TickStatus, TickSummary};
pub use pipeline::RunScope;
pub use reconcile::{EngineSettings, Inspection, Reconciler, TargetInspection};
pub use resolver::{IdentifierResolver, ResolvedReference, Unresolved};
pub use transition::{
    classify, plan, FulfillmentPlan, LifecycleState, OrderPlan, PlannedAction,
    ReadinessTransitioner, TransitionOutcome,
};
pub use writeback::SourceStatusWriter;
