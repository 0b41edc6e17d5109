//! Per-order outcomes and per-tick reports.
//!
//! Outcomes are transient: they are logged, summarized for the daemon status
//! and returned to operators, never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pickup_core::{SourceOrder, SourceOrderId, TargetOrderReference};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// The configured cross-reference field is empty.
    NoCrossReference,
    /// The cross-reference (or its override) is not a Target order id.
    MalformedReference,
    /// The Target order does not exist (archived, deleted, stale reference).
    NotFound,
    /// The Target order has no pickup fulfillment order.
    NotPickup,
    /// Operator-triggered run for an order not in the candidate status.
    NotCandidate,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SkipReason::NoCrossReference => "no-cross-reference",
            SkipReason::MalformedReference => "malformed-reference",
            SkipReason::NotFound => "not-found",
            SkipReason::NotPickup => "not-pickup",
            SkipReason::NotCandidate => "not-candidate",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutcomeKind {
    Skipped { reason: SkipReason },
    /// The Target side did not settle; the Source status was left alone.
    TargetTransitionFailed { reason: String, partial: bool },
    /// The Target side settled but the Source status write failed.
    SourceWritebackFailed { reason: String, transitioned: bool },
    /// `transitioned` is false for an idempotent no-op.
    Succeeded { transitioned: bool },
}

impl OutcomeKind {
    pub fn label(&self) -> &'static str {
        match self {
            OutcomeKind::Skipped { .. } => "skipped",
            OutcomeKind::TargetTransitionFailed { .. } => "target_transition_failed",
            OutcomeKind::SourceWritebackFailed { .. } => "source_writeback_failed",
            OutcomeKind::Succeeded { .. } => "succeeded",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            OutcomeKind::TargetTransitionFailed { .. } | OutcomeKind::SourceWritebackFailed { .. }
        )
    }
}

/// Result of reconciling one Source order in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationOutcome {
    pub source_order: SourceOrderId,
    /// `#<number>` when known.
    pub source_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetOrderReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,
    pub kind: OutcomeKind,
}

impl ReconciliationOutcome {
    pub(crate) fn start(order: &SourceOrder) -> Self {
        Self {
            source_order: order.id,
            source_label: order.label(),
            cross_reference: None,
            target: None,
            target_name: None,
            kind: OutcomeKind::Succeeded {
                transitioned: false,
            },
        }
    }

    pub(crate) fn with(mut self, kind: OutcomeKind) -> Self {
        self.kind = kind;
        self
    }

    /// Emit the single summary line for this order.
    pub fn log(&self) {
        let target = self.target.as_ref().map(|t| t.as_gid()).unwrap_or("-");
        let name = self.target_name.as_deref().unwrap_or("-");
        match &self.kind {
            OutcomeKind::Succeeded { transitioned: true } => tracing::info!(
                source_order = %self.source_order,
                target_order = target,
                order = name,
                "{} ready for pickup; source status updated",
                self.source_label,
            ),
            OutcomeKind::Succeeded { transitioned: false } => tracing::info!(
                source_order = %self.source_order,
                target_order = target,
                order = name,
                "{} already settled; source status updated",
                self.source_label,
            ),
            OutcomeKind::Skipped { reason } => tracing::warn!(
                source_order = %self.source_order,
                target_order = target,
                reason = %reason,
                "{} skipped",
                self.source_label,
            ),
            OutcomeKind::TargetTransitionFailed { reason, partial } => tracing::error!(
                source_order = %self.source_order,
                target_order = target,
                order = name,
                partial = *partial,
                "{} target transition failed: {reason}",
                self.source_label,
            ),
            OutcomeKind::SourceWritebackFailed {
                reason,
                transitioned,
            } => tracing::error!(
                source_order = %self.source_order,
                target_order = target,
                order = name,
                transitioned = *transitioned,
                "{} ready on target but source write-back failed; reconcile manually: {reason}",
                self.source_label,
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Tick report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TickStatus {
    Completed,
    /// No usable Source credential; nothing was attempted.
    CredentialMissing,
    /// Candidate discovery failed; no order was attempted.
    FetchFailed { message: String },
    /// Another tick was still running; this one was dropped.
    AlreadyRunning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    pub status: TickStatus,
    pub candidates: usize,
    pub outcomes: Vec<ReconciliationOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl TickReport {
    pub(crate) fn aborted(status: TickStatus, started_at: DateTime<Utc>) -> Self {
        Self {
            status,
            candidates: 0,
            outcomes: Vec::new(),
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn count(&self, label: &str) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.kind.label() == label)
            .count()
    }

    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| o.kind.is_failure()).count()
    }

    pub fn summary(&self) -> TickSummary {
        TickSummary {
            status: self.status.clone(),
            candidates: self.candidates,
            succeeded: self.count("succeeded"),
            skipped: self.count("skipped"),
            target_transition_failed: self.count("target_transition_failed"),
            source_writeback_failed: self.count("source_writeback_failed"),
            finished_at: self.finished_at,
        }
    }
}

/// Counts-only view of a tick, kept by the daemon for `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSummary {
    pub status: TickStatus,
    pub candidates: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub target_transition_failed: usize,
    pub source_writeback_failed: usize,
    pub finished_at: DateTime<Utc>,
}
