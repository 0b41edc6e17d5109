//! ReconciliationLoop: one pass over the candidate orders.
//!
//! Per order, sequentially:
//!
//! 1. Resolve the Target reference (unresolved → skipped).
//! 2. Load a fresh Target view (missing → skipped).
//! 3. Marker present → the transition is skipped.
//! 4. Transition; on mutations, tag the order with the marker.
//! 5. Write the terminal status back, only for a settled Target side.
//!
//! Every step returns an outcome value; no single order can abort the batch.
//! A tick is not reentrant: a tick that starts while another is running is
//! dropped with [`TickStatus::AlreadyRunning`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use pickup_core::{
    AccessToken, Config, CredentialProvider, RemoteError, RemoteSystem, SourceOrder,
    SourceOrderId, SourceSystem, StatusCode, StoreId, TargetOrderView, TargetSystem,
};

use crate::fetch::SourceOrderFetcher;
use crate::outcome::{OutcomeKind, ReconciliationOutcome, SkipReason, TickReport, TickStatus};
use crate::resolver::{IdentifierResolver, ResolvedReference, Unresolved};
use crate::transition::{plan, OrderPlan, ReadinessTransitioner, TransitionOutcome};
use crate::writeback::SourceStatusWriter;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// The slice of [`Config`] the engine itself reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub candidate_status: StatusCode,
    pub terminal_status: StatusCode,
    pub store_id: Option<StoreId>,
    pub marker_tag: String,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            candidate_status: config.source.candidate_status,
            terminal_status: config.source.terminal_status,
            store_id: config.source.store_id,
            marker_tag: config.reconcile.marker_tag.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Inspection
// ---------------------------------------------------------------------------

/// Read-only answer to "what would a tick do with this order?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inspection {
    pub source_order: SourceOrder,
    /// Whether the order is in the candidate status (and store).
    pub candidate: bool,
    pub cross_reference_field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ResolvedReference>,
    /// Set when `resolution` is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unresolved: Option<Unresolved>,
    pub target: TargetInspection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TargetInspection {
    Unresolved,
    NotFound,
    LoadFailed {
        message: String,
    },
    Loaded {
        view: TargetOrderView,
        marker_present: bool,
        plan: OrderPlan,
    },
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

pub struct Reconciler {
    credentials: Arc<dyn CredentialProvider>,
    source: Arc<dyn SourceSystem>,
    target: Arc<dyn TargetSystem>,
    resolver: IdentifierResolver,
    settings: EngineSettings,
    in_progress: AtomicBool,
}

/// Clears the in-progress flag when the tick ends, whichever way it ends.
struct TickGuard<'a>(&'a AtomicBool);

impl<'a> TickGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| TickGuard(flag))
    }
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Reconciler {
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        source: Arc<dyn SourceSystem>,
        target: Arc<dyn TargetSystem>,
        resolver: IdentifierResolver,
        settings: EngineSettings,
    ) -> Self {
        Self {
            credentials,
            source,
            target,
            resolver,
            settings,
            in_progress: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// `true` while a tick is running.
    pub fn is_running(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// One full pass over every candidate order.
    pub fn run_once(&self) -> TickReport {
        let started_at = Utc::now();
        let Some(_guard) = TickGuard::acquire(&self.in_progress) else {
            tracing::warn!("previous tick still running; dropping this one");
            return TickReport::aborted(TickStatus::AlreadyRunning, started_at);
        };
        let Some(token) = self.credentials.token() else {
            tracing::warn!("source system not authorized; tick skipped");
            return TickReport::aborted(TickStatus::CredentialMissing, started_at);
        };

        let fetcher = SourceOrderFetcher::new(
            self.source.as_ref(),
            self.settings.candidate_status,
            self.settings.store_id,
        );
        let candidates = match fetcher.fetch(&token) {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::error!(error = %e, "fetching source candidates failed; tick skipped");
                return TickReport::aborted(
                    TickStatus::FetchFailed {
                        message: e.to_string(),
                    },
                    started_at,
                );
            }
        };
        tracing::info!(candidates = candidates.len(), "tick started");

        let outcomes: Vec<ReconciliationOutcome> = candidates
            .iter()
            .map(|order| {
                let outcome = self.reconcile_order(&token, order);
                outcome.log();
                outcome
            })
            .collect();

        let report = TickReport {
            status: TickStatus::Completed,
            candidates: candidates.len(),
            outcomes,
            started_at,
            finished_at: Utc::now(),
        };
        tracing::info!(
            candidates = report.candidates,
            failures = report.failures(),
            "tick finished"
        );
        report
    }

    /// Operator-triggered pass for a single Source order.
    ///
    /// Shares the tick guard with [`run_once`](Self::run_once). Orders outside
    /// the candidate status are reported as skipped, never written back.
    pub fn run_order(&self, id: SourceOrderId) -> TickReport {
        let started_at = Utc::now();
        let Some(_guard) = TickGuard::acquire(&self.in_progress) else {
            return TickReport::aborted(TickStatus::AlreadyRunning, started_at);
        };
        let Some(token) = self.credentials.token() else {
            return TickReport::aborted(TickStatus::CredentialMissing, started_at);
        };
        let order = match self.source.get_order(&token, id) {
            Ok(order) => order,
            Err(e) => {
                tracing::error!(source_order = %id, error = %e, "loading source order failed");
                return TickReport::aborted(
                    TickStatus::FetchFailed {
                        message: e.to_string(),
                    },
                    started_at,
                );
            }
        };

        let outcome = if self.is_candidate(&order) {
            self.reconcile_order(&token, &order)
        } else {
            ReconciliationOutcome::start(&order).with(OutcomeKind::Skipped {
                reason: SkipReason::NotCandidate,
            })
        };
        outcome.log();
        TickReport {
            status: TickStatus::Completed,
            candidates: 1,
            outcomes: vec![outcome],
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Read-only view of what a tick would do for one order. Never mutates.
    pub fn inspect(&self, id: SourceOrderId) -> Result<Inspection, RemoteError> {
        let token = self
            .credentials
            .token()
            .ok_or(RemoteError::CredentialMissing(RemoteSystem::Source))?;
        let order = self.source.get_order(&token, id)?;
        let (resolution, unresolved) = match self.resolver.resolve(&order) {
            Ok(resolved) => (Some(resolved), None),
            Err(why) => (None, Some(why)),
        };

        let target = match &resolution {
            None => TargetInspection::Unresolved,
            Some(resolved) => match self.target.load_order(&resolved.reference) {
                Ok(view) => TargetInspection::Loaded {
                    marker_present: view.has_tag(&self.settings.marker_tag),
                    plan: plan(&view),
                    view,
                },
                Err(e) if e.is_not_found() => TargetInspection::NotFound,
                Err(e) => TargetInspection::LoadFailed {
                    message: e.to_string(),
                },
            },
        };

        Ok(Inspection {
            candidate: self.is_candidate(&order),
            cross_reference_field: self.resolver.field().wire_name().to_string(),
            source_order: order,
            resolution,
            unresolved,
            target,
        })
    }

    fn is_candidate(&self, order: &SourceOrder) -> bool {
        order.status == self.settings.candidate_status
            && self
                .settings
                .store_id
                .map_or(true, |store| order.store_id == Some(store))
    }

    fn reconcile_order(&self, token: &AccessToken, order: &SourceOrder) -> ReconciliationOutcome {
        let mut outcome = ReconciliationOutcome::start(order);

        let resolved = match self.resolver.resolve(order) {
            Ok(resolved) => resolved,
            Err(why) => {
                if let Unresolved::Malformed {
                    cross_reference, ..
                } = &why
                {
                    outcome.cross_reference = Some(cross_reference.clone());
                }
                return outcome.with(OutcomeKind::Skipped {
                    reason: why.skip_reason(),
                });
            }
        };
        outcome.cross_reference = Some(resolved.cross_reference.clone());
        outcome.target = Some(resolved.reference.clone());

        let view = match self.target.load_order(&resolved.reference) {
            Ok(view) => view,
            Err(e) if e.is_not_found() => {
                return outcome.with(OutcomeKind::Skipped {
                    reason: SkipReason::NotFound,
                })
            }
            Err(e) => {
                return outcome.with(OutcomeKind::TargetTransitionFailed {
                    reason: format!("loading target order: {e}"),
                    partial: false,
                })
            }
        };
        outcome.target_name = Some(view.name.clone());

        let transitioned = if view.has_tag(&self.settings.marker_tag) {
            tracing::debug!(order = %view.name, "idempotency marker present; transition skipped");
            false
        } else {
            match ReadinessTransitioner::new(self.target.as_ref()).transition(&view) {
                TransitionOutcome::Succeeded { mutations } => {
                    tracing::debug!(order = %view.name, mutations, "target transitioned");
                    self.mark(&view);
                    true
                }
                TransitionOutcome::NoActionNeeded => false,
                TransitionOutcome::Excluded => {
                    return outcome.with(OutcomeKind::Skipped {
                        reason: SkipReason::NotPickup,
                    })
                }
                TransitionOutcome::Failed { reason, partial } => {
                    return outcome.with(OutcomeKind::TargetTransitionFailed { reason, partial })
                }
            }
        };

        let writer = SourceStatusWriter::new(self.source.as_ref(), self.settings.terminal_status);
        match writer.write(token, order.id) {
            Ok(()) => outcome.with(OutcomeKind::Succeeded { transitioned }),
            Err(e) => outcome.with(OutcomeKind::SourceWritebackFailed {
                reason: e.to_string(),
                transitioned,
            }),
        }
    }

    /// Tag the order. A failure here is logged only: the state machine will
    /// see the settled fulfillment orders on the next tick anyway.
    fn mark(&self, view: &TargetOrderView) {
        let tags = [self.settings.marker_tag.clone()];
        if let Err(e) = self.target.add_tags(&view.reference, &tags) {
            tracing::warn!(
                order = %view.name,
                target_order = view.reference.as_gid(),
                error = %e,
                "adding idempotency marker failed",
            );
        }
    }
}
