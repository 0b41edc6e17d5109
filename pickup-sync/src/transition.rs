//! ReadinessTransitioner: the fulfillment-order state machine.
//!
//! Lifecycle: `NO_FULFILLMENT_ORDER → OPEN → READY_FOR_PICKUP → CLOSED`, with
//! `CANCELLED` reachable from any non-terminal state.
//!
//! | Observed                                  | Action                          |
//! |-------------------------------------------|---------------------------------|
//! | no fulfillment order                      | create pickup fulfillment, re-enter once |
//! | OPEN/SCHEDULED, pickup, remaining > 0     | prepare remaining lines for pickup |
//! | READY_FOR_PICKUP, CLOSED, CANCELLED       | no-op                           |
//! | delivery method ≠ pickup                  | ignored (order excluded if nothing else is pickup) |
//! | ON_HOLD, INCOMPLETE, unknown              | hard failure for that fulfillment order |
//!
//! Planning ([`plan`]) is pure and is what `inspect` shows; executing a plan
//! ([`ReadinessTransitioner::transition`]) issues exactly the mutations the
//! plan names and nothing speculative.

use serde::{Deserialize, Serialize};

use pickup_core::{
    DeliveryMethod, FulfillmentOrder, FulfillmentOrderId, FulfillmentOrderStatus,
    LineItemQuantity, TargetOrderView, TargetSystem,
};

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Where a fulfillment order sits in the pickup lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Open,
    ReadyForPickup,
    Closed,
    Cancelled,
    /// A status the pickup flow cannot move forward from.
    Ineligible(FulfillmentOrderStatus),
}

/// Map the platform status onto the pickup lifecycle.
///
/// `IN_PROGRESS` only means "ready for pickup" on a pickup fulfillment order;
/// callers filter non-pickup orders before looking at the state.
pub fn classify(fulfillment_order: &FulfillmentOrder) -> LifecycleState {
    match &fulfillment_order.status {
        FulfillmentOrderStatus::Open | FulfillmentOrderStatus::Scheduled => LifecycleState::Open,
        FulfillmentOrderStatus::InProgress => LifecycleState::ReadyForPickup,
        FulfillmentOrderStatus::Closed => LifecycleState::Closed,
        FulfillmentOrderStatus::Cancelled => LifecycleState::Cancelled,
        other => LifecycleState::Ineligible(other.clone()),
    }
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlannedAction {
    /// Run the prepared-for-pickup mutation for these lines.
    Prepare { lines: Vec<LineItemQuantity> },
    /// Open pickup fulfillment order with nothing left to hand over.
    NothingRemaining,
    AlreadyReady,
    AlreadyTerminal { state: LifecycleState },
    NotPickup { delivery_method: DeliveryMethod },
    Ineligible { status: FulfillmentOrderStatus },
}

impl PlannedAction {
    pub fn is_mutation(&self) -> bool {
        matches!(self, PlannedAction::Prepare { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentPlan {
    pub fulfillment_order: FulfillmentOrderId,
    pub status: FulfillmentOrderStatus,
    pub delivery_method: DeliveryMethod,
    pub action: PlannedAction,
}

/// What the transitioner would do for one view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "plan", rename_all = "snake_case")]
pub enum OrderPlan {
    /// No fulfillment order yet: create one from the unfulfilled lines.
    CreateFulfillment { lines: Vec<LineItemQuantity> },
    /// No fulfillment order and nothing unfulfilled.
    NothingToFulfill,
    PerFulfillmentOrder { fulfillment_orders: Vec<FulfillmentPlan> },
}

fn plan_one(fulfillment_order: &FulfillmentOrder) -> FulfillmentPlan {
    let action = if !fulfillment_order.delivery_method.is_pickup() {
        PlannedAction::NotPickup {
            delivery_method: fulfillment_order.delivery_method.clone(),
        }
    } else {
        match classify(fulfillment_order) {
            LifecycleState::Open => {
                let lines = fulfillment_order.remaining_lines();
                if lines.is_empty() {
                    PlannedAction::NothingRemaining
                } else {
                    PlannedAction::Prepare { lines }
                }
            }
            LifecycleState::ReadyForPickup => PlannedAction::AlreadyReady,
            state @ (LifecycleState::Closed | LifecycleState::Cancelled) => {
                PlannedAction::AlreadyTerminal { state }
            }
            LifecycleState::Ineligible(status) => PlannedAction::Ineligible { status },
        }
    };
    FulfillmentPlan {
        fulfillment_order: fulfillment_order.id.clone(),
        status: fulfillment_order.status.clone(),
        delivery_method: fulfillment_order.delivery_method.clone(),
        action,
    }
}

/// Plan the transition for a view. Pure; performs no I/O.
pub fn plan(view: &TargetOrderView) -> OrderPlan {
    if view.fulfillment_orders.is_empty() {
        let lines = view.unfulfilled_lines();
        return if lines.is_empty() {
            OrderPlan::NothingToFulfill
        } else {
            OrderPlan::CreateFulfillment { lines }
        };
    }
    OrderPlan::PerFulfillmentOrder {
        fulfillment_orders: view.fulfillment_orders.iter().map(plan_one).collect(),
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// At least one mutation was applied and nothing failed.
    Succeeded { mutations: usize },
    /// Every pickup fulfillment order was already settled.
    NoActionNeeded,
    /// No pickup fulfillment order on the order at all.
    Excluded,
    /// At least one hard failure. `partial` is set when some mutation landed.
    Failed { reason: String, partial: bool },
}

impl TransitionOutcome {
    /// Write-back is allowed only for a fully settled Target side.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            TransitionOutcome::Succeeded { .. } | TransitionOutcome::NoActionNeeded
        )
    }
}

pub struct ReadinessTransitioner<'a> {
    target: &'a dyn TargetSystem,
}

impl<'a> ReadinessTransitioner<'a> {
    pub fn new(target: &'a dyn TargetSystem) -> Self {
        Self { target }
    }

    pub fn transition(&self, view: &TargetOrderView) -> TransitionOutcome {
        match plan(view) {
            OrderPlan::NothingToFulfill => TransitionOutcome::NoActionNeeded,
            OrderPlan::CreateFulfillment { lines } => self.create_then_reenter(view, &lines),
            OrderPlan::PerFulfillmentOrder { fulfillment_orders } => {
                self.apply(&fulfillment_orders)
            }
        }
    }

    fn create_then_reenter(
        &self,
        view: &TargetOrderView,
        lines: &[LineItemQuantity],
    ) -> TransitionOutcome {
        if let Err(e) = self.target.create_pickup_fulfillment(view, lines) {
            return TransitionOutcome::Failed {
                reason: format!("creating pickup fulfillment: {e}"),
                partial: false,
            };
        }
        tracing::debug!(order = %view.name, lines = lines.len(), "pickup fulfillment created");

        let fresh = match self.target.load_order(&view.reference) {
            Ok(fresh) => fresh,
            Err(e) => {
                return TransitionOutcome::Failed {
                    reason: format!("reloading after fulfillment create: {e}"),
                    partial: true,
                }
            }
        };
        // Re-entry happens once; a second empty view is a failure, not a loop.
        let OrderPlan::PerFulfillmentOrder { fulfillment_orders } = plan(&fresh) else {
            return TransitionOutcome::Failed {
                reason: "no fulfillment order after fulfillment create".to_string(),
                partial: true,
            };
        };
        match self.apply(&fulfillment_orders) {
            TransitionOutcome::Succeeded { mutations } => TransitionOutcome::Succeeded {
                mutations: mutations + 1,
            },
            TransitionOutcome::NoActionNeeded => TransitionOutcome::Succeeded { mutations: 1 },
            TransitionOutcome::Excluded => TransitionOutcome::Failed {
                reason: "created fulfillment has no pickup fulfillment order".to_string(),
                partial: true,
            },
            TransitionOutcome::Failed { reason, .. } => TransitionOutcome::Failed {
                reason,
                partial: true,
            },
        }
    }

    /// Evaluate every fulfillment order independently, then aggregate.
    fn apply(&self, plans: &[FulfillmentPlan]) -> TransitionOutcome {
        let mut pickup_seen = false;
        let mut applied = 0usize;
        let mut failures = Vec::new();

        for plan in plans {
            match &plan.action {
                PlannedAction::NotPickup { .. } => continue,
                PlannedAction::Prepare { lines } => {
                    pickup_seen = true;
                    match self.target.prepare_for_pickup(&plan.fulfillment_order, lines) {
                        Ok(()) => applied += 1,
                        Err(e) => failures.push(format!("{}: {e}", plan.fulfillment_order)),
                    }
                }
                PlannedAction::Ineligible { status } => {
                    pickup_seen = true;
                    failures.push(format!(
                        "{}: status {status} cannot be prepared for pickup",
                        plan.fulfillment_order
                    ));
                }
                PlannedAction::NothingRemaining
                | PlannedAction::AlreadyReady
                | PlannedAction::AlreadyTerminal { .. } => pickup_seen = true,
            }
        }

        if !pickup_seen {
            TransitionOutcome::Excluded
        } else if !failures.is_empty() {
            TransitionOutcome::Failed {
                reason: failures.join("; "),
                partial: applied > 0,
            }
        } else if applied > 0 {
            TransitionOutcome::Succeeded { mutations: applied }
        } else {
            TransitionOutcome::NoActionNeeded
        }
    }
}
