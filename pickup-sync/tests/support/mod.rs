//! In-memory Source/Target systems that record every mutation.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use pickup_core::{
    AccessToken, CredentialProvider, CrossReferenceField, CrossReferences, DeliveryMethod,
    FulfillmentLineItem, FulfillmentOrder, FulfillmentOrderId, FulfillmentOrderStatus,
    LineItemQuantity, OrderLineItem, OverrideTable, RemoteError, RemoteSystem, SourceOrder,
    SourceOrderId, SourceSystem, StatusCode, TargetOrderReference, TargetOrderView, TargetSystem,
};
use pickup_sync::{EngineSettings, IdentifierResolver, Reconciler};

pub const CANDIDATE: StatusCode = StatusCode(214875);
pub const TERMINAL: StatusCode = StatusCode(9);
pub const MARKER: &str = "retirada-local-pronto";

// =============================================================================
// Credentials
// =============================================================================

pub struct StaticCredentials(pub Option<AccessToken>);

impl StaticCredentials {
    pub fn authorized() -> Self {
        Self(Some(AccessToken::new("test-token", None)))
    }
}

impl CredentialProvider for StaticCredentials {
    fn token(&self) -> Option<AccessToken> {
        self.0.clone()
    }
}

// =============================================================================
// Source
// =============================================================================

#[derive(Default)]
pub struct FakeSource {
    pub orders: Mutex<BTreeMap<SourceOrderId, SourceOrder>>,
    pub writes: Mutex<Vec<(SourceOrderId, StatusCode)>>,
    pub failing_writes: Mutex<HashSet<SourceOrderId>>,
    pub list_error: Mutex<Option<RemoteError>>,
}

impl FakeSource {
    pub fn with_orders(orders: impl IntoIterator<Item = SourceOrder>) -> Self {
        let fake = Self::default();
        {
            let mut map = fake.orders.lock().expect("orders");
            for order in orders {
                map.insert(order.id, order);
            }
        }
        fake
    }

    pub fn fail_writes_for(&self, id: u64) {
        self.failing_writes
            .lock()
            .expect("failing writes")
            .insert(SourceOrderId(id));
    }

    pub fn heal_writes(&self) {
        self.failing_writes.lock().expect("failing writes").clear();
    }

    pub fn writes(&self) -> Vec<(SourceOrderId, StatusCode)> {
        self.writes.lock().expect("writes").clone()
    }

    pub fn status_of(&self, id: u64) -> StatusCode {
        self.orders.lock().expect("orders")[&SourceOrderId(id)].status
    }
}

impl SourceSystem for FakeSource {
    fn list_orders(
        &self,
        _token: &AccessToken,
        status: StatusCode,
    ) -> Result<Vec<SourceOrder>, RemoteError> {
        if let Some(err) = self.list_error.lock().expect("list error").clone() {
            return Err(err);
        }
        Ok(self
            .orders
            .lock()
            .expect("orders")
            .values()
            .filter(|order| order.status == status)
            .cloned()
            .collect())
    }

    fn get_order(
        &self,
        _token: &AccessToken,
        id: SourceOrderId,
    ) -> Result<SourceOrder, RemoteError> {
        self.orders
            .lock()
            .expect("orders")
            .get(&id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound {
                system: RemoteSystem::Source,
                what: format!("order {id}"),
            })
    }

    fn write_status(
        &self,
        _token: &AccessToken,
        id: SourceOrderId,
        status: StatusCode,
    ) -> Result<(), RemoteError> {
        if self.failing_writes.lock().expect("failing writes").contains(&id) {
            return Err(RemoteError::Transport {
                system: RemoteSystem::Source,
                message: "connection reset".into(),
            });
        }
        self.writes.lock().expect("writes").push((id, status));
        if let Some(order) = self.orders.lock().expect("orders").get_mut(&id) {
            order.status = status;
        }
        Ok(())
    }
}

// =============================================================================
// Target
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Create {
        order: String,
        lines: Vec<LineItemQuantity>,
    },
    Prepare {
        fulfillment_order: String,
        lines: Vec<LineItemQuantity>,
    },
    Tag {
        order: String,
        tags: Vec<String>,
    },
}

/// What `create_pickup_fulfillment` does after recording the mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CreateBehavior {
    /// Adds one OPEN pickup fulfillment order.
    #[default]
    Pickup,
    /// Rejected with a business-rule error.
    Reject,
    /// Accepted, but the order still has no fulfillment order afterwards.
    Vanish,
    /// Adds a shipping fulfillment order instead of a pickup one.
    Shipping,
    /// Accepted, then every later load of the order fails.
    BreakReload,
}

#[derive(Default)]
pub struct FakeTarget {
    pub create_behavior: Mutex<CreateBehavior>,
    pub orders: Mutex<HashMap<String, TargetOrderView>>,
    pub mutations: Mutex<Vec<Mutation>>,
    pub loads: Mutex<Vec<String>>,
    pub failing_loads: Mutex<HashSet<String>>,
    pub failing_prepares: Mutex<HashSet<String>>,
    pub failing_tags: Mutex<bool>,
}

impl FakeTarget {
    pub fn with_views(views: impl IntoIterator<Item = TargetOrderView>) -> Self {
        let fake = Self::default();
        {
            let mut map = fake.orders.lock().expect("orders");
            for view in views {
                map.insert(view.reference.as_gid().to_owned(), view);
            }
        }
        fake
    }

    pub fn fail_load(&self, order_id: &str) {
        self.failing_loads
            .lock()
            .expect("failing loads")
            .insert(TargetOrderReference::from_order_id(order_id).as_gid().to_owned());
    }

    pub fn fail_prepare(&self, fulfillment_order: &str) {
        self.failing_prepares
            .lock()
            .expect("failing prepares")
            .insert(fulfillment_order.to_owned());
    }

    pub fn on_create(&self, behavior: CreateBehavior) {
        *self.create_behavior.lock().expect("create behavior") = behavior;
    }

    pub fn tag_mutations(&self) -> Vec<Mutation> {
        self.mutations()
            .into_iter()
            .filter(|m| matches!(m, Mutation::Tag { .. }))
            .collect()
    }

    pub fn fail_tags(&self) {
        *self.failing_tags.lock().expect("failing tags") = true;
    }

    pub fn mutations(&self) -> Vec<Mutation> {
        self.mutations.lock().expect("mutations").clone()
    }

    /// Mutations other than tagging.
    pub fn fulfillment_mutations(&self) -> Vec<Mutation> {
        self.mutations()
            .into_iter()
            .filter(|m| !matches!(m, Mutation::Tag { .. }))
            .collect()
    }

    pub fn loads(&self) -> Vec<String> {
        self.loads.lock().expect("loads").clone()
    }

    pub fn view(&self, order_id: &str) -> TargetOrderView {
        let gid = TargetOrderReference::from_order_id(order_id);
        self.orders.lock().expect("orders")[gid.as_gid()].clone()
    }
}

impl TargetSystem for FakeTarget {
    fn load_order(&self, reference: &TargetOrderReference) -> Result<TargetOrderView, RemoteError> {
        let gid = reference.as_gid().to_owned();
        self.loads.lock().expect("loads").push(gid.clone());
        if self.failing_loads.lock().expect("failing loads").contains(&gid) {
            return Err(RemoteError::Transport {
                system: RemoteSystem::Target,
                message: "503 Service Unavailable".into(),
            });
        }
        self.orders
            .lock()
            .expect("orders")
            .get(&gid)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound {
                system: RemoteSystem::Target,
                what: format!("order {gid}"),
            })
    }

    fn create_pickup_fulfillment(
        &self,
        view: &TargetOrderView,
        lines: &[LineItemQuantity],
    ) -> Result<(), RemoteError> {
        let gid = view.reference.as_gid().to_owned();
        self.mutations.lock().expect("mutations").push(Mutation::Create {
            order: gid.clone(),
            lines: lines.to_vec(),
        });
        let delivery_method = match *self.create_behavior.lock().expect("create behavior") {
            CreateBehavior::Pickup => DeliveryMethod::Pickup,
            CreateBehavior::Shipping => DeliveryMethod::Shipping,
            CreateBehavior::Vanish => return Ok(()),
            CreateBehavior::Reject => {
                return Err(RemoteError::BusinessRule {
                    operation: "fulfillmentCreate",
                    errors: vec![pickup_core::UserError {
                        field: vec!["fulfillment".into()],
                        message: "Line items are not fulfillable".into(),
                    }],
                })
            }
            CreateBehavior::BreakReload => {
                self.failing_loads
                    .lock()
                    .expect("failing loads")
                    .insert(gid.clone());
                DeliveryMethod::Pickup
            }
        };
        let mut orders = self.orders.lock().expect("orders");
        if let Some(stored) = orders.get_mut(&gid) {
            let index = stored.fulfillment_orders.len() + 1;
            stored.fulfillment_orders.push(FulfillmentOrder {
                id: FulfillmentOrderId(format!("{gid}/fo-{index}")),
                status: FulfillmentOrderStatus::Open,
                delivery_method,
                line_items: lines
                    .iter()
                    .map(|line| FulfillmentLineItem {
                        id: format!("{}-fo", line.id),
                        title: None,
                        remaining_quantity: line.quantity,
                        total_quantity: line.quantity,
                    })
                    .collect(),
            });
        }
        Ok(())
    }

    fn prepare_for_pickup(
        &self,
        fulfillment_order: &FulfillmentOrderId,
        lines: &[LineItemQuantity],
    ) -> Result<(), RemoteError> {
        self.mutations.lock().expect("mutations").push(Mutation::Prepare {
            fulfillment_order: fulfillment_order.0.clone(),
            lines: lines.to_vec(),
        });
        if self
            .failing_prepares
            .lock()
            .expect("failing prepares")
            .contains(&fulfillment_order.0)
        {
            return Err(RemoteError::BusinessRule {
                operation: "fulfillmentOrderLineItemsPreparedForPickup",
                errors: vec![pickup_core::UserError {
                    field: vec!["input".into()],
                    message: "Fulfillment order is not open".into(),
                }],
            });
        }
        let mut orders = self.orders.lock().expect("orders");
        for view in orders.values_mut() {
            for fo in view
                .fulfillment_orders
                .iter_mut()
                .filter(|fo| fo.id == *fulfillment_order)
            {
                fo.status = FulfillmentOrderStatus::InProgress;
            }
        }
        Ok(())
    }

    fn add_tags(&self, reference: &TargetOrderReference, tags: &[String]) -> Result<(), RemoteError> {
        self.mutations.lock().expect("mutations").push(Mutation::Tag {
            order: reference.as_gid().to_owned(),
            tags: tags.to_vec(),
        });
        if *self.failing_tags.lock().expect("failing tags") {
            return Err(RemoteError::Transport {
                system: RemoteSystem::Target,
                message: "timed out".into(),
            });
        }
        if let Some(view) = self.orders.lock().expect("orders").get_mut(reference.as_gid()) {
            view.tags.extend(tags.iter().cloned());
        }
        Ok(())
    }
}

// =============================================================================
// Builders
// =============================================================================

pub fn source_order(id: u64, cross_reference: Option<&str>) -> SourceOrder {
    SourceOrder {
        id: SourceOrderId(id),
        number: Some(id + 1000),
        status: CANDIDATE,
        store_id: None,
        cross_references: CrossReferences {
            store_order_number: cross_reference.map(str::to_owned),
            ..Default::default()
        },
    }
}

pub fn fulfillment_order(
    id: &str,
    status: FulfillmentOrderStatus,
    method: DeliveryMethod,
    remaining: &[u32],
) -> FulfillmentOrder {
    FulfillmentOrder {
        id: FulfillmentOrderId::from(id),
        status,
        delivery_method: method,
        line_items: remaining
            .iter()
            .enumerate()
            .map(|(i, qty)| FulfillmentLineItem {
                id: format!("{id}/line-{i}"),
                title: None,
                remaining_quantity: *qty,
                total_quantity: *qty,
            })
            .collect(),
    }
}

pub fn open_pickup(id: &str, remaining: &[u32]) -> FulfillmentOrder {
    fulfillment_order(id, FulfillmentOrderStatus::Open, DeliveryMethod::Pickup, remaining)
}

pub fn target_view(order_id: &str, fulfillment_orders: Vec<FulfillmentOrder>) -> TargetOrderView {
    TargetOrderView {
        reference: TargetOrderReference::from_order_id(order_id),
        name: format!("#{order_id}"),
        tags: Vec::new(),
        line_items: vec![OrderLineItem {
            id: format!("{order_id}/line"),
            title: "Bolo".into(),
            quantity: 1,
            unfulfilled_quantity: 1,
        }],
        fulfillment_orders,
    }
}

pub fn settings() -> EngineSettings {
    EngineSettings {
        candidate_status: CANDIDATE,
        terminal_status: TERMINAL,
        store_id: None,
        marker_tag: MARKER.to_string(),
    }
}

pub fn reconciler_with(
    credentials: StaticCredentials,
    source: &Arc<FakeSource>,
    target: &Arc<FakeTarget>,
    overrides: OverrideTable,
) -> Reconciler {
    Reconciler::new(
        Arc::new(credentials),
        source.clone(),
        target.clone(),
        IdentifierResolver::new(CrossReferenceField::StoreOrderNumber, overrides),
        settings(),
    )
}

pub fn reconciler(source: &Arc<FakeSource>, target: &Arc<FakeTarget>) -> Reconciler {
    reconciler_with(
        StaticCredentials::authorized(),
        source,
        target,
        OverrideTable::default(),
    )
}
