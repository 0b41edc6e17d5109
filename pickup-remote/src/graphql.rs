//! GraphQL documents and response shapes for the commerce platform.

use serde::Deserialize;

use pickup_core::{
    DeliveryMethod, FulfillmentLineItem, FulfillmentOrder, FulfillmentOrderId,
    FulfillmentOrderStatus, OrderLineItem, TargetOrderReference, TargetOrderView, UserError,
};

pub(crate) const ORDER_QUERY: &str = r#"
query PickupOrder($id: ID!) {
  node(id: $id) {
    ... on Order {
      id
      name
      tags
      lineItems(first: 50) {
        nodes { id title quantity unfulfilledQuantity }
      }
      fulfillmentOrders(first: 20) {
        nodes {
          id
          status
          deliveryMethod { methodType }
          lineItems(first: 50) {
            nodes { id remainingQuantity totalQuantity lineItem { title } }
          }
        }
      }
    }
  }
}"#;

/// Order-level fulfillment create.
///
/// `lineItemsByFulfillmentOrder` needs fulfillment order ids, and this document
/// is only sent for orders that have none, so it uses the order-level
/// `input: FulfillmentInput` form (`orderId`, `lineItems`, `trackingCompany`,
/// `trackingNumbers`). API versions that dropped that form reject the document
/// with a top-level error, which fails the order without a partial write.
pub(crate) const FULFILLMENT_CREATE: &str = r#"
mutation PickupFulfillmentCreate($input: FulfillmentInput!) {
  fulfillmentCreate(input: $input) {
    fulfillment { id status }
    userErrors { field message }
  }
}"#;

pub(crate) const PREPARED_FOR_PICKUP: &str = r#"
mutation PickupPrepared($input: FulfillmentOrderLineItemsPreparedForPickupInput!) {
  fulfillmentOrderLineItemsPreparedForPickup(input: $input) {
    userErrors { field message }
  }
}"#;

pub(crate) const TAGS_ADD: &str = r#"
mutation PickupTagsAdd($id: ID!, $tags: [String!]!) {
  tagsAdd(id: $id, tags: $tags) {
    node { id }
    userErrors { field message }
  }
}"#;

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<TransportError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TransportError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireUserError {
    #[serde(default)]
    field: Option<Vec<String>>,
    message: String,
}

impl From<WireUserError> for UserError {
    fn from(wire: WireUserError) -> Self {
        UserError {
            field: wire.field.unwrap_or_default(),
            message: wire.message,
        }
    }
}

/// Every mutation payload we issue carries `userErrors`.
#[derive(Debug, Deserialize)]
pub(crate) struct MutationPayload {
    #[serde(default, rename = "userErrors")]
    pub user_errors: Vec<WireUserError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FulfillmentCreateData {
    #[serde(rename = "fulfillmentCreate")]
    pub payload: Option<MutationPayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PreparedForPickupData {
    #[serde(rename = "fulfillmentOrderLineItemsPreparedForPickup")]
    pub payload: Option<MutationPayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TagsAddData {
    #[serde(rename = "tagsAdd")]
    pub payload: Option<MutationPayload>,
}

// ---------------------------------------------------------------------------
// Order query
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct OrderQueryData {
    pub node: Option<OrderNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OrderNode {
    /// Absent when the node exists but is not an order.
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    line_items: Connection<OrderLineNode>,
    #[serde(default)]
    fulfillment_orders: Connection<FulfillmentOrderNode>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub(crate) struct Connection<T> {
    #[serde(default)]
    nodes: Vec<T>,
}

impl<T> Default for Connection<T> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderLineNode {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    quantity: u32,
    #[serde(default)]
    unfulfilled_quantity: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FulfillmentOrderNode {
    id: String,
    status: String,
    #[serde(default)]
    delivery_method: Option<DeliveryMethodNode>,
    #[serde(default)]
    line_items: Connection<FulfillmentLineNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeliveryMethodNode {
    #[serde(default)]
    method_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FulfillmentLineNode {
    id: String,
    #[serde(default)]
    remaining_quantity: u32,
    #[serde(default)]
    total_quantity: u32,
    #[serde(default)]
    line_item: Option<LineTitle>,
}

#[derive(Debug, Deserialize)]
struct LineTitle {
    #[serde(default)]
    title: Option<String>,
}

impl OrderNode {
    /// `None` when the node is not an order.
    pub(crate) fn into_view(self, reference: &TargetOrderReference) -> Option<TargetOrderView> {
        self.id.as_ref()?;
        Some(TargetOrderView {
            reference: reference.clone(),
            name: self.name,
            tags: self.tags,
            line_items: self
                .line_items
                .nodes
                .into_iter()
                .map(|line| OrderLineItem {
                    id: line.id,
                    title: line.title,
                    quantity: line.quantity,
                    unfulfilled_quantity: line.unfulfilled_quantity,
                })
                .collect(),
            fulfillment_orders: self
                .fulfillment_orders
                .nodes
                .into_iter()
                .map(FulfillmentOrderNode::into_domain)
                .collect(),
        })
    }
}

impl FulfillmentOrderNode {
    fn into_domain(self) -> FulfillmentOrder {
        let delivery_method = self
            .delivery_method
            .and_then(|method| method.method_type)
            .map(|value| DeliveryMethod::from_wire(&value))
            .unwrap_or_else(|| DeliveryMethod::Other("NONE".to_string()));
        FulfillmentOrder {
            id: FulfillmentOrderId(self.id),
            status: FulfillmentOrderStatus::from_wire(&self.status),
            delivery_method,
            line_items: self
                .line_items
                .nodes
                .into_iter()
                .map(|line| FulfillmentLineItem {
                    id: line.id,
                    title: line.line_item.and_then(|item| item.title),
                    remaining_quantity: line.remaining_quantity,
                    total_quantity: line.total_quantity,
                })
                .collect(),
        }
    }
}
