//! Commerce platform GraphQL adapter.
//!
//! Every call can fail three ways: transport (network, HTTP status, top-level
//! `errors`), decode, or business rule (`userErrors` inside a 200 response).
//! All three are checked on every call.

use std::fmt;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use pickup_core::{
    FulfillmentOrderId, LineItemQuantity, RemoteError, RemoteSystem, TargetOrderReference,
    TargetOrderView, TargetSettings, TargetSystem, UserError,
};

use crate::graphql::{
    Envelope, FulfillmentCreateData, MutationPayload, OrderQueryData, PreparedForPickupData,
    TagsAddData, FULFILLMENT_CREATE, ORDER_QUERY, PREPARED_FOR_PICKUP, TAGS_ADD,
};
use crate::http::{build_agent, decode_err, map_ureq_error};

const SYSTEM: RemoteSystem = RemoteSystem::Target;

/// GraphQL client authenticated with a static admin access token.
pub struct TargetClient {
    agent: ureq::Agent,
    settings: TargetSettings,
    access_token: String,
}

impl TargetClient {
    pub fn new(settings: TargetSettings, access_token: impl Into<String>, timeout: Duration) -> Self {
        Self {
            agent: build_agent(timeout),
            settings,
            access_token: access_token.into(),
        }
    }

    /// Run one document and return its `data`, failing on transport-level errors.
    fn execute<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T, RemoteError> {
        let response = self
            .agent
            .post(&self.settings.graphql_url)
            .set("X-Shopify-Access-Token", &self.access_token)
            .set("Accept", "application/json")
            .send_json(json!({ "query": query, "variables": variables }))
            .map_err(|e| map_ureq_error(SYSTEM, e))?;
        let envelope: Envelope<T> = response
            .into_json()
            .map_err(|e| decode_err(SYSTEM, e))?;

        if !envelope.errors.is_empty() {
            let message = envelope
                .errors
                .into_iter()
                .map(|err| err.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(RemoteError::Transport {
                system: SYSTEM,
                message,
            });
        }
        envelope
            .data
            .ok_or_else(|| decode_err(SYSTEM, "response carried neither data nor errors"))
    }

    fn mutate(
        &self,
        operation: &'static str,
        payload: Option<MutationPayload>,
    ) -> Result<(), RemoteError> {
        let Some(payload) = payload else {
            return Err(decode_err(SYSTEM, format!("{operation} returned no payload")));
        };
        if payload.user_errors.is_empty() {
            return Ok(());
        }
        let errors: Vec<UserError> = payload.user_errors.into_iter().map(Into::into).collect();
        Err(RemoteError::BusinessRule { operation, errors })
    }
}

impl fmt::Debug for TargetClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetClient")
            .field("graphql_url", &self.settings.graphql_url)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

impl TargetSystem for TargetClient {
    fn load_order(&self, reference: &TargetOrderReference) -> Result<TargetOrderView, RemoteError> {
        let data: OrderQueryData =
            self.execute(ORDER_QUERY, json!({ "id": reference.as_gid() }))?;
        data.node
            .and_then(|node| node.into_view(reference))
            .ok_or_else(|| RemoteError::NotFound {
                system: SYSTEM,
                what: format!("order {reference}"),
            })
    }

    fn create_pickup_fulfillment(
        &self,
        view: &TargetOrderView,
        lines: &[LineItemQuantity],
    ) -> Result<(), RemoteError> {
        let mut input = json!({
            "orderId": view.reference.as_gid(),
            "lineItems": lines,
            "notifyCustomer": self.settings.notify_customer,
            "trackingCompany": self.settings.pickup_tracking_company,
            "trackingNumbers": [format!("PICKUP-{}", view.name)],
        });
        if let Some(location) = &self.settings.pickup_location_id {
            input["locationId"] = json!(location);
        }
        let variables = json!({ "input": input });
        let data: FulfillmentCreateData = self.execute(FULFILLMENT_CREATE, variables)?;
        self.mutate("fulfillmentCreate", data.payload)
    }

    fn prepare_for_pickup(
        &self,
        fulfillment_order: &FulfillmentOrderId,
        lines: &[LineItemQuantity],
    ) -> Result<(), RemoteError> {
        let variables = json!({
            "input": {
                "lineItemsByFulfillmentOrder": [{
                    "fulfillmentOrderId": fulfillment_order.0,
                    "fulfillmentOrderLineItems": lines,
                }]
            }
        });
        let data: PreparedForPickupData = self.execute(PREPARED_FOR_PICKUP, variables)?;
        self.mutate("fulfillmentOrderLineItemsPreparedForPickup", data.payload)
    }

    fn add_tags(&self, reference: &TargetOrderReference, tags: &[String]) -> Result<(), RemoteError> {
        let data: TagsAddData =
            self.execute(TAGS_ADD, json!({ "id": reference.as_gid(), "tags": tags }))?;
        self.mutate("tagsAdd", data.payload)
    }
}
