//! Capabilities the reconciliation engine consumes.
//!
//! Implementations live in `pickup-remote` (HTTP adapters) and in test fakes.
//! All calls are blocking; each one is a suspension point of a tick and must
//! carry a bounded timeout in production implementations.

use crate::error::RemoteError;
use crate::types::{
    AccessToken, FulfillmentOrderId, LineItemQuantity, SourceOrder, SourceOrderId, StatusCode,
    TargetOrderReference, TargetOrderView,
};

/// Supplies the bearer token for the Source System.
pub trait CredentialProvider: Send + Sync {
    /// `None` means "not authorized yet" (or the token expired); the tick aborts.
    fn token(&self) -> Option<AccessToken>;
}

/// Order-management backend.
pub trait SourceSystem: Send + Sync {
    /// Orders the backend lists for `status`. An empty list is a success.
    fn list_orders(
        &self,
        token: &AccessToken,
        status: StatusCode,
    ) -> Result<Vec<SourceOrder>, RemoteError>;

    fn get_order(
        &self,
        token: &AccessToken,
        id: SourceOrderId,
    ) -> Result<SourceOrder, RemoteError>;

    /// Write the terminal status code back to an order.
    fn write_status(
        &self,
        token: &AccessToken,
        id: SourceOrderId,
        status: StatusCode,
    ) -> Result<(), RemoteError>;
}

/// Commerce platform.
pub trait TargetSystem: Send + Sync {
    /// Fresh fulfillment snapshot; `RemoteError::NotFound` when the reference is stale.
    fn load_order(&self, reference: &TargetOrderReference) -> Result<TargetOrderView, RemoteError>;

    /// Create a local-pickup fulfillment for order lines that have none yet.
    fn create_pickup_fulfillment(
        &self,
        view: &TargetOrderView,
        lines: &[LineItemQuantity],
    ) -> Result<(), RemoteError>;

    /// Mark fulfillment-order lines as prepared for customer pickup.
    fn prepare_for_pickup(
        &self,
        fulfillment_order: &FulfillmentOrderId,
        lines: &[LineItemQuantity],
    ) -> Result<(), RemoteError>;

    fn add_tags(&self, reference: &TargetOrderReference, tags: &[String]) -> Result<(), RemoteError>;
}
