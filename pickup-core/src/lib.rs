//! Pickup core library: domain types, remote-system ports, configuration, errors.
//!
//! Public API surface:
//! - [`types`]: newtypes and the Source/Target order snapshots
//! - [`ports`]: capabilities the reconciliation engine consumes
//! - [`error`]: [`ConfigError`], [`RemoteError`]
//! - [`config`]: `~/.pickup/config.yaml` load / save / init
//! - [`overrides`]: versioned cross-reference override table

pub mod config;
pub mod error;
pub mod overrides;
pub mod ports;
pub mod types;

pub use config::{
    Config, CrossReferenceField, DaemonSettings, ReconcileSettings, SourceSettings,
    TargetSettings, WritebackEndpoint,
};
pub use error::{ConfigError, RemoteError, RemoteSystem, UserError};
pub use overrides::OverrideTable;
pub use ports::{CredentialProvider, SourceSystem, TargetSystem};
pub use types::{
    AccessToken, CrossReferences, DeliveryMethod, FulfillmentLineItem, FulfillmentOrder,
    FulfillmentOrderId, FulfillmentOrderStatus, LineItemQuantity, OrderLineItem, SourceOrder,
    SourceOrderId, StatusCode, StoreId, TargetOrderReference, TargetOrderView,
};
