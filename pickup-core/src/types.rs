//! Domain types for the pickup reconciliation engine.
//!
//! Source-side records ([`SourceOrder`]) are read from the order-management
//! backend; Target-side snapshots ([`TargetOrderView`]) are read fresh from the
//! commerce platform on every attempt and never cached across ticks.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Source-native numeric order identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceOrderId(pub u64);

impl fmt::Display for SourceOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for SourceOrderId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Source-side order status ("situação") code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusCode(pub u64);

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for StatusCode {
    fn from(code: u64) -> Self {
        Self(code)
    }
}

/// Source-side identifier of the store that owns an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreId(pub u64);

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for StoreId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Target-side global identifier of a fulfillment order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FulfillmentOrderId(pub String);

impl fmt::Display for FulfillmentOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for FulfillmentOrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for FulfillmentOrderId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Prefix shared by every Target global order identifier.
pub const TARGET_ORDER_GID_PREFIX: &str = "gid://shopify/Order/";

/// Opaque global identifier of an order in the Target System.
///
/// Built only from a Source cross-reference value (see the resolver in
/// `pickup-sync`); it has no lifecycle of its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetOrderReference(String);

impl TargetOrderReference {
    /// Wrap a Target order id. Values that already are global ids are kept verbatim.
    pub fn from_order_id(raw: &str) -> Self {
        if raw.starts_with("gid://") {
            Self(raw.to_owned())
        } else {
            Self(format!("{TARGET_ORDER_GID_PREFIX}{raw}"))
        }
    }

    /// Accept only a numeric order id or an order global id with a numeric tail.
    ///
    /// Anything else (`#1001`, a product gid, free text) cannot name a Target
    /// order and is rejected before any request is made.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let numeric = raw.strip_prefix(TARGET_ORDER_GID_PREFIX).unwrap_or(raw);
        if numeric.is_empty() || !numeric.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Self(format!("{TARGET_ORDER_GID_PREFIX}{numeric}")))
    }

    pub fn as_gid(&self) -> &str {
        &self.0
    }

    /// Trailing segment of the global id (the platform's numeric order id).
    pub fn order_id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for TargetOrderReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ---------------------------------------------------------------------------
// Source side
// ---------------------------------------------------------------------------

/// Every field the Source System has historically used to point at the
/// Target order. Which one is authoritative is a configuration choice
/// (`CrossReferenceField`), never a fallback chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossReferences {
    /// `numeroLoja`: the store-side order number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_order_number: Option<String>,
    /// `loja.idLojaProduto`: store-scoped numeric id (older API revisions).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_scoped_id: Option<String>,
    /// `numero`: the Source order number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_number: Option<String>,
}

/// An order as the Source System reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceOrder {
    pub id: SourceOrderId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<u64>,
    pub status: StatusCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_id: Option<StoreId>,
    #[serde(default)]
    pub cross_references: CrossReferences,
}

impl SourceOrder {
    /// Human label used in log lines: the order number when known, else the id.
    pub fn label(&self) -> String {
        match self.number {
            Some(number) => format!("#{number}"),
            None => format!("id {}", self.id),
        }
    }
}

// ---------------------------------------------------------------------------
// Target side
// ---------------------------------------------------------------------------

/// Delivery method of a fulfillment order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    Pickup,
    Shipping,
    Local,
    Other(String),
}

impl DeliveryMethod {
    /// Parse the platform's `DeliveryMethodType` value.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "PICK_UP" => DeliveryMethod::Pickup,
            "SHIPPING" => DeliveryMethod::Shipping,
            "LOCAL" => DeliveryMethod::Local,
            other => DeliveryMethod::Other(other.to_owned()),
        }
    }

    pub fn is_pickup(&self) -> bool {
        matches!(self, DeliveryMethod::Pickup)
    }
}

impl fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryMethod::Pickup => write!(f, "pickup"),
            DeliveryMethod::Shipping => write!(f, "shipping"),
            DeliveryMethod::Local => write!(f, "local delivery"),
            DeliveryMethod::Other(other) => write!(f, "{}", other.to_ascii_lowercase()),
        }
    }
}

/// Lifecycle status of a fulfillment order as the platform reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentOrderStatus {
    Open,
    Scheduled,
    InProgress,
    OnHold,
    Incomplete,
    Closed,
    Cancelled,
    Unknown(String),
}

impl FulfillmentOrderStatus {
    pub fn from_wire(value: &str) -> Self {
        match value {
            "OPEN" => FulfillmentOrderStatus::Open,
            "SCHEDULED" => FulfillmentOrderStatus::Scheduled,
            "IN_PROGRESS" => FulfillmentOrderStatus::InProgress,
            "ON_HOLD" => FulfillmentOrderStatus::OnHold,
            "INCOMPLETE" => FulfillmentOrderStatus::Incomplete,
            "CLOSED" => FulfillmentOrderStatus::Closed,
            "CANCELLED" => FulfillmentOrderStatus::Cancelled,
            other => FulfillmentOrderStatus::Unknown(other.to_owned()),
        }
    }
}

impl fmt::Display for FulfillmentOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FulfillmentOrderStatus::Open => write!(f, "OPEN"),
            FulfillmentOrderStatus::Scheduled => write!(f, "SCHEDULED"),
            FulfillmentOrderStatus::InProgress => write!(f, "IN_PROGRESS"),
            FulfillmentOrderStatus::OnHold => write!(f, "ON_HOLD"),
            FulfillmentOrderStatus::Incomplete => write!(f, "INCOMPLETE"),
            FulfillmentOrderStatus::Closed => write!(f, "CLOSED"),
            FulfillmentOrderStatus::Cancelled => write!(f, "CANCELLED"),
            FulfillmentOrderStatus::Unknown(other) => write!(f, "{other}"),
        }
    }
}

/// One line of a fulfillment order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentLineItem {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub remaining_quantity: u32,
    pub total_quantity: u32,
}

/// A fulfillment order attached to a Target order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentOrder {
    pub id: FulfillmentOrderId,
    pub status: FulfillmentOrderStatus,
    pub delivery_method: DeliveryMethod,
    #[serde(default)]
    pub line_items: Vec<FulfillmentLineItem>,
}

impl FulfillmentOrder {
    /// Lines that still have something left to hand over, with that quantity.
    pub fn remaining_lines(&self) -> Vec<LineItemQuantity> {
        self.line_items
            .iter()
            .filter(|line| line.remaining_quantity > 0)
            .map(|line| LineItemQuantity {
                id: line.id.clone(),
                quantity: line.remaining_quantity,
            })
            .collect()
    }
}

/// An order line as the Target order itself lists it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub id: String,
    pub title: String,
    pub quantity: u32,
    pub unfulfilled_quantity: u32,
}

/// Line id plus quantity, the argument shape of both fulfillment mutations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemQuantity {
    pub id: String,
    pub quantity: u32,
}

/// Fresh fulfillment snapshot of a Target order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetOrderView {
    pub reference: TargetOrderReference,
    /// Human-readable order name, e.g. `#1042`.
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub line_items: Vec<OrderLineItem>,
    #[serde(default)]
    pub fulfillment_orders: Vec<FulfillmentOrder>,
}

impl TargetOrderView {
    /// Tag lookup; the platform treats tags case-insensitively.
    pub fn has_tag(&self, tag: &str) -> bool {
        let tag = tag.trim();
        self.tags.iter().any(|t| t.trim().eq_ignore_ascii_case(tag))
    }

    /// Order lines with unfulfilled quantity, used when no fulfillment order exists yet.
    pub fn unfulfilled_lines(&self) -> Vec<LineItemQuantity> {
        self.line_items
            .iter()
            .filter(|line| line.unfulfilled_quantity > 0)
            .map(|line| LineItemQuantity {
                id: line.id.clone(),
                quantity: line.unfulfilled_quantity,
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Bearer token for the Source System.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    secret: String,
    expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(secret: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            secret: secret.into(),
            expires_at,
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
