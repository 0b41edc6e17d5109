//! Source order → Target order reference.
//!
//! The mapping is a pure function of one configured cross-reference field and
//! the override table:
//!
//! 1. Read the configured field (and only that field). Empty → unresolved.
//! 2. If the value has an override entry, use the override.
//! 3. Otherwise use the raw value verbatim.
//! 4. The chosen value must be a numeric order id or an order global id;
//!    anything else is unresolved without a request to the Target System.

use serde::{Deserialize, Serialize};

use pickup_core::{CrossReferenceField, OverrideTable, SourceOrder, TargetOrderReference};

use crate::outcome::SkipReason;

/// A successful resolution, with enough detail to explain it in logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedReference {
    /// Raw value read from the Source order.
    pub cross_reference: String,
    pub reference: TargetOrderReference,
    /// `true` when the override table replaced the raw value.
    pub overridden: bool,
}

/// Why an order has no Target reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "unresolved", rename_all = "snake_case")]
pub enum Unresolved {
    /// The configured field is empty.
    Missing,
    /// The value (raw or overridden) cannot name a Target order.
    Malformed { cross_reference: String, value: String },
}

impl Unresolved {
    pub fn skip_reason(&self) -> SkipReason {
        match self {
            Unresolved::Missing => SkipReason::NoCrossReference,
            Unresolved::Malformed { .. } => SkipReason::MalformedReference,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IdentifierResolver {
    field: CrossReferenceField,
    overrides: OverrideTable,
}

impl IdentifierResolver {
    pub fn new(field: CrossReferenceField, overrides: OverrideTable) -> Self {
        Self { field, overrides }
    }

    pub fn field(&self) -> CrossReferenceField {
        self.field
    }

    pub fn overrides(&self) -> &OverrideTable {
        &self.overrides
    }

    /// The configured cross-reference value, trimmed. Blank counts as absent.
    pub fn cross_reference<'a>(&self, order: &'a SourceOrder) -> Option<&'a str> {
        let refs = &order.cross_references;
        let value = match self.field {
            CrossReferenceField::StoreOrderNumber => refs.store_order_number.as_deref(),
            CrossReferenceField::StoreScopedId => refs.store_scoped_id.as_deref(),
            CrossReferenceField::OrderNumber => refs.order_number.as_deref(),
        }?;
        let value = value.trim();
        (!value.is_empty()).then_some(value)
    }

    /// An error means the order is skipped; no other field is consulted.
    pub fn resolve(&self, order: &SourceOrder) -> Result<ResolvedReference, Unresolved> {
        let raw = self.cross_reference(order).ok_or(Unresolved::Missing)?;
        let (target_id, overridden) = match self.overrides.get(raw) {
            Some(corrected) => (corrected, true),
            None => (raw, false),
        };
        let reference =
            TargetOrderReference::parse(target_id).ok_or_else(|| Unresolved::Malformed {
                cross_reference: raw.to_owned(),
                value: target_id.to_owned(),
            })?;
        Ok(ResolvedReference {
            cross_reference: raw.to_owned(),
            reference,
            overridden,
        })
    }
}
