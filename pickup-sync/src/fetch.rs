//! SourceOrderFetcher: candidate discovery.
//!
//! The list call already asks for the candidate status, but the result is
//! filtered again locally by status and store: the upstream filter parameter
//! has not been stable across API revisions. This costs O(listed orders) per
//! tick, which is fine at current volume.

use pickup_core::{AccessToken, RemoteError, SourceOrder, SourceSystem, StatusCode, StoreId};

pub struct SourceOrderFetcher<'a> {
    source: &'a dyn SourceSystem,
    status: StatusCode,
    store: Option<StoreId>,
}

impl<'a> SourceOrderFetcher<'a> {
    pub fn new(source: &'a dyn SourceSystem, status: StatusCode, store: Option<StoreId>) -> Self {
        Self {
            source,
            status,
            store,
        }
    }

    /// Candidates for this tick. An empty list is a success.
    pub fn fetch(&self, token: &AccessToken) -> Result<Vec<SourceOrder>, RemoteError> {
        let listed = self.source.list_orders(token, self.status)?;
        let total = listed.len();
        let candidates = filter_candidates(listed, self.status, self.store);
        tracing::debug!(
            listed = total,
            candidates = candidates.len(),
            "source candidates fetched"
        );
        Ok(candidates)
    }
}

/// Keep orders in `status`, and in `store` when one is configured.
pub fn filter_candidates(
    orders: Vec<SourceOrder>,
    status: StatusCode,
    store: Option<StoreId>,
) -> Vec<SourceOrder> {
    orders
        .into_iter()
        .filter(|order| order.status == status)
        .filter(|order| match store {
            Some(store) => order.store_id == Some(store),
            None => true,
        })
        .collect()
}
