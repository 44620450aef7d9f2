//! Reservation coordination: all-or-nothing stock decrements for a payload.
//!
//! Both strategies implement [`Reserve`] with the same contract:
//!
//! - if the payload is not fulfillable, nothing changes and the result is
//!   `{ ok: false, error: "Insufficient stock" }`
//! - otherwise every demanded (product, size) is decremented by exactly its
//!   demand, durably, before `{ ok: true }` is returned
//! - a persistence failure is returned as `Err` and leaves stock unchanged
//!
//! Strategies:
//!
//! - [`LockedReservation`]: check and commit under the stock ledger's mutex.
//!   Correct for a single process owning the store.
//! - [`TransactionalReservation`]: check and commit inside
//!   [`DocumentStore::transact`](crate::document_store::DocumentStore::transact).
//!   Correct for several processes sharing a store with real transactions.

pub mod locked;
pub mod transactional;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use storefront_inventory::OrderPayload;

use crate::stock_ledger::LedgerError;

pub use locked::LockedReservation;
pub use transactional::TransactionalReservation;

/// Error message reported when stock does not cover a payload.
pub const INSUFFICIENT_STOCK: &str = "Insufficient stock";

/// Outcome of a reservation attempt.
///
/// Insufficient stock is an expected outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationResult {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReservationResult {
    pub fn reserved() -> Self {
        Self { ok: true, error: None }
    }

    pub fn insufficient_stock() -> Self {
        Self {
            ok: false,
            error: Some(INSUFFICIENT_STOCK.to_string()),
        }
    }
}

/// Atomic reservation of stock for an order payload.
#[async_trait]
pub trait Reserve: Send + Sync {
    /// Verify fulfillability and apply every decrement, or apply none.
    async fn reserve(&self, payload: &OrderPayload) -> Result<ReservationResult, LedgerError>;

    /// Give back stock taken by an earlier successful `reserve` of `payload`.
    async fn release(&self, payload: &OrderPayload) -> Result<(), LedgerError>;
}

#[async_trait]
impl<R> Reserve for Arc<R>
where
    R: Reserve + ?Sized,
{
    async fn reserve(&self, payload: &OrderPayload) -> Result<ReservationResult, LedgerError> {
        (**self).reserve(payload).await
    }

    async fn release(&self, payload: &OrderPayload) -> Result<(), LedgerError> {
        (**self).release(payload).await
    }
}

/// Signed delta that takes `qty` units out of stock.
pub(crate) fn decrement(qty: u64) -> i64 {
    i64::try_from(qty).map(|q| -q).unwrap_or(i64::MIN)
}

/// Signed delta that puts `qty` units back into stock.
pub(crate) fn increment(qty: u64) -> i64 {
    i64::try_from(qty).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn results_serialize_like_the_checkout_contract() {
        assert_eq!(
            serde_json::to_value(ReservationResult::reserved()).unwrap(),
            json!({"ok": true})
        );
        assert_eq!(
            serde_json::to_value(ReservationResult::insufficient_stock()).unwrap(),
            json!({"ok": false, "error": "Insufficient stock"})
        );
    }

    #[test]
    fn deltas_saturate() {
        assert_eq!(decrement(3), -3);
        assert_eq!(decrement(u64::MAX), i64::MIN);
        assert_eq!(increment(u64::MAX), i64::MAX);
    }
}
