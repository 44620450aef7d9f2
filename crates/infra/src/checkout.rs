//! Checkout: reserve stock for a preorder, then record it.
//!
//! The reservation is the commit point for stock. If recording the order
//! fails afterwards, the reservation is released before the error is
//! returned, so stock is not lost to an order that was never stored.

use std::sync::Arc;

use thiserror::Error;
use tracing::instrument;

use storefront_core::DomainError;
use storefront_sales::{NewOrder, OrderRecord};

use crate::document_store::DocumentStore;
use crate::order_ledger::{OrderLedger, OrderLedgerError};
use crate::reservation::{ReservationResult, Reserve};
use crate::stock_ledger::LedgerError;

#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The request itself is malformed (missing contact fields etc.).
    #[error("checkout request rejected: {0}")]
    Rejected(#[from] DomainError),

    #[error("stock ledger failure: {0}")]
    Ledger(#[from] LedgerError),

    /// The order could not be stored. `release_failed` is set when giving the
    /// reserved stock back failed too; that stock is then still decremented.
    #[error("order ledger failure: {source}")]
    Orders {
        source: OrderLedgerError,
        release_failed: Option<LedgerError>,
    },
}

/// Result of a well-formed checkout request.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutOutcome {
    /// Stock reserved and order stored.
    Placed(OrderRecord),
    /// Stock did not cover the payload; nothing was changed.
    Rejected(ReservationResult),
}

impl CheckoutOutcome {
    pub fn is_placed(&self) -> bool {
        matches!(self, CheckoutOutcome::Placed(_))
    }

    /// The checkout contract's `{ ok, error? }` view of this outcome.
    pub fn reservation(&self) -> ReservationResult {
        match self {
            CheckoutOutcome::Placed(_) => ReservationResult::reserved(),
            CheckoutOutcome::Rejected(result) => result.clone(),
        }
    }
}

pub struct Checkout<R, S> {
    reservations: R,
    orders: Arc<OrderLedger<S>>,
}

impl<R, S> Checkout<R, S>
where
    R: Reserve,
    S: DocumentStore,
{
    pub fn new(reservations: R, orders: Arc<OrderLedger<S>>) -> Self {
        Self { reservations, orders }
    }

    pub fn orders(&self) -> &Arc<OrderLedger<S>> {
        &self.orders
    }

    #[instrument(skip_all, fields(items = request.payload.items.len()), err)]
    pub async fn place_order(&self, request: NewOrder) -> Result<CheckoutOutcome, CheckoutError> {
        let order = request.validated()?;

        let reservation = self.reservations.reserve(&order.payload).await?;
        if !reservation.ok {
            return Ok(CheckoutOutcome::Rejected(reservation));
        }

        let payload = order.payload.clone();
        match self.orders.add(order).await {
            Ok(record) => Ok(CheckoutOutcome::Placed(record)),
            Err(source) => {
                tracing::error!(error = %source, "order append failed; releasing reservation");
                let release_failed = self.reservations.release(&payload).await.err();
                if let Some(release_err) = &release_failed {
                    tracing::error!(error = %release_err, "releasing reservation failed");
                }
                Err(CheckoutError::Orders {
                    source,
                    release_failed,
                })
            }
        }
    }
}

impl<R, S> std::fmt::Debug for Checkout<R, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checkout").finish_non_exhaustive()
    }
}
