use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use storefront_inventory::{Demand, OrderPayload};

use crate::document_store::DocumentStore;
use crate::stock_ledger::{LedgerError, StockLedger};

use super::{ReservationResult, Reserve, decrement, increment};

/// Single-process reservation: the fulfillment check, the decrements and the
/// persist all happen while holding the stock ledger's mutex, so no other
/// reservation in this process can observe or change stock in between.
///
/// Not safe when another process writes the same store; use
/// [`TransactionalReservation`](super::TransactionalReservation) there.
#[derive(Debug)]
pub struct LockedReservation<S> {
    ledger: Arc<StockLedger<S>>,
}

impl<S> LockedReservation<S> {
    pub fn new(ledger: Arc<StockLedger<S>>) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &Arc<StockLedger<S>> {
        &self.ledger
    }
}

#[async_trait]
impl<S> Reserve for LockedReservation<S>
where
    S: DocumentStore,
{
    #[instrument(skip_all, fields(items = payload.items.len()), err)]
    async fn reserve(&self, payload: &OrderPayload) -> Result<ReservationResult, LedgerError> {
        let demand = Demand::from_payload(payload);
        let mut table = self.ledger.lock().await;

        if !demand.is_satisfied_by(&*table) {
            let shortfalls = demand.shortfalls(&*table);
            tracing::info!(?shortfalls, "reservation rejected");
            return Ok(ReservationResult::insufficient_stock());
        }
        if demand.is_empty() {
            return Ok(ReservationResult::reserved());
        }

        let mut staged = table.subset(demand.products());
        for item in &payload.items {
            let qty = item.demand();
            if qty == 0 {
                continue;
            }
            if !staged.adjust(&item.product_id, &item.size, decrement(qty)) {
                tracing::debug!(
                    product_id = %item.product_id,
                    size = %item.size,
                    "skipping line with unknown size"
                );
            }
        }

        self.ledger.persist(&staged).await?;
        table.absorb(staged);
        tracing::info!(products = demand.products().len(), "reservation committed");
        Ok(ReservationResult::reserved())
    }

    #[instrument(skip_all, fields(items = payload.items.len()), err)]
    async fn release(&self, payload: &OrderPayload) -> Result<(), LedgerError> {
        let demand = Demand::from_payload(payload);
        if demand.is_empty() {
            return Ok(());
        }

        let mut table = self.ledger.lock().await;
        let mut staged = table.subset(demand.products());
        for (product_id, size, qty) in demand.iter() {
            staged.adjust(product_id, size.as_str(), increment(qty));
        }

        self.ledger.persist(&staged).await?;
        table.absorb(staged);
        tracing::info!("reservation released");
        Ok(())
    }
}
