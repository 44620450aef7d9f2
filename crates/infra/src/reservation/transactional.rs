use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use storefront_core::ProductId;
use storefront_inventory::{Demand, OrderPayload, StockRecord, StockTable};

use crate::document_store::{DocumentMap, DocumentStore, TransactionFn};
use crate::stock_ledger::{LedgerError, StockLedger};

use super::{ReservationResult, Reserve, decrement, increment};

/// Multi-process reservation: the check and the decrements run inside the
/// store's own transaction against the durable records, never against this
/// process's cached snapshot. After a commit the local ledger re-reads the
/// touched products so its snapshot follows.
#[derive(Debug)]
pub struct TransactionalReservation<S> {
    ledger: Arc<StockLedger<S>>,
}

impl<S> TransactionalReservation<S> {
    pub fn new(ledger: Arc<StockLedger<S>>) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &Arc<StockLedger<S>> {
        &self.ledger
    }
}

impl<S> TransactionalReservation<S>
where
    S: DocumentStore,
{
    /// Run `apply` in a store transaction over the demanded products.
    ///
    /// Once the store has committed, the outcome is final: a failure to
    /// refresh the local snapshot afterwards only marks it stale.
    async fn run(&self, demand: &Demand, apply: TransactionFn<'_>) -> Result<bool, LedgerError> {
        let ids: Vec<String> = demand.products().into_iter().map(|id| id.to_string()).collect();
        let committed = self
            .ledger
            .store()
            .transact(self.ledger.collection(), &ids, apply)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "stock transaction failed");
                LedgerError::Store(e)
            })?;

        if committed {
            if let Err(e) = self.ledger.refresh(demand.products()).await {
                tracing::warn!(error = %e, "stock snapshot refresh failed after commit");
                self.ledger.mark_stale();
            }
        }
        Ok(committed)
    }
}

fn table_from(docs: &DocumentMap) -> StockTable {
    docs.iter()
        .map(|(id, doc)| (ProductId::new(id.clone()), StockRecord::from_document(doc)))
        .collect()
}

fn write_back(table: &StockTable, docs: &mut DocumentMap) {
    for (id, record) in table.iter() {
        docs.insert(id.to_string(), record.to_document());
    }
}

#[async_trait]
impl<S> Reserve for TransactionalReservation<S>
where
    S: DocumentStore,
{
    #[instrument(skip_all, fields(items = payload.items.len()), err)]
    async fn reserve(&self, payload: &OrderPayload) -> Result<ReservationResult, LedgerError> {
        let demand = Demand::from_payload(payload);
        if demand.is_empty() {
            return Ok(ReservationResult::reserved());
        }

        let apply: TransactionFn<'_> = Box::new(|docs: &mut DocumentMap| {
            let mut table = table_from(docs);
            if !demand.is_satisfied_by(&table) {
                return false;
            }
            for (product_id, size, qty) in demand.iter() {
                table.adjust(product_id, size.as_str(), decrement(qty));
            }
            write_back(&table, docs);
            true
        });

        if self.run(&demand, apply).await? {
            tracing::info!(products = demand.products().len(), "reservation committed");
            Ok(ReservationResult::reserved())
        } else {
            tracing::info!("reservation rejected");
            Ok(ReservationResult::insufficient_stock())
        }
    }

    #[instrument(skip_all, fields(items = payload.items.len()), err)]
    async fn release(&self, payload: &OrderPayload) -> Result<(), LedgerError> {
        let demand = Demand::from_payload(payload);
        if demand.is_empty() {
            return Ok(());
        }

        let apply: TransactionFn<'_> = Box::new(|docs: &mut DocumentMap| {
            let mut table = table_from(docs);
            for (product_id, size, qty) in demand.iter() {
                table.adjust(product_id, size.as_str(), increment(qty));
            }
            write_back(&table, docs);
            true
        });

        self.run(&demand, apply).await?;
        tracing::info!("reservation released");
        Ok(())
    }
}
