//! Append-mostly ledger of accepted preorders.
//!
//! Records live in their own collection, one document per order keyed by a
//! store-assigned UUIDv7. Records are never updated after `add`; only
//! deletion is supported.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::instrument;

use storefront_core::{DomainError, OrderId};
use storefront_sales::{NewOrder, OrderRecord};

use crate::document_store::{DocumentStore, StoreError};

/// Default name of the orders collection.
pub const ORDERS_COLLECTION: &str = "preorders";

#[derive(Debug, Error)]
pub enum OrderLedgerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Order ledger over an injected document store.
#[derive(Debug)]
pub struct OrderLedger<S> {
    store: S,
    collection: String,
    last_created_at: Mutex<Option<DateTime<Utc>>>,
}

impl<S> OrderLedger<S>
where
    S: DocumentStore,
{
    pub fn new(store: S, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
            last_created_at: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Persist an accepted order stamped with the current time.
    ///
    /// Timestamps handed out by one ledger are strictly increasing even when
    /// the wall clock stalls or steps backwards.
    pub async fn add(&self, order: NewOrder) -> Result<OrderRecord, OrderLedgerError> {
        let created_at = self.next_timestamp(Utc::now());
        self.add_at(order, created_at).await
    }

    /// Persist an accepted order with an explicit acceptance time.
    #[instrument(skip(self, order), fields(collection = %self.collection), err)]
    pub async fn add_at(
        &self,
        order: NewOrder,
        created_at: DateTime<Utc>,
    ) -> Result<OrderRecord, OrderLedgerError> {
        // The document never carries the id, so the placeholder is discarded.
        let draft = order.accept(OrderId::new(), created_at);
        let doc = draft.to_document()?;

        let raw_id = self.store.add_generate_id(&self.collection, doc).await?;
        let id: OrderId = raw_id.parse()?;

        tracing::info!(order_id = %id, items = draft.payload().items.len(), "order recorded");
        Ok(OrderRecord { id, ..draft })
    }

    /// Every stored order, newest first. Ties on `createdAt` are broken by id,
    /// also descending.
    ///
    /// Documents that cannot be decoded are logged and skipped.
    #[instrument(skip(self), fields(collection = %self.collection), err)]
    pub async fn list_all(&self) -> Result<Vec<OrderRecord>, OrderLedgerError> {
        let docs = self.store.get_all(&self.collection).await?;

        let mut records: Vec<OrderRecord> = docs
            .iter()
            .filter_map(|(raw_id, doc)| {
                let decoded = raw_id
                    .parse::<OrderId>()
                    .and_then(|id| OrderRecord::from_document(id, doc));
                match decoded {
                    Ok(record) => Some(record),
                    Err(e) => {
                        tracing::warn!(order_id = %raw_id, error = %e, "skipping unreadable order");
                        None
                    }
                }
            })
            .collect();

        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(records)
    }

    pub async fn get(&self, id: OrderId) -> Result<Option<OrderRecord>, OrderLedgerError> {
        let Some(doc) = self
            .store
            .get_by_id(&self.collection, &id.to_string())
            .await?
        else {
            return Ok(None);
        };
        Ok(Some(OrderRecord::from_document(id, &doc)?))
    }

    /// Remove one order. `false` when no such order existed.
    #[instrument(skip(self), fields(collection = %self.collection), err)]
    pub async fn delete_by_id(&self, id: OrderId) -> Result<bool, OrderLedgerError> {
        let existed = self
            .store
            .delete_by_id(&self.collection, &id.to_string())
            .await?;
        if existed {
            tracing::info!(order_id = %id, "order deleted");
        }
        Ok(existed)
    }

    /// Remove every order in one durable operation.
    #[instrument(skip(self), fields(collection = %self.collection), err)]
    pub async fn clear(&self) -> Result<(), OrderLedgerError> {
        self.store.delete_all(&self.collection).await?;
        tracing::info!("orders cleared");
        Ok(())
    }

    fn next_timestamp(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let mut last = self
            .last_created_at
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let next = match *last {
            Some(prev) if now <= prev => prev + Duration::microseconds(1),
            _ => now,
        };
        *last = Some(next);
        next
    }
}
