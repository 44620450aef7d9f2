//! Write-through stock ledger.
//!
//! Owns this process's product → [`StockRecord`] snapshot. Admin mutations
//! (`set`, `adjust`) read the stored record inside
//! [`DocumentStore::transact`] and write the result back in the same
//! transaction, so a decrement committed by another process is never
//! overwritten from a stale snapshot. The committed record is published to the
//! in-memory table only after the store accepted it; a failed write leaves
//! both memory and storage at the pre-call state.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tracing::instrument;

use storefront_core::ProductId;
use storefront_inventory::{
    OrderPayload, ProposedStock, SizeKey, StockRecord, StockTable, is_fulfillable,
};

use crate::document_store::{DocumentMap, DocumentStore, StoreError, TransactionFn};

/// Default name of the stock collection.
pub const STOCK_COLLECTION: &str = "stock";

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Stock ledger over an injected document store.
#[derive(Debug)]
pub struct StockLedger<S> {
    store: S,
    collection: String,
    table: Mutex<StockTable>,
    stale: AtomicBool,
}

impl<S> StockLedger<S>
where
    S: DocumentStore,
{
    /// Load the durable snapshot from `collection`.
    #[instrument(skip_all, fields(collection = %collection.as_ref()), err)]
    pub async fn open(store: S, collection: impl AsRef<str>) -> Result<Self, LedgerError> {
        let collection = collection.as_ref().to_string();
        let table = load_table(&store, &collection).await?;
        tracing::debug!(products = table.len(), "stock ledger loaded");
        Ok(Self {
            store,
            collection,
            table: Mutex::new(table),
            stale: AtomicBool::new(false),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Current record for a product; unknown products read as all-zero.
    ///
    /// Never fails and never writes.
    pub async fn get(&self, product_id: &ProductId) -> StockRecord {
        self.lock().await.get(product_id)
    }

    /// All known records, sorted by product identifier.
    pub async fn list(&self) -> Vec<(ProductId, StockRecord)> {
        let table = self.lock().await;
        let mut out: Vec<_> = table.iter().map(|(id, r)| (id.clone(), *r)).collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Replace a product's record. Each present field is normalized; absent
    /// fields keep their stored value.
    #[instrument(skip(self, proposed), fields(product_id = %product_id), err)]
    pub async fn set(
        &self,
        product_id: &ProductId,
        proposed: &ProposedStock,
    ) -> Result<StockRecord, LedgerError> {
        let next = self
            .update_stored(product_id, |stored| stored.merged(proposed))
            .await?;
        tracing::info!(?next, "stock record set");
        Ok(next)
    }

    /// `stored[size] = max(0, stored[size] + delta)`.
    ///
    /// Returns `Ok(false)` and writes nothing when `size` is not a known key.
    #[instrument(skip(self), fields(product_id = %product_id), err)]
    pub async fn adjust(
        &self,
        product_id: &ProductId,
        size: &str,
        delta: i64,
    ) -> Result<bool, LedgerError> {
        let Some(size) = SizeKey::parse(size) else {
            tracing::debug!(size, "ignoring adjustment for unknown size");
            return Ok(false);
        };
        self.update_stored(product_id, |stored| stored.adjusted(size, delta))
            .await?;
        Ok(true)
    }

    /// Delete a product's record (e.g. on product removal).
    #[instrument(skip(self), fields(product_id = %product_id), err)]
    pub async fn remove(&self, product_id: &ProductId) -> Result<bool, LedgerError> {
        let mut table = self.lock().await;
        let existed = self
            .store
            .delete_by_id(&self.collection, product_id.as_str())
            .await?;
        table.remove(product_id);
        Ok(existed)
    }

    /// Read-only fulfillability check against the current snapshot.
    pub async fn is_fulfillable(&self, payload: &OrderPayload) -> bool {
        let table = self.lock().await;
        is_fulfillable(&*table, payload)
    }

    /// Re-read the whole durable snapshot, replacing the in-memory table.
    pub async fn reload(&self) -> Result<(), LedgerError> {
        let mut table = self.table.lock().await;
        *table = load_table(&self.store, &self.collection).await?;
        self.stale.store(false, Ordering::Release);
        Ok(())
    }

    /// Re-read selected products from storage (after an external commit).
    ///
    /// Reads happen under the table mutex so a concurrent local commit cannot
    /// be overwritten by an older stored record.
    pub async fn refresh<'a>(
        &self,
        product_ids: impl IntoIterator<Item = &'a ProductId>,
    ) -> Result<(), LedgerError> {
        let ids: BTreeSet<&ProductId> = product_ids.into_iter().collect();
        let mut table = self.table.lock().await;
        for id in ids {
            match self.store.get_by_id(&self.collection, id.as_str()).await? {
                Some(doc) => table.insert(id.clone(), StockRecord::from_document(&doc)),
                None => {
                    table.remove(id);
                }
            }
        }
        Ok(())
    }

    /// Flag the snapshot as behind storage; the next access reloads it.
    pub(crate) fn mark_stale(&self) {
        self.stale.store(true, Ordering::Release);
    }

    /// Exclusive access to the in-memory table for check-then-commit
    /// sequences. A stale snapshot is reloaded first when storage allows.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, StockTable> {
        let mut table = self.table.lock().await;
        if self.stale.load(Ordering::Acquire) {
            match load_table(&self.store, &self.collection).await {
                Ok(fresh) => {
                    *table = fresh;
                    self.stale.store(false, Ordering::Release);
                }
                Err(e) => tracing::warn!(error = %e, "stock snapshot still stale"),
            }
        }
        table
    }

    /// Durably write every record in `staged` as one batch.
    pub(crate) async fn persist(&self, staged: &StockTable) -> Result<(), LedgerError> {
        if staged.is_empty() {
            return Ok(());
        }
        let documents = staged
            .iter()
            .map(|(id, record)| (id.to_string(), record.to_document()))
            .collect();
        self.store
            .set_merge_many(&self.collection, documents)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, collection = %self.collection, "stock persist failed");
                LedgerError::Store(e)
            })
    }

    /// Read-modify-write one product's stored record inside the store's
    /// transaction, then publish the committed record.
    async fn update_stored<F>(
        &self,
        product_id: &ProductId,
        change: F,
    ) -> Result<StockRecord, LedgerError>
    where
        F: FnOnce(StockRecord) -> StockRecord + Send,
    {
        let mut table = self.lock().await;
        let id = product_id.to_string();
        let mut committed = None;

        let apply: TransactionFn<'_> = Box::new(|docs: &mut DocumentMap| {
            let stored = docs
                .get(&id)
                .map(StockRecord::from_document)
                .unwrap_or_default();
            let next = change(stored);
            docs.insert(id.clone(), next.to_document());
            committed = Some(next);
            true
        });

        self.store
            .transact(&self.collection, std::slice::from_ref(&id), apply)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, collection = %self.collection, "stock write failed");
                LedgerError::Store(e)
            })?;

        let next = committed.unwrap_or_else(|| table.get(product_id));
        table.insert(product_id.clone(), next);
        Ok(next)
    }
}

async fn load_table<S: DocumentStore>(
    store: &S,
    collection: &str,
) -> Result<StockTable, LedgerError> {
    let docs = store.get_all(collection).await?;
    Ok(docs
        .into_iter()
        .map(|(id, doc)| (ProductId::new(id), StockRecord::from_document(&doc)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;
    use storefront_inventory::SizeKey;

    use crate::document_store::InMemoryDocumentStore;
    use crate::document_store::testing::FlakyStore;

    fn shirt() -> ProductId {
        ProductId::new("shirt")
    }

    async fn ledger() -> StockLedger<Arc<InMemoryDocumentStore>> {
        StockLedger::open(Arc::new(InMemoryDocumentStore::new()), STOCK_COLLECTION)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn get_unknown_product_is_zero_and_has_no_side_effect() {
        let ledger = ledger().await;

        assert_eq!(ledger.get(&shirt()).await, StockRecord::empty());
        assert_eq!(ledger.get(&shirt()).await, StockRecord::empty());
        assert!(ledger.list().await.is_empty());
        assert!(ledger.store().get_all(STOCK_COLLECTION).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_preserves_untouched_sizes_and_persists() {
        let ledger = ledger().await;
        let full = ProposedStock::new()
            .with(SizeKey::S, 1)
            .with(SizeKey::M, 2)
            .with(SizeKey::L, 3)
            .with(SizeKey::XL, 4);
        ledger.set(&shirt(), &full).await.unwrap();

        let next = ledger
            .set(&shirt(), &ProposedStock::new().with(SizeKey::S, 5))
            .await
            .unwrap();

        assert_eq!(next, StockRecord::new(5, 2, 3, 4));
        let stored = ledger.store().get_by_id(STOCK_COLLECTION, "shirt").await.unwrap().unwrap();
        assert_eq!(serde_json::Value::Object(stored), json!({"S": 5, "M": 2, "L": 3, "XL": 4}));
    }

    #[tokio::test]
    async fn set_clamps_malformed_input() {
        let ledger = ledger().await;
        let next = ledger
            .set(
                &shirt(),
                &ProposedStock::new().with(SizeKey::S, -3).with(SizeKey::M, "4.8"),
            )
            .await
            .unwrap();
        assert_eq!(next, StockRecord::new(0, 4, 0, 0));
    }

    #[tokio::test]
    async fn adjust_floors_at_zero_and_ignores_unknown_sizes() {
        let ledger = ledger().await;
        ledger.set(&shirt(), &ProposedStock::new().with(SizeKey::L, 2)).await.unwrap();

        assert!(ledger.adjust(&shirt(), "L", -5).await.unwrap());
        assert_eq!(ledger.get(&shirt()).await.get(SizeKey::L), 0);

        assert!(!ledger.adjust(&shirt(), "XXL", 5).await.unwrap());
        assert_eq!(ledger.get(&shirt()).await, StockRecord::empty());
    }

    #[tokio::test]
    async fn reopen_sees_committed_state() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let ledger = StockLedger::open(store.clone(), STOCK_COLLECTION).await.unwrap();
        ledger.set(&shirt(), &ProposedStock::new().with(SizeKey::M, 7)).await.unwrap();
        drop(ledger);

        let reopened = StockLedger::open(store, STOCK_COLLECTION).await.unwrap();
        assert_eq!(reopened.get(&shirt()).await.get(SizeKey::M), 7);
    }

    #[tokio::test]
    async fn failed_persist_leaves_memory_untouched() {
        let store = Arc::new(FlakyStore::new());
        let ledger = StockLedger::open(store.clone(), STOCK_COLLECTION).await.unwrap();
        ledger.set(&shirt(), &ProposedStock::new().with(SizeKey::S, 3)).await.unwrap();

        store.fail_writes(true);
        let err = ledger.adjust(&shirt(), "S", -1).await.unwrap_err();
        assert!(matches!(err, LedgerError::Store(_)));
        let err = ledger
            .set(&shirt(), &ProposedStock::new().with(SizeKey::S, 9))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Store(_)));

        assert_eq!(ledger.get(&shirt()).await.get(SizeKey::S), 3);
        store.fail_writes(false);
        ledger.reload().await.unwrap();
        assert_eq!(ledger.get(&shirt()).await.get(SizeKey::S), 3);
    }

    #[tokio::test]
    async fn remove_deletes_record() {
        let ledger = ledger().await;
        ledger.set(&shirt(), &ProposedStock::new().with(SizeKey::S, 1)).await.unwrap();

        assert!(ledger.remove(&shirt()).await.unwrap());
        assert!(!ledger.remove(&shirt()).await.unwrap());
        assert_eq!(ledger.get(&shirt()).await, StockRecord::empty());
    }

    #[tokio::test]
    async fn refresh_picks_up_external_writes() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let ledger = StockLedger::open(store.clone(), STOCK_COLLECTION).await.unwrap();

        store
            .set_merge(STOCK_COLLECTION, "shirt", StockRecord::new(0, 0, 6, 0).to_document())
            .await
            .unwrap();
        assert_eq!(ledger.get(&shirt()).await, StockRecord::empty());

        ledger.refresh([&shirt()]).await.unwrap();
        assert_eq!(ledger.get(&shirt()).await.get(SizeKey::L), 6);
    }

    #[tokio::test]
    async fn admin_writes_never_resurrect_units_sold_elsewhere() {
        use storefront_inventory::{OrderLineItem, OrderPayload};

        use crate::reservation::{Reserve, TransactionalReservation};

        let store = Arc::new(InMemoryDocumentStore::new());
        let ours = Arc::new(StockLedger::open(store.clone(), STOCK_COLLECTION).await.unwrap());
        ours.set(&shirt(), &ProposedStock::new().with(SizeKey::S, 1).with(SizeKey::M, 1))
            .await
            .unwrap();
        let theirs = StockLedger::open(store.clone(), STOCK_COLLECTION).await.unwrap();

        let sold = TransactionalReservation::new(ours.clone())
            .reserve(&OrderPayload::new(vec![OrderLineItem::new("shirt", "M", 1)], 0.0))
            .await
            .unwrap();
        assert!(sold.ok);

        let next = theirs
            .set(&shirt(), &ProposedStock::new().with(SizeKey::S, 5))
            .await
            .unwrap();
        assert_eq!(next, StockRecord::new(5, 0, 0, 0));

        assert!(theirs.adjust(&shirt(), "S", 1).await.unwrap());
        let stored = store.get_by_id(STOCK_COLLECTION, "shirt").await.unwrap().unwrap();
        assert_eq!(StockRecord::from_document(&stored), StockRecord::new(6, 0, 0, 0));
        assert_eq!(theirs.get(&shirt()).await, StockRecord::new(6, 0, 0, 0));
    }

    #[tokio::test]
    async fn stale_snapshot_reloads_on_next_access() {
        let store = Arc::new(FlakyStore::new());
        let ledger = StockLedger::open(store.clone(), STOCK_COLLECTION).await.unwrap();
        store
            .set_merge(STOCK_COLLECTION, "shirt", StockRecord::new(0, 3, 0, 0).to_document())
            .await
            .unwrap();

        ledger.mark_stale();
        store.fail_reads(true);
        assert_eq!(ledger.get(&shirt()).await, StockRecord::empty());

        store.fail_reads(false);
        assert_eq!(ledger.get(&shirt()).await.get(SizeKey::M), 3);
    }
}
