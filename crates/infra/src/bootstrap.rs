//! Wiring: config → store → ledgers → reservation strategy → checkout.

use std::sync::Arc;

use thiserror::Error;
use tracing::instrument;

use crate::checkout::Checkout;
use crate::config::{Backend, Concurrency, StoreConfig};
use crate::document_store::{
    DocumentStore, InMemoryDocumentStore, JsonFileDocumentStore, PostgresDocumentStore, StoreError,
};
use crate::order_ledger::OrderLedger;
use crate::reservation::{LockedReservation, Reserve, TransactionalReservation};
use crate::stock_ledger::{LedgerError, StockLedger};

pub type SharedStore = Arc<dyn DocumentStore>;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// A fully wired storefront backend.
pub struct Storefront {
    pub stock: Arc<StockLedger<SharedStore>>,
    pub orders: Arc<OrderLedger<SharedStore>>,
    pub reservations: Arc<dyn Reserve>,
    pub checkout: Checkout<Arc<dyn Reserve>, SharedStore>,
}

impl Storefront {
    /// Open the configured store and load the stock snapshot.
    #[instrument(skip_all, fields(concurrency = ?config.concurrency), err)]
    pub async fn connect(config: &StoreConfig) -> Result<Self, BootstrapError> {
        let store: SharedStore = match &config.backend {
            Backend::Memory => Arc::new(InMemoryDocumentStore::new()),
            Backend::File(path) => Arc::new(JsonFileDocumentStore::open(path).await?),
            Backend::Postgres { database_url } => {
                Arc::new(PostgresDocumentStore::connect(database_url).await?)
            }
        };
        Self::with_store(store, config).await
    }

    /// Wire everything over an already-open store.
    pub async fn with_store(
        store: SharedStore,
        config: &StoreConfig,
    ) -> Result<Self, BootstrapError> {
        let stock = Arc::new(StockLedger::open(store.clone(), &config.stock_collection).await?);
        let orders = Arc::new(OrderLedger::new(store, config.orders_collection.clone()));

        let reservations: Arc<dyn Reserve> = match config.concurrency {
            Concurrency::Lock => Arc::new(LockedReservation::new(stock.clone())),
            Concurrency::Transaction => Arc::new(TransactionalReservation::new(stock.clone())),
        };
        let checkout = Checkout::new(reservations.clone(), orders.clone());

        tracing::info!(
            stock_collection = %config.stock_collection,
            orders_collection = %config.orders_collection,
            "storefront ready"
        );
        Ok(Self {
            stock,
            orders,
            reservations,
            checkout,
        })
    }
}

impl std::fmt::Debug for Storefront {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storefront")
            .field("stock_collection", &self.stock.collection())
            .field("orders_collection", &self.orders.collection())
            .finish_non_exhaustive()
    }
}
