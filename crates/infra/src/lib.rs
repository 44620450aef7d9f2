//! Infrastructure layer: persistence adapters, the stock and order ledgers,
//! reservation strategies, checkout and configuration.

pub mod bootstrap;
pub mod checkout;
pub mod config;
pub mod document_store;
pub mod order_ledger;
pub mod reservation;
pub mod stock_ledger;


pub use bootstrap::{BootstrapError, Storefront};
pub use checkout::{Checkout, CheckoutError, CheckoutOutcome};
pub use config::{Backend, Concurrency, ConfigError, StoreConfig};
pub use document_store::{DocumentStore, StoreError};
pub use order_ledger::{OrderLedger, OrderLedgerError};
pub use reservation::{LockedReservation, ReservationResult, Reserve, TransactionalReservation};
pub use stock_ledger::{LedgerError, StockLedger};
