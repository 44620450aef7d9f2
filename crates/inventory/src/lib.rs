//! Inventory domain module.
//!
//! This crate contains the stock consistency rules (per-size quantities,
//! fulfillability, all-or-nothing decrements), implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod fulfillment;
pub mod payload;
pub mod quantity;
pub mod size;
pub mod stock;
pub mod table;

pub use fulfillment::{Demand, Shortfall, is_fulfillable};
pub use payload::{OrderLineItem, OrderPayload};
pub use quantity::{ProposedStock, normalize_quantity};
pub use size::SizeKey;
pub use stock::StockRecord;
pub use table::{StockTable, StockView};
