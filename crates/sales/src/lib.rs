//! Preorder domain module.
//!
//! Accepted preorders and the customer details captured at checkout. Pure
//! data + validation; storage lives in the infra crate.

pub mod order;

pub use order::{NewOrder, OrderRecord};
