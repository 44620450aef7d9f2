//! Fulfillment checking: does current stock cover a payload?
//!
//! Pure and read-only. The same [`Demand`] drives both the check and the
//! decrement plan, so a successful check is exactly a successful dry-run.

use std::collections::{BTreeMap, BTreeSet};

use storefront_core::ProductId;

use crate::payload::OrderPayload;
use crate::size::SizeKey;
use crate::table::StockView;

/// Aggregated demand per (product, size).
///
/// Line items with unrecognized size keys and non-positive quantities
/// contribute nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Demand {
    lines: BTreeMap<(ProductId, SizeKey), u64>,
}

/// One (product, size) pair where stock does not cover demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortfall {
    pub product_id: ProductId,
    pub size: SizeKey,
    pub requested: u64,
    pub available: u64,
}

impl Demand {
    pub fn from_payload(payload: &OrderPayload) -> Self {
        let mut lines: BTreeMap<(ProductId, SizeKey), u64> = BTreeMap::new();
        for item in &payload.items {
            let Some(size) = item.size_key() else {
                continue;
            };
            let qty = item.demand();
            if qty == 0 {
                continue;
            }
            let entry = lines.entry((item.product_id.clone(), size)).or_default();
            *entry = entry.saturating_add(qty);
        }
        Self { lines }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Distinct products with positive demand, in sorted order.
    pub fn products(&self) -> BTreeSet<&ProductId> {
        self.lines.keys().map(|(id, _)| id).collect()
    }

    pub fn get(&self, product_id: &ProductId, size: SizeKey) -> u64 {
        self.lines
            .get(&(product_id.clone(), size))
            .copied()
            .unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ProductId, SizeKey, u64)> {
        self.lines.iter().map(|((id, size), qty)| (id, *size, *qty))
    }

    /// Every pair whose stock is below demand.
    pub fn shortfalls(&self, stock: &impl StockView) -> Vec<Shortfall> {
        let mut out = Vec::new();
        for product_id in self.products() {
            let record = stock.stock(product_id);
            for size in SizeKey::ALL {
                let requested = self.get(product_id, size);
                let available = record.get(size);
                if requested > available {
                    out.push(Shortfall {
                        product_id: product_id.clone(),
                        size,
                        requested,
                        available,
                    });
                }
            }
        }
        out
    }

    pub fn is_satisfied_by(&self, stock: &impl StockView) -> bool {
        self.products().into_iter().all(|product_id| {
            let record = stock.stock(product_id);
            self.lines
                .range((product_id.clone(), SizeKey::S)..=(product_id.clone(), SizeKey::XL))
                .all(|((_, size), qty)| record.get(*size) >= *qty)
        })
    }
}

/// `true` iff every (product, size) with positive demand is covered by stock.
///
/// An empty payload is trivially fulfillable.
pub fn is_fulfillable(stock: &impl StockView, payload: &OrderPayload) -> bool {
    Demand::from_payload(payload).is_satisfied_by(stock)
}
