use std::collections::HashMap;

use storefront_core::ProductId;

use crate::quantity::ProposedStock;
use crate::size::SizeKey;
use crate::stock::StockRecord;

/// Read access to current stock, used by the fulfillment checker.
pub trait StockView {
    /// Current record for a product; unknown products read as all-zero.
    fn stock(&self, product_id: &ProductId) -> StockRecord;
}

/// In-memory stock ledger state: product identifier to stock record.
///
/// Pure state transitions only. Durability and locking are layered on top by
/// the infra crate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockTable {
    records: HashMap<ProductId, StockRecord>,
}

impl StockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current record, or the all-zero default. Does not insert.
    pub fn get(&self, product_id: &ProductId) -> StockRecord {
        self.records.get(product_id).copied().unwrap_or_default()
    }

    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.records.contains_key(product_id)
    }

    /// Replace a record with `proposed` merged over the stored value.
    pub fn set(&mut self, product_id: &ProductId, proposed: &ProposedStock) -> StockRecord {
        let next = self.get(product_id).merged(proposed);
        self.records.insert(product_id.clone(), next);
        next
    }

    /// `stored[size] = max(0, stored[size] + delta)`.
    ///
    /// Returns `false` without touching anything if `size` is not one of the
    /// four known keys.
    pub fn adjust(&mut self, product_id: &ProductId, size: &str, delta: i64) -> bool {
        let Some(size) = SizeKey::parse(size) else {
            return false;
        };
        let next = self.get(product_id).adjusted(size, delta);
        self.records.insert(product_id.clone(), next);
        true
    }

    pub fn insert(&mut self, product_id: ProductId, record: StockRecord) {
        self.records.insert(product_id, record);
    }

    pub fn remove(&mut self, product_id: &ProductId) -> Option<StockRecord> {
        self.records.remove(product_id)
    }

    /// Copy of the records for the given products only (missing ones stay absent).
    pub fn subset<'a>(&self, product_ids: impl IntoIterator<Item = &'a ProductId>) -> StockTable {
        let records = product_ids
            .into_iter()
            .filter_map(|id| self.records.get(id).map(|r| (id.clone(), *r)))
            .collect();
        StockTable { records }
    }

    /// Overwrite this table's entries with every entry of `other`.
    pub fn absorb(&mut self, other: StockTable) {
        self.records.extend(other.records);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ProductId, &StockRecord)> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl StockView for StockTable {
    fn stock(&self, product_id: &ProductId) -> StockRecord {
        self.get(product_id)
    }
}

impl FromIterator<(ProductId, StockRecord)> for StockTable {
    fn from_iter<T: IntoIterator<Item = (ProductId, StockRecord)>>(iter: T) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}
