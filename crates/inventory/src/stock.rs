use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::quantity::{ProposedStock, normalize_quantity};
use crate::size::SizeKey;

/// Per-product stock: one non-negative quantity for each of the four sizes.
///
/// Quantities are unsigned, so the non-negativity invariant holds by
/// construction. Missing keys default to 0 on deserialization.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockRecord {
    #[serde(rename = "S", default)]
    s: u64,
    #[serde(rename = "M", default)]
    m: u64,
    #[serde(rename = "L", default)]
    l: u64,
    #[serde(rename = "XL", default)]
    xl: u64,
}

impl StockRecord {
    /// All-zero record (the materialized default for unknown products).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(s: u64, m: u64, l: u64, xl: u64) -> Self {
        Self { s, m, l, xl }
    }

    pub fn get(&self, size: SizeKey) -> u64 {
        match size {
            SizeKey::S => self.s,
            SizeKey::M => self.m,
            SizeKey::L => self.l,
            SizeKey::XL => self.xl,
        }
    }

    pub fn with(mut self, size: SizeKey, quantity: u64) -> Self {
        *self.slot_mut(size) = quantity;
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (SizeKey, u64)> + '_ {
        SizeKey::ALL.into_iter().map(|size| (size, self.get(size)))
    }

    /// Apply a signed delta to one size, flooring at zero.
    pub fn adjusted(mut self, size: SizeKey, delta: i64) -> Self {
        let current = self.get(size);
        let next = if delta >= 0 {
            current.saturating_add(delta.unsigned_abs())
        } else {
            current.saturating_sub(delta.unsigned_abs())
        };
        *self.slot_mut(size) = next;
        self
    }

    /// Merge a proposed replacement: present sizes are normalized, absent
    /// sizes keep the value already in `self`.
    pub fn merged(self, proposed: &ProposedStock) -> Self {
        let mut next = self;
        for size in SizeKey::ALL {
            if let Some(value) = proposed.get(size) {
                *next.slot_mut(size) = normalize_quantity(value);
            }
        }
        next
    }

    /// Read a stored document, normalizing every field.
    ///
    /// Documents written by older clients may hold strings, floats or
    /// negative numbers; unknown fields are ignored.
    pub fn from_document(doc: &Map<String, Value>) -> Self {
        let mut record = Self::empty();
        for size in SizeKey::ALL {
            if let Some(value) = doc.get(size.as_str()) {
                *record.slot_mut(size) = normalize_quantity(value);
            }
        }
        record
    }

    /// Document form with all four keys present.
    pub fn to_document(&self) -> Map<String, Value> {
        self.iter()
            .map(|(size, qty)| (size.as_str().to_string(), Value::from(qty)))
            .collect()
    }

    fn slot_mut(&mut self, size: SizeKey) -> &mut u64 {
        match size {
            SizeKey::S => &mut self.s,
            SizeKey::M => &mut self.m,
            SizeKey::L => &mut self.l,
            SizeKey::XL => &mut self.xl,
        }
    }
}
