use serde::{Deserialize, Serialize};
use serde_json::Value;

use storefront_core::ProductId;

use crate::quantity::normalize_quantity;
use crate::size::SizeKey;

/// One requested line: product, size, quantity.
///
/// `size` stays a raw string so that unrecognized keys can be carried through
/// and dropped by the checker instead of failing deserialization. `quantity`
/// stays raw JSON for the same reason; [`OrderLineItem::demand`] normalizes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineItem {
    pub product_id: ProductId,
    pub size: String,
    #[serde(default)]
    pub quantity: Value,
}

impl OrderLineItem {
    pub fn new(
        product_id: impl Into<ProductId>,
        size: impl Into<String>,
        quantity: impl Into<Value>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            size: size.into(),
            quantity: quantity.into(),
        }
    }

    /// Recognized size key, if any.
    pub fn size_key(&self) -> Option<SizeKey> {
        SizeKey::parse(&self.size)
    }

    /// Requested quantity as demand, normalized like any other stock input:
    /// negative or malformed lines demand nothing.
    pub fn demand(&self) -> u64 {
        normalize_quantity(&self.quantity)
    }
}

/// The set of line items a checkout reserves against stock.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderPayload {
    #[serde(default)]
    pub items: Vec<OrderLineItem>,
    #[serde(default)]
    pub total: f64,
}

impl OrderPayload {
    pub fn new(items: Vec<OrderLineItem>, total: f64) -> Self {
        Self { items, total }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
