use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use storefront_core::{DomainError, DomainResult, OrderId};
use storefront_inventory::OrderPayload;

/// A preorder as submitted at checkout, before the ledger assigns an id and
/// acceptance time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub name: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub payload: OrderPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Any additional fields the storefront attaches (carried verbatim).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NewOrder {
    pub fn new(name: impl Into<String>, phone: impl Into<String>, payload: OrderPayload) -> Self {
        Self {
            name: name.into(),
            phone: phone.into(),
            email: None,
            payload,
            notes: None,
            extra: Map::new(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Check the customer contact fields.
    ///
    /// Blank optional fields are normalized to `None` rather than rejected.
    pub fn validated(mut self) -> DomainResult<Self> {
        self.name = self.name.trim().to_string();
        self.phone = self.phone.trim().to_string();

        if self.name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if self.phone.is_empty() {
            return Err(DomainError::validation("phone cannot be empty"));
        }

        self.email = self
            .email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());
        if let Some(email) = &self.email {
            if !email.contains('@') {
                return Err(DomainError::validation(format!("invalid email: {email}")));
            }
        }

        self.notes = self
            .notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        Ok(self)
    }

    /// Stamp identity and acceptance time.
    pub fn accept(self, id: OrderId, created_at: DateTime<Utc>) -> OrderRecord {
        OrderRecord {
            id,
            created_at,
            order: self,
        }
    }
}

/// An accepted preorder. Immutable once stored; only deletion is allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub id: OrderId,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub order: NewOrder,
}

impl OrderRecord {
    pub fn payload(&self) -> &OrderPayload {
        &self.order.payload
    }

    /// Document form for the orders collection: every field except `id`,
    /// which is the document key.
    pub fn to_document(&self) -> DomainResult<Map<String, Value>> {
        let value = serde_json::to_value(self)
            .map_err(|e| DomainError::validation(format!("order serialization failed: {e}")))?;
        let Value::Object(mut doc) = value else {
            return Err(DomainError::invariant("order did not serialize to an object"));
        };
        doc.remove("id");
        Ok(doc)
    }

    /// Rebuild a record from its document key and stored fields.
    pub fn from_document(id: OrderId, doc: &Map<String, Value>) -> DomainResult<Self> {
        let mut doc = doc.clone();
        doc.insert("id".to_string(), Value::String(id.to_string()));
        serde_json::from_value(Value::Object(doc))
            .map_err(|e| DomainError::validation(format!("malformed order document {id}: {e}")))
    }
}
