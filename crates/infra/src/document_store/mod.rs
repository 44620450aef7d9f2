//! Collection-scoped document store boundary (the persistence adapter).
//!
//! The inventory and order ledgers only need get/put/delete primitives over
//! JSON documents keyed by id. Backends:
//!
//! - [`InMemoryDocumentStore`]: tests/dev, single process
//! - [`JsonFileDocumentStore`]: local single-process blob store (one JSON file)
//! - [`PostgresDocumentStore`]: shared store for multiple processes
//!
//! [`DocumentStore::transact`] is the store-native read-modify-write used when
//! several processes reserve against the same stock.

pub mod in_memory;
pub mod json_file;
pub mod postgres;
#[cfg(test)]
pub(crate) mod testing;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub use in_memory::InMemoryDocumentStore;
pub use json_file::JsonFileDocumentStore;
pub use postgres::PostgresDocumentStore;

/// A stored document: a JSON object without its id.
pub type Document = Map<String, Value>;

/// Documents of one collection keyed by id.
pub type DocumentMap = BTreeMap<String, Document>;

/// Decision function run inside [`DocumentStore::transact`].
///
/// Receives the existing documents among the requested ids (absent ids are
/// simply missing from the map). Returning `true` commits every document left
/// in the map as a full replacement; `false` aborts without writing.
pub type TransactionFn<'a> = Box<dyn FnOnce(&mut DocumentMap) -> bool + Send + 'a>;

/// Persistence failure.
///
/// These are **infrastructure errors** as opposed to domain outcomes such as
/// insufficient stock. They always propagate to the caller of the mutating
/// operation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("document serialization failed: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        StoreError::Serialization(value.to_string())
    }
}

/// Durable key → document storage, scoped by collection.
///
/// Implementations must make every successful write durable before returning
/// (no write-behind), and must apply `set_merge_many`, `delete_all` and
/// committed `transact` calls as one unit.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every document in a collection. A missing collection is empty, not an error.
    async fn get_all(&self, collection: &str) -> Result<DocumentMap, StoreError>;

    async fn get_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Merge top-level fields into a document, creating it if absent.
    async fn set_merge(
        &self,
        collection: &str,
        id: &str,
        partial: Document,
    ) -> Result<(), StoreError> {
        self.set_merge_many(collection, vec![(id.to_string(), partial)])
            .await
    }

    /// Apply several merges as one durable write.
    async fn set_merge_many(
        &self,
        collection: &str,
        documents: Vec<(String, Document)>,
    ) -> Result<(), StoreError>;

    /// Insert a document under a freshly generated id and return that id.
    async fn add_generate_id(
        &self,
        collection: &str,
        document: Document,
    ) -> Result<String, StoreError>;

    /// Delete one document. Returns `true` if it existed.
    async fn delete_by_id(&self, collection: &str, id: &str) -> Result<bool, StoreError>;

    /// Delete every document in a collection in one durable operation.
    async fn delete_all(&self, collection: &str) -> Result<(), StoreError>;

    /// Read-modify-write the named documents under the store's own
    /// concurrency control. Returns whether `apply` committed.
    async fn transact(
        &self,
        collection: &str,
        ids: &[String],
        apply: TransactionFn<'_>,
    ) -> Result<bool, StoreError>;
}

#[async_trait]
impl<S> DocumentStore for Arc<S>
where
    S: DocumentStore + ?Sized,
{
    async fn get_all(&self, collection: &str) -> Result<DocumentMap, StoreError> {
        (**self).get_all(collection).await
    }

    async fn get_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        (**self).get_by_id(collection, id).await
    }

    async fn set_merge(
        &self,
        collection: &str,
        id: &str,
        partial: Document,
    ) -> Result<(), StoreError> {
        (**self).set_merge(collection, id, partial).await
    }

    async fn set_merge_many(
        &self,
        collection: &str,
        documents: Vec<(String, Document)>,
    ) -> Result<(), StoreError> {
        (**self).set_merge_many(collection, documents).await
    }

    async fn add_generate_id(
        &self,
        collection: &str,
        document: Document,
    ) -> Result<String, StoreError> {
        (**self).add_generate_id(collection, document).await
    }

    async fn delete_by_id(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        (**self).delete_by_id(collection, id).await
    }

    async fn delete_all(&self, collection: &str) -> Result<(), StoreError> {
        (**self).delete_all(collection).await
    }

    async fn transact(
        &self,
        collection: &str,
        ids: &[String],
        apply: TransactionFn<'_>,
    ) -> Result<bool, StoreError> {
        (**self).transact(collection, ids, apply).await
    }
}

/// Merge `partial` into `target` field by field (top level only).
pub(crate) fn merge_into(target: &mut Document, partial: Document) {
    for (key, value) in partial {
        target.insert(key, value);
    }
}

/// Fresh document id (UUIDv7, time-ordered).
pub(crate) fn generate_id() -> String {
    uuid::Uuid::now_v7().to_string()
}
