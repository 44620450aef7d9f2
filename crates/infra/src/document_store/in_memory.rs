use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{
    Document, DocumentMap, DocumentStore, StoreError, TransactionFn, generate_id, merge_into,
};

/// In-memory document store.
///
/// Intended for tests/dev. `transact` runs under the write lock, so it is a
/// real transaction for every caller sharing this instance (e.g. several
/// ledgers behind one `Arc`).
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, DocumentMap>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get_all(&self, collection: &str) -> Result<DocumentMap, StoreError> {
        let collections = self.collections.read().map_err(|_| StoreError::Poisoned)?;
        Ok(collections.get(collection).cloned().unwrap_or_default())
    }

    async fn get_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().map_err(|_| StoreError::Poisoned)?;
        Ok(collections.get(collection).and_then(|docs| docs.get(id)).cloned())
    }

    async fn set_merge_many(
        &self,
        collection: &str,
        documents: Vec<(String, Document)>,
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.write().map_err(|_| StoreError::Poisoned)?;
        let docs = collections.entry(collection.to_string()).or_default();
        for (id, partial) in documents {
            merge_into(docs.entry(id).or_default(), partial);
        }
        Ok(())
    }

    async fn add_generate_id(
        &self,
        collection: &str,
        document: Document,
    ) -> Result<String, StoreError> {
        let id = generate_id();
        let mut collections = self.collections.write().map_err(|_| StoreError::Poisoned)?;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), document);
        Ok(id)
    }

    async fn delete_by_id(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().map_err(|_| StoreError::Poisoned)?;
        Ok(collections
            .get_mut(collection)
            .map(|docs| docs.remove(id).is_some())
            .unwrap_or(false))
    }

    async fn delete_all(&self, collection: &str) -> Result<(), StoreError> {
        let mut collections = self.collections.write().map_err(|_| StoreError::Poisoned)?;
        collections.remove(collection);
        Ok(())
    }

    async fn transact(
        &self,
        collection: &str,
        ids: &[String],
        apply: TransactionFn<'_>,
    ) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().map_err(|_| StoreError::Poisoned)?;
        let docs = collections.entry(collection.to_string()).or_default();

        let mut working: DocumentMap = ids
            .iter()
            .filter_map(|id| docs.get(id).map(|doc| (id.clone(), doc.clone())))
            .collect();

        if !apply(&mut working) {
            return Ok(false);
        }

        docs.extend(working);
        Ok(true)
    }
}
