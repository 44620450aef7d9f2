//! Local single-process blob store: the whole database is one JSON file.
//!
//! Every mutation builds the next state in memory, rewrites the file
//! atomically (temp file + rename) and only then swaps the in-memory state,
//! so memory is never ahead of disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::{
    Document, DocumentMap, DocumentStore, StoreError, TransactionFn, generate_id, merge_into,
};

type Database = BTreeMap<String, DocumentMap>;

/// JSON-file backed document store.
///
/// Not safe for several processes writing the same file; use Postgres for that.
#[derive(Debug)]
pub struct JsonFileDocumentStore {
    path: PathBuf,
    state: Mutex<Database>,
}

impl JsonFileDocumentStore {
    /// Open (or lazily create) the database file at `path`.
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()), err)]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => Database::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Database::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(collections = state.len(), "opened json document store");
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    async fn write_file(&self, next: &Database) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(next)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Apply `change` to a copy of the database, persist it, then publish it.
    async fn commit<T>(
        &self,
        change: impl FnOnce(&mut Database) -> T,
    ) -> Result<T, StoreError> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let out = change(&mut next);
        self.write_file(&next).await?;
        *state = next;
        Ok(out)
    }
}

#[async_trait]
impl DocumentStore for JsonFileDocumentStore {
    async fn get_all(&self, collection: &str) -> Result<DocumentMap, StoreError> {
        let state = self.state.lock().await;
        Ok(state.get(collection).cloned().unwrap_or_default())
    }

    async fn get_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.get(collection).and_then(|docs| docs.get(id)).cloned())
    }

    async fn set_merge_many(
        &self,
        collection: &str,
        documents: Vec<(String, Document)>,
    ) -> Result<(), StoreError> {
        self.commit(|db| {
            let docs = db.entry(collection.to_string()).or_default();
            for (id, partial) in documents {
                merge_into(docs.entry(id).or_default(), partial);
            }
        })
        .await
    }

    async fn add_generate_id(
        &self,
        collection: &str,
        document: Document,
    ) -> Result<String, StoreError> {
        let id = generate_id();
        self.commit(|db| {
            db.entry(collection.to_string())
                .or_default()
                .insert(id.clone(), document);
        })
        .await?;
        Ok(id)
    }

    async fn delete_by_id(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        {
            let state = self.state.lock().await;
            let exists = state
                .get(collection)
                .map(|docs| docs.contains_key(id))
                .unwrap_or(false);
            if !exists {
                return Ok(false);
            }
        }

        self.commit(|db| {
            db.get_mut(collection)
                .map(|docs| docs.remove(id).is_some())
                .unwrap_or(false)
        })
        .await
    }

    async fn delete_all(&self, collection: &str) -> Result<(), StoreError> {
        self.commit(|db| {
            db.remove(collection);
        })
        .await
    }

    async fn transact(
        &self,
        collection: &str,
        ids: &[String],
        apply: TransactionFn<'_>,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;

        let mut working: DocumentMap = state
            .get(collection)
            .map(|docs| {
                ids.iter()
                    .filter_map(|id| docs.get(id).map(|doc| (id.clone(), doc.clone())))
                    .collect()
            })
            .unwrap_or_default();

        if !apply(&mut working) {
            return Ok(false);
        }

        let mut next = state.clone();
        next.entry(collection.to_string())
            .or_default()
            .extend(working);
        self.write_file(&next).await?;
        *state = next;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("storefront-{name}-{}.json", uuid::Uuid::now_v7()))
    }

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn writes_survive_reopen() {
        let path = temp_path("reopen");
        {
            let store = JsonFileDocumentStore::open(&path).await.unwrap();
            store.set_merge("stock", "shirt", doc(json!({"S": 3}))).await.unwrap();
            store.add_generate_id("orders", doc(json!({"name": "Ada"}))).await.unwrap();
        }

        let reopened = JsonFileDocumentStore::open(&path).await.unwrap();
        let stock = reopened.get_by_id("stock", "shirt").await.unwrap().unwrap();
        assert_eq!(stock.get("S"), Some(&json!(3)));
        assert_eq!(reopened.get_all("orders").await.unwrap().len(), 1);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn missing_file_opens_empty() {
        let path = temp_path("missing");
        let store = JsonFileDocumentStore::open(&path).await.unwrap();
        assert!(store.get_all("stock").await.unwrap().is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn delete_all_is_durable() {
        let path = temp_path("clear");
        let store = JsonFileDocumentStore::open(&path).await.unwrap();
        for n in 0..3 {
            store.add_generate_id("orders", doc(json!({"n": n}))).await.unwrap();
        }
        store.delete_all("orders").await.unwrap();

        let reopened = JsonFileDocumentStore::open(&path).await.unwrap();
        assert!(reopened.get_all("orders").await.unwrap().is_empty());

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn rewrite_leaves_no_temp_file_behind() {
        let path = temp_path("tmp");
        let store = JsonFileDocumentStore::open(&path).await.unwrap();
        store.set_merge("stock", "shirt", doc(json!({"M": 1}))).await.unwrap();

        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        assert!(!PathBuf::from(tmp).exists());
        let on_disk: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(on_disk, json!({"stock": {"shirt": {"M": 1}}}));

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn corrupt_file_is_a_serialization_error() {
        let path = temp_path("corrupt");
        std::fs::write(&path, b"{not json").unwrap();

        let err = JsonFileDocumentStore::open(&path).await.unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));

        let _ = std::fs::remove_file(&path);
    }
}
