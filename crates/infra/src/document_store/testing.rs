//! Test doubles for persistence failures.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{Document, DocumentMap, DocumentStore, InMemoryDocumentStore, StoreError, TransactionFn};

/// In-memory store whose reads and writes can be switched to fail.
#[derive(Debug)]
pub(crate) struct FlakyStore {
    inner: InMemoryDocumentStore,
    writes_left: AtomicUsize,
    fail_reads: AtomicBool,
}

impl Default for FlakyStore {
    fn default() -> Self {
        Self {
            inner: InMemoryDocumentStore::new(),
            writes_left: AtomicUsize::new(usize::MAX),
            fail_reads: AtomicBool::new(false),
        }
    }
}

impl FlakyStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        let left = if fail { 0 } else { usize::MAX };
        self.writes_left.store(left, Ordering::SeqCst);
    }

    /// Let the next `n` writes through, then fail every write after them.
    pub(crate) fn fail_writes_after(&self, n: usize) {
        self.writes_left.store(n, Ordering::SeqCst);
    }

    pub(crate) fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn check_write(&self) -> Result<(), StoreError> {
        let allowed = self
            .writes_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                usize::MAX => Some(left),
                0 => None,
                n => Some(n - 1),
            })
            .is_ok();
        if allowed {
            Ok(())
        } else {
            Err(StoreError::Unavailable("injected write failure".to_string()))
        }
    }

    fn check_read(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("injected read failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn get_all(&self, collection: &str) -> Result<DocumentMap, StoreError> {
        self.check_read()?;
        self.inner.get_all(collection).await
    }

    async fn get_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.check_read()?;
        self.inner.get_by_id(collection, id).await
    }

    async fn set_merge_many(
        &self,
        collection: &str,
        documents: Vec<(String, Document)>,
    ) -> Result<(), StoreError> {
        self.check_write()?;
        self.inner.set_merge_many(collection, documents).await
    }

    async fn add_generate_id(
        &self,
        collection: &str,
        document: Document,
    ) -> Result<String, StoreError> {
        self.check_write()?;
        self.inner.add_generate_id(collection, document).await
    }

    async fn delete_by_id(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        self.check_write()?;
        self.inner.delete_by_id(collection, id).await
    }

    async fn delete_all(&self, collection: &str) -> Result<(), StoreError> {
        self.check_write()?;
        self.inner.delete_all(collection).await
    }

    async fn transact(
        &self,
        collection: &str,
        ids: &[String],
        apply: TransactionFn<'_>,
    ) -> Result<bool, StoreError> {
        self.check_write()?;
        self.inner.transact(collection, ids, apply).await
    }
}
