//! Postgres-backed document store.
//!
//! One table holds every collection:
//!
//! ```sql
//! CREATE TABLE documents (
//!     collection TEXT        NOT NULL,
//!     id         TEXT        NOT NULL,
//!     data       JSONB       NOT NULL,
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     PRIMARY KEY (collection, id)
//! );
//! ```
//!
//! ## Error Mapping
//!
//! | SQLx Error | StoreError |
//! |------------|------------|
//! | `PoolClosed`, `PoolTimedOut`, `Io` | `Unavailable` |
//! | `Decode`, `ColumnDecode` | `Serialization` |
//! | anything else | `Backend` |
//!
//! ## Concurrency
//!
//! `transact` locks the requested rows with `SELECT ... FOR UPDATE` inside one
//! transaction (rows are locked in id order to avoid deadlocks), so concurrent
//! reservations from several processes serialize on the products they share.
//! Rows that do not exist yet cannot be locked; callers must treat an absent
//! document as zero stock.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use super::{Document, DocumentMap, DocumentStore, StoreError, TransactionFn, generate_id};

/// Postgres-backed document store.
///
/// `Send + Sync`; all operations go through the SQLx connection pool.
#[derive(Debug, Clone)]
pub struct PostgresDocumentStore {
    pool: Arc<PgPool>,
}

impl PostgresDocumentStore {
    /// Create a new store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect to `database_url` and make sure the schema exists.
    #[instrument(skip_all, err)]
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Create the `documents` table if it is missing.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT        NOT NULL,
                id         TEXT        NOT NULL,
                data       JSONB       NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (collection, id)
            )
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    async fn begin(&self, operation: &str) -> Result<Transaction<'static, Postgres>, StoreError> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error(operation, e))
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    #[instrument(skip(self), err)]
    async fn get_all(&self, collection: &str) -> Result<DocumentMap, StoreError> {
        let rows = sqlx::query("SELECT id, data FROM documents WHERE collection = $1 ORDER BY id")
            .bind(collection)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_all", e))?;

        rows.iter().map(decode_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query("SELECT id, data FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_by_id", e))?;

        row.as_ref()
            .map(decode_row)
            .transpose()
            .map(|opt| opt.map(|(_, doc)| doc))
    }

    #[instrument(skip(self, documents), fields(count = documents.len()), err)]
    async fn set_merge_many(
        &self,
        collection: &str,
        documents: Vec<(String, Document)>,
    ) -> Result<(), StoreError> {
        let mut tx = self.begin("set_merge_many").await?;
        for (id, partial) in documents {
            sqlx::query(
                r#"
                INSERT INTO documents (collection, id, data)
                VALUES ($1, $2, $3)
                ON CONFLICT (collection, id)
                DO UPDATE SET
                    data = documents.data || EXCLUDED.data,
                    updated_at = NOW()
                "#,
            )
            .bind(collection)
            .bind(&id)
            .bind(Json(partial))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_merge_many", e))?;
        }
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("set_merge_many", e))
    }

    #[instrument(skip(self, document), err)]
    async fn add_generate_id(
        &self,
        collection: &str,
        document: Document,
    ) -> Result<String, StoreError> {
        let id = generate_id();
        sqlx::query("INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(&id)
            .bind(Json(document))
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("add_generate_id", e))?;
        Ok(id)
    }

    #[instrument(skip(self), err)]
    async fn delete_by_id(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_by_id", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), err)]
    async fn delete_all(&self, collection: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM documents WHERE collection = $1")
            .bind(collection)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_all", e))?;
        Ok(())
    }

    #[instrument(skip(self, apply), err)]
    async fn transact(
        &self,
        collection: &str,
        ids: &[String],
        apply: TransactionFn<'_>,
    ) -> Result<bool, StoreError> {
        let mut tx = self.begin("transact").await?;

        let rows = sqlx::query(
            r#"
            SELECT id, data
            FROM documents
            WHERE collection = $1 AND id = ANY($2)
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(collection)
        .bind(ids)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("transact", e))?;

        let mut working = rows.iter().map(decode_row).collect::<Result<DocumentMap, _>>()?;

        if !apply(&mut working) {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("transact", e))?;
            return Ok(false);
        }

        for (id, doc) in working {
            sqlx::query(
                r#"
                INSERT INTO documents (collection, id, data)
                VALUES ($1, $2, $3)
                ON CONFLICT (collection, id)
                DO UPDATE SET
                    data = EXCLUDED.data,
                    updated_at = NOW()
                "#,
            )
            .bind(collection)
            .bind(&id)
            .bind(Json(doc))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("transact", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("transact", e))?;
        Ok(true)
    }
}

fn decode_row(row: &sqlx::postgres::PgRow) -> Result<(String, Document), StoreError> {
    let id: String = row
        .try_get("id")
        .map_err(|e| StoreError::Serialization(format!("documents.id: {e}")))?;
    let Json(data): Json<Document> = row
        .try_get("data")
        .map_err(|e| StoreError::Serialization(format!("documents.data for {id}: {e}")))?;
    Ok((id, data))
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("{operation}: {err}"))
        }
        sqlx::Error::Io(io) => StoreError::Unavailable(format!("{operation}: {io}")),
        sqlx::Error::Decode(_) | sqlx::Error::ColumnDecode { .. } => {
            StoreError::Serialization(format!("{operation}: {err}"))
        }
        other => StoreError::Backend(format!("{operation}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    async fn connect() -> PostgresDocumentStore {
        let url =
            std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for postgres tests");
        PostgresDocumentStore::connect(&url).await.unwrap()
    }

    #[test]
    fn pool_errors_map_to_unavailable() {
        assert!(matches!(
            map_sqlx_error("get_all", sqlx::Error::PoolClosed),
            StoreError::Unavailable(_)
        ));
        assert!(matches!(
            map_sqlx_error("get_all", sqlx::Error::RowNotFound),
            StoreError::Backend(_)
        ));
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn merge_and_transact_against_postgres() {
        let store = connect().await;
        let collection = format!("test-{}", generate_id());

        store.set_merge(&collection, "shirt", doc(json!({"S": 1, "M": 1}))).await.unwrap();
        store.set_merge(&collection, "shirt", doc(json!({"M": 4}))).await.unwrap();
        let stored = store.get_by_id(&collection, "shirt").await.unwrap().unwrap();
        assert_eq!(Value::Object(stored), json!({"S": 1, "M": 4}));

        let committed = store
            .transact(
                &collection,
                &["shirt".to_string()],
                Box::new(|docs: &mut DocumentMap| {
                    docs.insert("shirt".to_string(), doc(json!({"S": 0, "M": 4})));
                    true
                }),
            )
            .await
            .unwrap();
        assert!(committed);

        store.delete_all(&collection).await.unwrap();
        assert!(store.get_all(&collection).await.unwrap().is_empty());
    }
}
