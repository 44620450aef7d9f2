//! Deployment configuration read from environment variables.
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `STOREFRONT_STORE` | `memory`, `file` or `postgres` | `memory` |
//! | `STOREFRONT_DATA_PATH` | JSON file for the `file` backend | `storefront-data.json` |
//! | `DATABASE_URL` | Postgres URL, required for `postgres` | - |
//! | `STOREFRONT_CONCURRENCY` | `lock` or `transaction` | `lock`, or `transaction` for postgres |
//! | `STOREFRONT_STOCK_COLLECTION` | stock collection | `stock` |
//! | `STOREFRONT_ORDERS_COLLECTION` | orders collection | `preorders` |

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::order_ledger::ORDERS_COLLECTION;
use crate::stock_ledger::STOCK_COLLECTION;

pub const DEFAULT_DATA_PATH: &str = "storefront-data.json";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown STOREFRONT_STORE value: {0} (expected memory, file or postgres)")]
    UnknownBackend(String),

    #[error("unknown STOREFRONT_CONCURRENCY value: {0} (expected lock or transaction)")]
    UnknownConcurrency(String),

    #[error("DATABASE_URL must be set when STOREFRONT_STORE=postgres")]
    MissingDatabaseUrl,
}

/// Where documents are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Memory,
    File(PathBuf),
    Postgres { database_url: String },
}

impl Backend {
    /// Whether another process can write the same store.
    pub fn is_shared(&self) -> bool {
        matches!(self, Backend::Postgres { .. })
    }
}

/// How reservations are made atomic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concurrency {
    /// In-process mutex around the stock ledger (one process per store).
    Lock,
    /// The store's own transaction (several processes per store).
    Transaction,
}

impl FromStr for Concurrency {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lock" => Ok(Concurrency::Lock),
            "transaction" => Ok(Concurrency::Transaction),
            _ => Err(ConfigError::UnknownConcurrency(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub backend: Backend,
    pub concurrency: Concurrency,
    pub stock_collection: String,
    pub orders_collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Memory,
            concurrency: Concurrency::Lock,
            stock_collection: STOCK_COLLECTION.to_string(),
            orders_collection: ORDERS_COLLECTION.to_string(),
        }
    }
}

impl StoreConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup (tests, embedding).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let backend = match var("STOREFRONT_STORE").as_deref().map(str::to_ascii_lowercase) {
            None => Backend::Memory,
            Some(kind) => match kind.as_str() {
                "memory" => Backend::Memory,
                "file" => Backend::File(PathBuf::from(
                    var("STOREFRONT_DATA_PATH").unwrap_or_else(|| DEFAULT_DATA_PATH.to_string()),
                )),
                "postgres" => Backend::Postgres {
                    database_url: var("DATABASE_URL").ok_or(ConfigError::MissingDatabaseUrl)?,
                },
                _ => return Err(ConfigError::UnknownBackend(kind)),
            },
        };

        let concurrency = match var("STOREFRONT_CONCURRENCY") {
            Some(raw) => raw.parse()?,
            None if backend.is_shared() => Concurrency::Transaction,
            None => Concurrency::Lock,
        };

        if backend.is_shared() && concurrency == Concurrency::Lock {
            tracing::warn!(
                "lock concurrency on a shared store is only safe with a single writer process"
            );
        }

        Ok(Self {
            backend,
            concurrency,
            stock_collection: var("STOREFRONT_STOCK_COLLECTION")
                .unwrap_or_else(|| STOCK_COLLECTION.to_string()),
            orders_collection: var("STOREFRONT_ORDERS_COLLECTION")
                .unwrap_or_else(|| ORDERS_COLLECTION.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<StoreConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        StoreConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_to_in_memory_with_lock() {
        assert_eq!(config(&[]).unwrap(), StoreConfig::default());
    }

    #[test]
    fn file_backend_uses_data_path() {
        let cfg = config(&[
            ("STOREFRONT_STORE", "file"),
            ("STOREFRONT_DATA_PATH", "/tmp/shop.json"),
        ])
        .unwrap();
        assert_eq!(cfg.backend, Backend::File(PathBuf::from("/tmp/shop.json")));
        assert_eq!(cfg.concurrency, Concurrency::Lock);

        let cfg = config(&[("STOREFRONT_STORE", "FILE")]).unwrap();
        assert_eq!(cfg.backend, Backend::File(PathBuf::from(DEFAULT_DATA_PATH)));
    }

    #[test]
    fn postgres_defaults_to_transactions_and_needs_a_url() {
        assert_eq!(
            config(&[("STOREFRONT_STORE", "postgres")]).unwrap_err(),
            ConfigError::MissingDatabaseUrl
        );

        let cfg = config(&[
            ("STOREFRONT_STORE", "postgres"),
            ("DATABASE_URL", "postgres://localhost/shop"),
        ])
        .unwrap();
        assert_eq!(cfg.concurrency, Concurrency::Transaction);
        assert!(cfg.backend.is_shared());
    }

    #[test]
    fn explicit_values_override_defaults() {
        let cfg = config(&[
            ("STOREFRONT_CONCURRENCY", "transaction"),
            ("STOREFRONT_STOCK_COLLECTION", "inventory"),
            ("STOREFRONT_ORDERS_COLLECTION", "orders"),
        ])
        .unwrap();
        assert_eq!(cfg.concurrency, Concurrency::Transaction);
        assert_eq!(cfg.stock_collection, "inventory");
        assert_eq!(cfg.orders_collection, "orders");
    }

    #[test]
    fn unknown_values_are_errors() {
        assert_eq!(
            config(&[("STOREFRONT_STORE", "redis")]).unwrap_err(),
            ConfigError::UnknownBackend("redis".to_string())
        );
        assert!(matches!(
            config(&[("STOREFRONT_CONCURRENCY", "optimistic")]).unwrap_err(),
            ConfigError::UnknownConcurrency(_)
        ));
    }
}
