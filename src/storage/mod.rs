//! Flat string key-value storage.
//!
//! Every persisted namespace (attendance records, presence, zones, users) sits on top
//! of [`KeyValueStore`]. Values are JSON documents; typed access goes through
//! [`get_json`] / [`set_json`] so that parsing and validation happen once, here.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use derive_more::Display;
use serde::{Serialize, de::DeserializeOwned};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Debug, Display)]
pub enum StorageError {
    #[display(fmt = "storage backend failure: {}", _0)]
    Backend(String),
    #[display(fmt = "malformed value under key {}: {}", key, reason)]
    Malformed { key: String, reason: String },
}

impl std::error::Error for StorageError {}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        StorageError::Backend(e.to_string())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    async fn remove(&self, key: &str) -> StorageResult<()>;

    /// All keys starting with `prefix`, sorted ascending.
    async fn list_keys(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Values for `keys` in the same order; missing keys yield `None`.
    async fn multi_get(&self, keys: &[String]) -> StorageResult<Vec<Option<String>>>;

    async fn multi_remove(&self, keys: &[String]) -> StorageResult<()>;
}

pub async fn get_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> StorageResult<Option<T>> {
    match store.get(key).await? {
        Some(raw) => decode(key, &raw).map(Some),
        None => Ok(None),
    }
}

pub async fn set_json<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> StorageResult<()> {
    let raw = serde_json::to_string(value).map_err(|e| StorageError::Malformed {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    store.set(key, &raw).await
}

/// Loads every value under `prefix`, skipping keys that vanished between the listing
/// and the read.
pub async fn list_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    prefix: &str,
) -> StorageResult<Vec<(String, T)>> {
    let keys = store.list_keys(prefix).await?;
    let values = store.multi_get(&keys).await?;

    let mut out = Vec::with_capacity(keys.len());
    for (key, raw) in keys.into_iter().zip(values) {
        if let Some(raw) = raw {
            let value = decode(&key, &raw)?;
            out.push((key, value));
        }
    }
    Ok(out)
}

fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> StorageResult<T> {
    serde_json::from_str(raw).map_err(|e| StorageError::Malformed {
        key: key.to_string(),
        reason: e.to_string(),
    })
}
