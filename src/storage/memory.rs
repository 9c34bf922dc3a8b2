use std::collections::BTreeMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use super::{KeyValueStore, StorageError, StorageResult};

/// Process-local store. Used by tests and by `DATABASE_URL=memory`.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
    fail_writes: AtomicBool,
    failing_prefix: RwLock<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail with a backend error until switched off.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes writes to keys under `prefix` fail; `None` lifts it.
    pub fn set_failing_prefix(&self, prefix: Option<&str>) {
        if let Ok(mut failing) = self.failing_prefix.write() {
            *failing = prefix.map(str::to_string);
        }
    }

    fn check_writable(&self, key: &str) -> StorageResult<()> {
        let prefix_blocked = self
            .failing_prefix
            .read()
            .map_err(poisoned)?
            .as_deref()
            .is_some_and(|p| key.starts_with(p));
        if prefix_blocked || self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("write rejected".to_string()));
        }
        Ok(())
    }
}

fn poisoned<T>(_: T) -> StorageError {
    StorageError::Backend("memory store lock poisoned".to_string())
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.check_writable(key)?;
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        self.check_writable(key)?;
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.remove(key);
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn multi_get(&self, keys: &[String]) -> StorageResult<Vec<Option<String>>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(keys.iter().map(|k| entries.get(k).cloned()).collect())
    }

    async fn multi_remove(&self, keys: &[String]) -> StorageResult<()> {
        for key in keys {
            self.check_writable(key)?;
        }
        let mut entries = self.entries.write().map_err(poisoned)?;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_keys_only_returns_prefix_matches_in_order() {
        let store = MemoryStore::new();
        store.set("attendance:b:2024-01-02", "1").await.unwrap();
        store.set("attendance:a:2024-01-01", "2").await.unwrap();
        store.set("presence:a", "3").await.unwrap();

        let keys = store.list_keys("attendance:").await.unwrap();
        assert_eq!(keys, vec!["attendance:a:2024-01-01", "attendance:b:2024-01-02"]);
    }

    #[tokio::test]
    async fn multi_get_preserves_order_and_gaps() {
        let store = MemoryStore::new();
        store.set("k1", "v1").await.unwrap();
        store.set("k3", "v3").await.unwrap();

        let keys = vec!["k3".to_string(), "k2".to_string(), "k1".to_string()];
        let values = store.multi_get(&keys).await.unwrap();
        assert_eq!(values, vec![Some("v3".into()), None, Some("v1".into())]);
    }

    #[tokio::test]
    async fn failed_writes_leave_state_untouched() {
        let store = MemoryStore::new();
        store.set("k", "old").await.unwrap();
        store.set_fail_writes(true);

        assert!(store.set("k", "new").await.is_err());
        assert!(store.multi_remove(&["k".to_string()]).await.is_err());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("old"));
    }
}
