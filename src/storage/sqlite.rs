use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::SqlitePool;

use super::{KeyValueStore, StorageResult};

/// Key-value namespace backed by the single `kv` table created in [`crate::db::init_db`].
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO kv (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        sqlx::query("DELETE FROM kv WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let keys = sqlx::query_scalar::<_, String>(
            r#"
            SELECT key FROM kv
            WHERE substr(key, 1, length(?)) = ?
            ORDER BY key
            "#,
        )
        .bind(prefix)
        .bind(prefix)
        .fetch_all(&self.pool)
        .await?;
        Ok(keys)
    }

    async fn multi_get(&self, keys: &[String]) -> StorageResult<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; keys.len()].join(", ");
        let sql = format!("SELECT key, value FROM kv WHERE key IN ({})", placeholders);

        let mut query = sqlx::query_as::<_, (String, String)>(&sql);
        for key in keys {
            query = query.bind(key);
        }
        let rows: HashMap<String, String> = query.fetch_all(&self.pool).await?.into_iter().collect();

        Ok(keys.iter().map(|k| rows.get(k).cloned()).collect())
    }

    async fn multi_remove(&self, keys: &[String]) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;
        for key in keys {
            sqlx::query("DELETE FROM kv WHERE key = ?")
                .bind(key)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db_with;

    async fn store() -> SqliteStore {
        let pool = init_db_with("sqlite::memory:", 1).await.unwrap();
        SqliteStore::new(pool)
    }

    #[tokio::test]
    async fn set_overwrites_existing_key() {
        let store = store().await;
        store.set("presence:u1", "first").await.unwrap();
        store.set("presence:u1", "second").await.unwrap();

        assert_eq!(store.get("presence:u1").await.unwrap().as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn prefix_listing_and_bulk_operations() {
        let store = store().await;
        store.set("attendance:u1:2024-01-02", "b").await.unwrap();
        store.set("attendance:u1:2024-01-01", "a").await.unwrap();
        store.set("attendance_legacy", "x").await.unwrap();

        let keys = store.list_keys("attendance:").await.unwrap();
        assert_eq!(keys, vec!["attendance:u1:2024-01-01", "attendance:u1:2024-01-02"]);

        let mut wanted = keys.clone();
        wanted.push("missing".to_string());
        let values = store.multi_get(&wanted).await.unwrap();
        assert_eq!(values, vec![Some("a".into()), Some("b".into()), None]);

        store.multi_remove(&keys).await.unwrap();
        assert!(store.list_keys("attendance:").await.unwrap().is_empty());
        assert!(store.get("attendance_legacy").await.unwrap().is_some());
    }
}
