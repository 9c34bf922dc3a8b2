use std::sync::Arc;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

use crate::storage::{KeyValueStore, MemoryStore, SqliteStore};

pub async fn init_db(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    init_db_with(database_url, 5).await
}

/// Opens (creating if needed) the sqlite file and makes sure the `kv` table exists.
pub async fn init_db_with(database_url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS kv (
            key   TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    Ok(pool)
}

/// `memory` keeps everything in-process; anything else is treated as a sqlite URL.
pub async fn open_store(database_url: &str) -> Result<Arc<dyn KeyValueStore>, sqlx::Error> {
    if database_url == "memory" {
        return Ok(Arc::new(MemoryStore::new()));
    }
    let pool = init_db(database_url).await?;
    Ok(Arc::new(SqliteStore::new(pool)))
}
