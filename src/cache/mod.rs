//! A small key-value cache in a SQLite file. Values are stored as JSON with the time they were
//! written.

mod migrations;

use crate::error::Res;
use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use tracing::trace;

/// Every month's transactions, as loaded for search.
pub(crate) const ALL_MONTHS_KEY: &str = "all-months-transactions";

/// The ledger used without Google Sheets (demo mode, or an unreachable remote), so that local
/// edits survive between commands.
pub(crate) const LOCAL_LEDGER_KEY: &str = "local-ledger";

/// A value read from the cache and the time it was saved.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Cached<T> {
    pub(crate) value: T,
    pub(crate) saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub(crate) struct Cache {
    pool: SqlitePool,
}

impl Cache {
    /// Creates the database file at `path`, which must not exist yet, with the latest schema.
    pub(crate) async fn init(path: &Path) -> Res<Self> {
        if path.exists() {
            bail!("A cache database already exists at {}", path.display());
        }
        let pool = connect(path, true).await?;
        sqlx::query("CREATE TABLE schema_version (version INTEGER NOT NULL)")
            .execute(&pool)
            .await
            .context("Failed to create the schema_version table")?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (0)")
            .execute(&pool)
            .await
            .context("Failed to write the initial schema version")?;
        migrations::run(&pool, 0, migrations::LATEST).await?;
        Ok(Self { pool })
    }

    /// Opens an existing database and migrates it if its schema is out of date.
    pub(crate) async fn load(path: &Path) -> Res<Self> {
        if !path.is_file() {
            bail!("There is no cache database at {}", path.display());
        }
        let pool = connect(path, false).await?;
        let (version,): (i32,) = sqlx::query_as("SELECT MAX(version) FROM schema_version")
            .fetch_one(&pool)
            .await
            .context("Failed to read the cache schema version")?;
        migrations::run(&pool, version, migrations::LATEST).await?;
        Ok(Self { pool })
    }

    /// Stores `value` under `key`, replacing what was there.
    pub(crate) async fn save<T: Serialize>(&self, key: &str, value: &T) -> Res<()> {
        let data = serde_json::to_string(value)
            .with_context(|| format!("Unable to serialize the cache entry '{key}'"))?;
        sqlx::query(
            "INSERT INTO cache (key, data, timestamp) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET data = excluded.data, timestamp = excluded.timestamp",
        )
        .bind(key)
        .bind(data)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to save the cache entry '{key}'"))?;
        trace!("Saved cache entry '{key}'");
        Ok(())
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, key: &str) -> Res<Option<Cached<T>>> {
        let row: Option<(String, i64)> =
            sqlx::query_as("SELECT data, timestamp FROM cache WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .with_context(|| format!("Failed to read the cache entry '{key}'"))?;
        let Some((data, timestamp)) = row else {
            return Ok(None);
        };
        let value = serde_json::from_str(&data)
            .with_context(|| format!("The cache entry '{key}' is malformed"))?;
        let saved_at = DateTime::from_timestamp_millis(timestamp).unwrap_or_default();
        Ok(Some(Cached { value, saved_at }))
    }

    pub(crate) async fn delete(&self, key: &str) -> Res<()> {
        sqlx::query("DELETE FROM cache WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to delete the cache entry '{key}'"))?;
        Ok(())
    }

    pub(crate) async fn clear(&self) -> Res<()> {
        sqlx::query("DELETE FROM cache")
            .execute(&self.pool)
            .await
            .context("Failed to clear the cache")?;
        Ok(())
    }
}

async fn connect(path: &Path, create: bool) -> Res<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(create);
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .with_context(|| format!("Unable to open the cache database at {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_get_delete() {
        let dir = TempDir::new().unwrap();
        let cache = Cache::init(&dir.path().join("cache.sqlite")).await.unwrap();

        let missing: Option<Cached<Vec<String>>> = cache.get("nothing").await.unwrap();
        assert!(missing.is_none());

        let before = Utc::now() - chrono::Duration::seconds(1);
        cache.save("k", &vec!["a", "b"]).await.unwrap();
        cache.save("k", &vec!["c"]).await.unwrap();
        let cached: Cached<Vec<String>> = cache.get("k").await.unwrap().unwrap();
        assert_eq!(cached.value, vec!["c".to_string()]);
        assert!(cached.saved_at >= before);

        cache.delete("k").await.unwrap();
        assert!(cache.get::<Vec<String>>("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear() {
        let dir = TempDir::new().unwrap();
        let cache = Cache::init(&dir.path().join("cache.sqlite")).await.unwrap();
        cache.save(ALL_MONTHS_KEY, &1).await.unwrap();
        cache.save(LOCAL_LEDGER_KEY, &2).await.unwrap();
        cache.clear().await.unwrap();
        assert!(cache.get::<i32>(ALL_MONTHS_KEY).await.unwrap().is_none());
        assert!(cache.get::<i32>(LOCAL_LEDGER_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.sqlite");
        {
            let cache = Cache::init(&path).await.unwrap();
            let mut map = BTreeMap::new();
            map.insert("May 2024".to_string(), 3);
            cache.save("months", &map).await.unwrap();
            cache.pool.close().await;
        }
        let cache = Cache::load(&path).await.unwrap();
        let cached: Cached<BTreeMap<String, i32>> = cache.get("months").await.unwrap().unwrap();
        assert_eq!(cached.value.get("May 2024"), Some(&3));
        assert!(Cache::init(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_load_missing() {
        let dir = TempDir::new().unwrap();
        assert!(Cache::load(&dir.path().join("nope.sqlite")).await.is_err());
    }

    #[tokio::test]
    async fn test_malformed_entry() {
        let dir = TempDir::new().unwrap();
        let cache = Cache::init(&dir.path().join("cache.sqlite")).await.unwrap();
        cache.save("k", &"text").await.unwrap();
        assert!(cache.get::<Vec<i32>>("k").await.is_err());
    }
}
