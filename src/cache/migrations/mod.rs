//! Schema migrations for the cache database.
//!
//! Each version `NN` has two files in this directory:
//! - `migration_NN_up.sql` upgrades the schema from `NN-1` to `NN`
//! - `migration_NN_down.sql` downgrades it from `NN` back to `NN-1`

use crate::error::Res;
use anyhow::{bail, Context};
use sqlx::{Executor, SqlitePool};
use tracing::debug;

struct Migration {
    version: i32,
    up_sql: &'static str,
    down_sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    up_sql: include_str!("migration_01_up.sql"),
    down_sql: include_str!("migration_01_down.sql"),
}];

/// The schema version that this build of sheetwise expects.
pub(super) const LATEST: i32 = 1;

/// Moves the schema from `from` to `to`, one version at a time in either direction. Every step
/// runs in its own transaction together with the `schema_version` update. Nothing runs unless all
/// the steps exist.
pub(super) async fn run(pool: &SqlitePool, from: i32, to: i32) -> Res<()> {
    if from == to {
        debug!("Cache schema is at version {to}");
        return Ok(());
    }
    check_available(from, to)?;

    if from < to {
        for version in (from + 1)..=to {
            debug!("Applying cache migration {version:02} (up)");
            apply(pool, migration(version)?.up_sql, version).await?;
        }
    } else {
        for version in ((to + 1)..=from).rev() {
            debug!("Applying cache migration {version:02} (down)");
            apply(pool, migration(version)?.down_sql, version - 1).await?;
        }
    }
    Ok(())
}

fn migration(version: i32) -> Res<&'static Migration> {
    MIGRATIONS
        .iter()
        .find(|m| m.version == version)
        .with_context(|| format!("Cache migration {version} not found"))
}

async fn apply(pool: &SqlitePool, sql: &str, new_version: i32) -> Res<()> {
    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin the migration transaction")?;
    tx.execute(sql)
        .await
        .context("Failed to execute the migration SQL")?;
    sqlx::query("DELETE FROM schema_version")
        .execute(&mut *tx)
        .await
        .context("Failed to clear schema_version")?;
    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(new_version)
        .execute(&mut *tx)
        .await
        .context("Failed to write schema_version")?;
    tx.commit()
        .await
        .context("Failed to commit the migration transaction")
}

fn check_available(from: i32, to: i32) -> Res<()> {
    let (low, high) = if from < to { (from + 1, to) } else { (to + 1, from) };
    if let Some(missing) = (low..=high).find(|v| !MIGRATIONS.iter().any(|m| m.version == *v)) {
        bail!("Cache migration {missing} is required to go from version {from} to {to}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use tempfile::TempDir;

    async fn version_zero_db() -> (TempDir, SqlitePool) {
        let dir = TempDir::new().unwrap();
        let options = SqliteConnectOptions::new()
            .filename(dir.path().join("test.sqlite"))
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        sqlx::query("CREATE TABLE schema_version (version INTEGER NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO schema_version (version) VALUES (0)")
            .execute(&pool)
            .await
            .unwrap();
        (dir, pool)
    }

    async fn schema_version(pool: &SqlitePool) -> i32 {
        let row: (i32,) = sqlx::query_as("SELECT MAX(version) FROM schema_version")
            .fetch_one(pool)
            .await
            .unwrap();
        row.0
    }

    async fn has_cache_table(pool: &SqlitePool) -> bool {
        let row: (i32,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='cache'",
        )
        .fetch_one(pool)
        .await
        .unwrap();
        row.0 > 0
    }

    #[tokio::test]
    async fn test_up_then_down() {
        let (_dir, pool) = version_zero_db().await;
        run(&pool, 0, LATEST).await.unwrap();
        assert_eq!(schema_version(&pool).await, LATEST);
        assert!(has_cache_table(&pool).await);

        run(&pool, LATEST, 0).await.unwrap();
        assert_eq!(schema_version(&pool).await, 0);
        assert!(!has_cache_table(&pool).await);
    }

    #[tokio::test]
    async fn test_same_version_is_a_no_op() {
        let (_dir, pool) = version_zero_db().await;
        run(&pool, 0, 0).await.unwrap();
        assert_eq!(schema_version(&pool).await, 0);
        assert!(!has_cache_table(&pool).await);
    }

    #[test]
    fn test_check_available() {
        assert!(check_available(0, 1).is_ok());
        assert!(check_available(1, 0).is_ok());
        let message = check_available(0, 2).err().unwrap().to_string();
        assert!(message.contains("migration 2"));
    }
}
