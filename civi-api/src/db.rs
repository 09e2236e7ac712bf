//! Read-only store access

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::path::Path;

/// Connect to the CIVI database in read-only mode
///
/// The pipeline owns the schema; a missing file means it has never run.
pub async fn connect_readonly(db_path: &Path) -> Result<SqlitePool> {
    if !db_path.exists() {
        anyhow::bail!(
            "Database not found: {}\nRun `civi-pipeline seed-catalog` and `civi-pipeline run` first.",
            db_path.display()
        );
    }

    let db_url = format!("sqlite://{}?mode=ro", db_path.display());

    SqlitePool::connect(&db_url)
        .await
        .context("Failed to connect to database in read-only mode")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_database_is_reported() {
        let temp = tempfile::tempdir().unwrap();
        let result = connect_readonly(&temp.path().join("civi.db")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_readonly_connection_rejects_writes() {
        let temp = tempfile::tempdir().unwrap();
        let db_path = temp.path().join("civi.db");
        civi_common::db::init_database(&db_path).await.unwrap().close().await;

        let pool = connect_readonly(&db_path).await.unwrap();
        let result = sqlx::query("CREATE TABLE _test (id INTEGER)")
            .execute(&pool)
            .await;

        assert!(result.is_err(), "Write operation should fail in read-only mode");
    }
}
