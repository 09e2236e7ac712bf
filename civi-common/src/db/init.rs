//! Database initialization
//!
//! Creates the database file and every table on first run. All statements
//! are `CREATE ... IF NOT EXISTS`, so opening an existing database is safe.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Current schema version recorded in `schema_version`
pub const SCHEMA_VERSION: i64 = 1;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets the query API keep reading while a pipeline run publishes
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create every table and index (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_metrics_catalog_table(pool).await?;
    create_metrics_raw_table(pool).await?;
    create_pipeline_runs_table(pool).await?;
    create_active_generation_table(pool).await?;

    // Derived tables, one generation per run_id
    create_metrics_normalized_table(pool).await?;
    create_normalization_log_table(pool).await?;
    create_pillar_scores_table(pool).await?;
    create_industry_scores_table(pool).await?;
    create_country_scores_table(pool).await?;
    create_country_pillar_scores_table(pool).await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_metrics_catalog_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS metrics_catalog (
            metric_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            industry TEXT NOT NULL,
            pillar TEXT NOT NULL,
            directionality TEXT NOT NULL CHECK (directionality IN ('POS', 'NEG')),
            units TEXT,
            source TEXT,
            source_url TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Raw observations, upserted by (country_code, year, metric_id)
///
/// No foreign key to the catalog: observations for unknown metrics are kept
/// and excluded (with a warning) at normalization time.
async fn create_metrics_raw_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS metrics_raw (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            country_code TEXT NOT NULL,
            year INTEGER NOT NULL,
            metric_id TEXT NOT NULL,
            metric_value REAL,
            source TEXT,
            fetched_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (country_code, year, metric_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_metrics_raw_metric ON metrics_raw(metric_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_pipeline_runs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pipeline_runs (
            run_id TEXT PRIMARY KEY,
            started_at TEXT NOT NULL,
            finished_at TEXT,
            status TEXT NOT NULL CHECK (status IN ('running', 'published', 'failed')),
            records_processed INTEGER NOT NULL DEFAULT 0,
            metrics_normalized INTEGER NOT NULL DEFAULT 0,
            metrics_skipped INTEGER NOT NULL DEFAULT 0,
            notes TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Single-row pointer at the generation readers should see
async fn create_active_generation_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS active_generation (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            run_id TEXT NOT NULL,
            activated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_metrics_normalized_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS metrics_normalized (
            run_id TEXT NOT NULL,
            country_code TEXT NOT NULL,
            year INTEGER NOT NULL,
            metric_id TEXT NOT NULL,
            normalized_value REAL NOT NULL,
            normalization_method TEXT NOT NULL,
            normalization_window TEXT NOT NULL,
            PRIMARY KEY (run_id, country_code, year, metric_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_normalization_log_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS normalization_log (
            run_id TEXT NOT NULL,
            metric_id TEXT NOT NULL,
            normalization_method TEXT NOT NULL,
            window_start_year INTEGER NOT NULL,
            window_end_year INTEGER NOT NULL,
            min_value REAL NOT NULL,
            max_value REAL NOT NULL,
            log_timestamp TEXT NOT NULL,
            PRIMARY KEY (run_id, metric_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_pillar_scores_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pillar_scores (
            run_id TEXT NOT NULL,
            country_code TEXT NOT NULL,
            year INTEGER NOT NULL,
            industry TEXT NOT NULL,
            pillar TEXT NOT NULL,
            pillar_score REAL NOT NULL,
            PRIMARY KEY (run_id, country_code, year, industry, pillar)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_industry_scores_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS industry_scores (
            run_id TEXT NOT NULL,
            country_code TEXT NOT NULL,
            year INTEGER NOT NULL,
            industry TEXT NOT NULL,
            industry_score REAL NOT NULL,
            PRIMARY KEY (run_id, country_code, year, industry)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_country_scores_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS country_scores (
            run_id TEXT NOT NULL,
            country_code TEXT NOT NULL,
            year INTEGER NOT NULL,
            country_score REAL NOT NULL,
            PRIMARY KEY (run_id, country_code, year)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_country_pillar_scores_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS country_pillar_scores (
            run_id TEXT NOT NULL,
            country_code TEXT NOT NULL,
            year INTEGER NOT NULL,
            pillar TEXT NOT NULL,
            score REAL NOT NULL,
            PRIMARY KEY (run_id, country_code, year, pillar)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
