//! Raw observation store
//!
//! Keyed by (country_code, year, metric_id); writes are upserts with
//! last-write-wins semantics.

use crate::observation::RawObservation;
use crate::Result;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

/// Upsert observations in one transaction, returning the number written
pub async fn upsert_observations(pool: &SqlitePool, observations: &[RawObservation]) -> Result<u64> {
    let mut tx = pool.begin().await?;
    let written = upsert_observations_tx(&mut tx, observations).await?;
    tx.commit().await?;
    Ok(written)
}

async fn upsert_observations_tx(
    tx: &mut Transaction<'_, Sqlite>,
    observations: &[RawObservation],
) -> Result<u64> {
    let mut written = 0;
    for obs in observations {
        let result = sqlx::query(
            r#"
            INSERT INTO metrics_raw (country_code, year, metric_id, metric_value, source, fetched_at)
            VALUES (?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(country_code, year, metric_id) DO UPDATE SET
                metric_value = excluded.metric_value,
                source = excluded.source,
                fetched_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&obs.country_code)
        .bind(obs.year)
        .bind(&obs.metric_id)
        .bind(obs.value.filter(|v| v.is_finite()))
        .bind(&obs.source)
        .execute(&mut **tx)
        .await?;
        written += result.rows_affected();
    }
    Ok(written)
}

/// Replace every observation of one metric (used for derived metrics)
pub async fn replace_metric_observations(
    pool: &SqlitePool,
    metric_id: &str,
    observations: &[RawObservation],
) -> Result<u64> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM metrics_raw WHERE metric_id = ?")
        .bind(metric_id)
        .execute(&mut *tx)
        .await?;
    let written = upsert_observations_tx(&mut tx, observations).await?;
    tx.commit().await?;
    Ok(written)
}

/// Load every raw observation, ordered by key
pub async fn load_raw_observations(pool: &SqlitePool) -> Result<Vec<RawObservation>> {
    let rows = sqlx::query(
        r#"
        SELECT country_code, year, metric_id, metric_value, source
        FROM metrics_raw
        ORDER BY metric_id, country_code, year
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| RawObservation {
            country_code: row.get("country_code"),
            year: row.get("year"),
            metric_id: row.get("metric_id"),
            value: row.get("metric_value"),
            source: row.get("source"),
        })
        .collect())
}

/// Load the raw observations of one metric
pub async fn load_metric_observations(pool: &SqlitePool, metric_id: &str) -> Result<Vec<RawObservation>> {
    let rows = sqlx::query(
        r#"
        SELECT country_code, year, metric_id, metric_value, source
        FROM metrics_raw
        WHERE metric_id = ?
        ORDER BY country_code, year
        "#,
    )
    .bind(metric_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| RawObservation {
            country_code: row.get("country_code"),
            year: row.get("year"),
            metric_id: row.get("metric_id"),
            value: row.get("metric_value"),
            source: row.get("source"),
        })
        .collect())
}

/// Per-metric raw coverage
#[derive(Debug, Clone, PartialEq)]
pub struct RawCoverage {
    pub metric_id: String,
    pub observations: i64,
    pub countries: i64,
    pub latest_year: Option<i32>,
}

/// Raw coverage for every metric that has observations
pub async fn raw_coverage(pool: &SqlitePool) -> Result<Vec<RawCoverage>> {
    let rows = sqlx::query(
        r#"
        SELECT metric_id,
               COUNT(metric_value) AS observations,
               COUNT(DISTINCT country_code) AS countries,
               MAX(CASE WHEN metric_value IS NOT NULL THEN year END) AS latest_year
        FROM metrics_raw
        GROUP BY metric_id
        ORDER BY metric_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| RawCoverage {
            metric_id: row.get("metric_id"),
            observations: row.get("observations"),
            countries: row.get("countries"),
            latest_year: row.get("latest_year"),
        })
        .collect())
}
