//! Pipeline runs and generation swap for derived tables
//!
//! A run stages every derived row under its own run id. Readers only see
//! rows whose run id matches `active_generation`, so staged rows stay
//! invisible until [`publish_run`] moves the pointer. Publishing also drops
//! every other generation in the same transaction.

use crate::observation::{
    CountryPillarScore, CountryScore, IndustryScore, NormalizationLogEntry, NormalizedObservation,
    PillarScore,
};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};
use uuid::Uuid;

/// Derived tables, all keyed by run_id
pub const DERIVED_TABLES: [&str; 6] = [
    "metrics_normalized",
    "normalization_log",
    "pillar_scores",
    "industry_scores",
    "country_scores",
    "country_pillar_scores",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Published,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Published => "published",
            RunStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "running" => Ok(RunStatus::Running),
            "published" => Ok(RunStatus::Published),
            "failed" => Ok(RunStatus::Failed),
            other => Err(Error::Internal(format!("Unknown run status: {}", other))),
        }
    }
}

/// Row of `pipeline_runs`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub records_processed: i64,
    pub metrics_normalized: i64,
    pub metrics_skipped: i64,
    pub notes: Option<String>,
}

/// Counters recorded when a run is published
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunCounts {
    pub records_processed: i64,
    pub metrics_normalized: i64,
    pub metrics_skipped: i64,
    pub notes: Option<String>,
}

/// Score rows staged together for one run
#[derive(Debug, Clone, Copy)]
pub struct StagedScores<'a> {
    pub pillar_scores: &'a [PillarScore],
    pub industry_scores: &'a [IndustryScore],
    pub country_scores: &'a [CountryScore],
    pub country_pillar_scores: &'a [CountryPillarScore],
}

pub(crate) fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| Error::Internal(format!("Invalid run id {:?}: {}", raw, e)))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid timestamp {:?}: {}", raw, e)))
}

fn run_from_row(row: &SqliteRow) -> Result<RunRecord> {
    let run_id: String = row.get("run_id");
    let started_at: String = row.get("started_at");
    let finished_at: Option<String> = row.get("finished_at");
    let status: String = row.get("status");

    Ok(RunRecord {
        run_id: parse_uuid(&run_id)?,
        started_at: parse_timestamp(&started_at)?,
        finished_at: finished_at.as_deref().map(parse_timestamp).transpose()?,
        status: status.parse()?,
        records_processed: row.get("records_processed"),
        metrics_normalized: row.get("metrics_normalized"),
        metrics_skipped: row.get("metrics_skipped"),
        notes: row.get("notes"),
    })
}

/// Register a new run in `running` state
pub async fn begin_run(pool: &SqlitePool) -> Result<Uuid> {
    let run_id = Uuid::new_v4();
    sqlx::query("INSERT INTO pipeline_runs (run_id, started_at, status) VALUES (?, ?, ?)")
        .bind(run_id.to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(RunStatus::Running.as_str())
        .execute(pool)
        .await?;

    info!("Pipeline run {} started", run_id);
    Ok(run_id)
}

/// Stage normalized rows and the normalization log under `run_id`
pub async fn stage_normalization(
    pool: &SqlitePool,
    run_id: Uuid,
    observations: &[NormalizedObservation],
    log: &[NormalizationLogEntry],
) -> Result<()> {
    let run = run_id.to_string();
    let mut tx = pool.begin().await?;

    for obs in observations {
        sqlx::query(
            r#"
            INSERT INTO metrics_normalized
                (run_id, country_code, year, metric_id, normalized_value,
                 normalization_method, normalization_window)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&run)
        .bind(&obs.country_code)
        .bind(obs.year)
        .bind(&obs.metric_id)
        .bind(obs.normalized_value)
        .bind(obs.method.as_str())
        .bind(obs.window.to_string())
        .execute(&mut *tx)
        .await?;
    }

    for entry in log {
        sqlx::query(
            r#"
            INSERT INTO normalization_log
                (run_id, metric_id, normalization_method, window_start_year, window_end_year,
                 min_value, max_value, log_timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&run)
        .bind(&entry.metric_id)
        .bind(entry.method.as_str())
        .bind(entry.window_start_year)
        .bind(entry.window_end_year)
        .bind(entry.min_value)
        .bind(entry.max_value)
        .bind(entry.timestamp.to_rfc3339())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Stage all score levels under `run_id`
pub async fn stage_scores(pool: &SqlitePool, run_id: Uuid, scores: StagedScores<'_>) -> Result<()> {
    let run = run_id.to_string();
    let mut tx = pool.begin().await?;

    for score in scores.pillar_scores {
        sqlx::query(
            r#"
            INSERT INTO pillar_scores (run_id, country_code, year, industry, pillar, pillar_score)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&run)
        .bind(&score.country_code)
        .bind(score.year)
        .bind(score.industry.as_str())
        .bind(score.pillar.as_str())
        .bind(score.pillar_score)
        .execute(&mut *tx)
        .await?;
    }

    for score in scores.industry_scores {
        sqlx::query(
            r#"
            INSERT INTO industry_scores (run_id, country_code, year, industry, industry_score)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&run)
        .bind(&score.country_code)
        .bind(score.year)
        .bind(score.industry.as_str())
        .bind(score.industry_score)
        .execute(&mut *tx)
        .await?;
    }

    for score in scores.country_scores {
        sqlx::query(
            "INSERT INTO country_scores (run_id, country_code, year, country_score) VALUES (?, ?, ?, ?)",
        )
        .bind(&run)
        .bind(&score.country_code)
        .bind(score.year)
        .bind(score.country_score)
        .execute(&mut *tx)
        .await?;
    }

    for score in scores.country_pillar_scores {
        sqlx::query(
            r#"
            INSERT INTO country_pillar_scores (run_id, country_code, year, pillar, score)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&run)
        .bind(&score.country_code)
        .bind(score.year)
        .bind(score.pillar.as_str())
        .bind(score.score)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Make `run_id` the active generation
///
/// Moves the pointer, deletes every other generation's derived rows and
/// marks the run published, all in one transaction.
pub async fn publish_run(pool: &SqlitePool, run_id: Uuid, counts: &RunCounts) -> Result<()> {
    let run = run_id.to_string();
    let now = Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        r#"
        UPDATE pipeline_runs
        SET status = ?, finished_at = ?, records_processed = ?, metrics_normalized = ?,
            metrics_skipped = ?, notes = ?
        WHERE run_id = ? AND status = ?
        "#,
    )
    .bind(RunStatus::Published.as_str())
    .bind(&now)
    .bind(counts.records_processed)
    .bind(counts.metrics_normalized)
    .bind(counts.metrics_skipped)
    .bind(&counts.notes)
    .bind(&run)
    .bind(RunStatus::Running.as_str())
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(Error::NotFound(format!("No running pipeline run {}", run_id)));
    }

    sqlx::query(
        r#"
        INSERT INTO active_generation (id, run_id, activated_at) VALUES (1, ?, ?)
        ON CONFLICT(id) DO UPDATE SET run_id = excluded.run_id, activated_at = excluded.activated_at
        "#,
    )
    .bind(&run)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    for table in DERIVED_TABLES {
        sqlx::query(&format!("DELETE FROM {} WHERE run_id != ?", table))
            .bind(&run)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    info!("Pipeline run {} published", run_id);
    Ok(())
}

/// Mark a run failed and drop whatever it staged
///
/// The active generation is not touched.
pub async fn mark_run_failed(pool: &SqlitePool, run_id: Uuid, reason: &str) -> Result<()> {
    let run = run_id.to_string();
    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE pipeline_runs SET status = ?, finished_at = ?, notes = ? WHERE run_id = ?")
        .bind(RunStatus::Failed.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(reason)
        .bind(&run)
        .execute(&mut *tx)
        .await?;

    for table in DERIVED_TABLES {
        sqlx::query(&format!("DELETE FROM {} WHERE run_id = ?", table))
            .bind(&run)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    warn!("Pipeline run {} failed: {}", run_id, reason);
    Ok(())
}

/// Run id of the active generation, if anything has been published
pub async fn active_run_id(pool: &SqlitePool) -> Result<Option<Uuid>> {
    let row = sqlx::query("SELECT run_id FROM active_generation WHERE id = 1")
        .fetch_optional(pool)
        .await?;

    row.map(|r| parse_uuid(&r.get::<String, _>("run_id")))
        .transpose()
}

/// Run record of the active generation
pub async fn active_run(pool: &SqlitePool) -> Result<Option<RunRecord>> {
    match active_run_id(pool).await? {
        Some(run_id) => get_run(pool, run_id).await,
        None => Ok(None),
    }
}

/// Fetch one run record
pub async fn get_run(pool: &SqlitePool, run_id: Uuid) -> Result<Option<RunRecord>> {
    let row = sqlx::query(
        r#"
        SELECT run_id, started_at, finished_at, status, records_processed,
               metrics_normalized, metrics_skipped, notes
        FROM pipeline_runs
        WHERE run_id = ?
        "#,
    )
    .bind(run_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(run_from_row).transpose()
}

/// Most recent runs, newest first
pub async fn recent_runs(pool: &SqlitePool, limit: i64) -> Result<Vec<RunRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT run_id, started_at, finished_at, status, records_processed,
               metrics_normalized, metrics_skipped, notes
        FROM pipeline_runs
        ORDER BY started_at DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(run_from_row).collect()
}
