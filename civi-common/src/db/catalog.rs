//! Metric catalog persistence

use crate::catalog::{Directionality, MetricCatalog, MetricDefinition};
use crate::taxonomy::{Industry, Pillar};
use crate::Result;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::{info, warn};

/// Load the catalog
///
/// Rows whose industry, pillar or directionality do not parse are skipped
/// with a warning; their observations will then be treated as unknown.
pub async fn load_catalog(pool: &SqlitePool) -> Result<MetricCatalog> {
    let rows = sqlx::query(
        r#"
        SELECT metric_id, name, description, industry, pillar, directionality,
               units, source, source_url
        FROM metrics_catalog
        ORDER BY metric_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut catalog = MetricCatalog::new();
    for row in rows {
        let metric_id: String = row.get("metric_id");
        let industry: String = row.get("industry");
        let pillar: String = row.get("pillar");
        let directionality: String = row.get("directionality");

        let parsed = (
            industry.parse::<Industry>(),
            pillar.parse::<Pillar>(),
            directionality.parse::<Directionality>(),
        );
        let (industry, pillar, directionality) = match parsed {
            (Ok(i), Ok(p), Ok(d)) => (i, p, d),
            (i, p, d) => {
                let reason = [i.err(), p.err(), d.err()]
                    .into_iter()
                    .flatten()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; ");
                warn!("Skipping catalog entry {}: {}", metric_id, reason);
                continue;
            }
        };

        catalog.insert(MetricDefinition {
            metric_id,
            name: row.get("name"),
            description: row.get("description"),
            industry,
            pillar,
            directionality,
            units: row.get("units"),
            source: row.get("source"),
            source_url: row.get("source_url"),
        });
    }

    Ok(catalog)
}

/// Insert definitions that are not yet present; existing ids are left untouched
///
/// Returns the number of rows inserted.
pub async fn insert_definitions(pool: &SqlitePool, definitions: &[MetricDefinition]) -> Result<u64> {
    let mut tx = pool.begin().await?;
    let inserted = insert_definitions_tx(&mut tx, definitions).await?;
    tx.commit().await?;
    Ok(inserted)
}

async fn insert_definitions_tx(
    tx: &mut Transaction<'_, Sqlite>,
    definitions: &[MetricDefinition],
) -> Result<u64> {
    let mut inserted = 0;
    for definition in definitions {
        let result = sqlx::query(
            r#"
            INSERT INTO metrics_catalog
                (metric_id, name, description, industry, pillar, directionality, units, source, source_url)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(metric_id) DO NOTHING
            "#,
        )
        .bind(&definition.metric_id)
        .bind(&definition.name)
        .bind(&definition.description)
        .bind(definition.industry.as_str())
        .bind(definition.pillar.as_str())
        .bind(definition.directionality.as_str())
        .bind(&definition.units)
        .bind(&definition.source)
        .bind(&definition.source_url)
        .execute(&mut **tx)
        .await?;
        inserted += result.rows_affected();
    }
    Ok(inserted)
}

/// Full catalog reset
///
/// Clears raw observations, every derived generation, run records and the
/// catalog itself, then inserts `definitions`. Runs in one transaction.
pub async fn reset_catalog(pool: &SqlitePool, definitions: &[MetricDefinition]) -> Result<u64> {
    let mut tx = pool.begin().await?;
    for table in [
        "metrics_raw",
        "metrics_normalized",
        "normalization_log",
        "pillar_scores",
        "industry_scores",
        "country_scores",
        "country_pillar_scores",
        "active_generation",
        "pipeline_runs",
        "metrics_catalog",
    ] {
        sqlx::query(&format!("DELETE FROM {}", table))
            .execute(&mut *tx)
            .await?;
    }
    let inserted = insert_definitions_tx(&mut tx, definitions).await?;
    tx.commit().await?;

    info!("Catalog reset: {} metrics inserted", inserted);
    Ok(inserted)
}
