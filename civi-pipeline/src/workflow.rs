//! Pipeline run orchestration
//!
//! derive -> normalize -> aggregate -> stage -> publish. All computation
//! happens in memory before anything is staged, and staged rows only become
//! visible at publish, so a failed run leaves the previous generation in
//! place.

use anyhow::{bail, Context, Result};
use civi_common::catalog::{default_definitions, MetricCatalog, MILITARY_EXPENDITURE_PER_CAPITA};
use civi_common::db::{self, RunCounts, StagedScores};
use civi_common::WeightConfig;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aggregator::{aggregate, AggregationOutput};
use crate::derived::{military_expenditure_per_capita, DERIVED_INPUTS};
use crate::exporter::{self, CountryDirectory, ExportOptions, ExportSummary, ScoreSnapshot};
use crate::normalizer::{normalize, NormalizationOutput, RunStamp, SkippedMetric};

/// Outcome of one published run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub records_processed: usize,
    pub derived_records: usize,
    pub metrics_normalized: usize,
    pub skipped: Vec<SkippedMetric>,
    pub normalized_rows: usize,
    pub pillar_rows: usize,
    pub industry_rows: usize,
    pub country_rows: usize,
    pub country_pillar_rows: usize,
    pub excluded_observations: usize,
}

impl RunSummary {
    fn new(
        run_id: Uuid,
        records_processed: usize,
        derived_records: usize,
        normalization: &NormalizationOutput,
        aggregation: &AggregationOutput,
    ) -> Self {
        Self {
            run_id,
            records_processed,
            derived_records,
            metrics_normalized: normalization.metrics_normalized(),
            skipped: normalization.skipped.clone(),
            normalized_rows: normalization.observations.len(),
            pillar_rows: aggregation.pillar_scores.len(),
            industry_rows: aggregation.industry_scores.len(),
            country_rows: aggregation.country_scores.len(),
            country_pillar_rows: aggregation.country_pillar_scores.len(),
            excluded_observations: aggregation.excluded_total(),
        }
    }

    fn counts(&self) -> RunCounts {
        let notes = (!self.skipped.is_empty()).then(|| {
            self.skipped
                .iter()
                .map(|s| format!("{}: {}", s.metric_id, s.reason))
                .collect::<Vec<_>>()
                .join("; ")
        });
        RunCounts {
            records_processed: self.records_processed as i64,
            metrics_normalized: self.metrics_normalized as i64,
            metrics_skipped: self.skipped.len() as i64,
            notes,
        }
    }
}

/// Insert catalog entries of derived metrics that are missing
async fn ensure_derived_definitions(pool: &SqlitePool) -> Result<()> {
    let derived: Vec<_> = default_definitions()
        .into_iter()
        .filter(|d| d.metric_id == MILITARY_EXPENDITURE_PER_CAPITA)
        .collect();
    let inserted = db::insert_definitions(pool, &derived)
        .await
        .context("Failed to ensure derived metric definitions")?;
    if inserted > 0 {
        info!("Added {} derived metric definitions to the catalog", inserted);
    }
    Ok(())
}

/// Recompute derived raw metrics, returning the number of rows written
pub async fn refresh_derived_metrics(pool: &SqlitePool) -> Result<usize> {
    ensure_derived_definitions(pool).await?;

    let mut inputs = Vec::new();
    for metric_id in DERIVED_INPUTS {
        inputs.extend(
            db::load_metric_observations(pool, metric_id)
                .await
                .with_context(|| format!("Failed to load {}", metric_id))?,
        );
    }

    let derived = military_expenditure_per_capita(&inputs);
    if derived.is_empty() {
        debug!("No inputs for {}; clearing prior rows", MILITARY_EXPENDITURE_PER_CAPITA);
    }

    // Derived rows never outlive the inputs they came from
    db::replace_metric_observations(pool, MILITARY_EXPENDITURE_PER_CAPITA, &derived)
        .await
        .context("Failed to store derived metric")?;
    info!("Derived {} rows of {}", derived.len(), MILITARY_EXPENDITURE_PER_CAPITA);
    Ok(derived.len())
}

/// Load the catalog, refusing to run on an empty one
pub async fn load_required_catalog(pool: &SqlitePool) -> Result<MetricCatalog> {
    let catalog = db::load_catalog(pool).await.context("Failed to load metric catalog")?;
    if catalog.is_empty() {
        bail!("Metric catalog is empty; run `seed-catalog` first");
    }
    Ok(catalog)
}

/// Run the full pipeline and publish a new generation
pub async fn run_pipeline(pool: &SqlitePool, weights: &WeightConfig) -> Result<RunSummary> {
    weights.validate().context("Invalid weight configuration")?;
    load_required_catalog(pool).await?;

    let derived_records = refresh_derived_metrics(pool).await?;
    let catalog = load_required_catalog(pool).await?;

    let raw = db::load_raw_observations(pool)
        .await
        .context("Failed to load raw observations")?;
    let records_processed = raw.len();

    let (inputs, observations): (Vec<_>, Vec<_>) = raw
        .into_iter()
        .partition(|o| DERIVED_INPUTS.contains(&o.metric_id.as_str()));
    if !inputs.is_empty() {
        debug!("{} derived-input observations left out of normalization", inputs.len());
    }

    let run_id = db::begin_run(pool).await.context("Failed to register pipeline run")?;
    let normalization = normalize(&observations, &catalog, RunStamp::new(run_id));
    let aggregation = aggregate(&normalization.observations, &catalog, weights);
    let summary = RunSummary::new(run_id, records_processed, derived_records, &normalization, &aggregation);

    let published = async {
        db::stage_normalization(pool, run_id, &normalization.observations, &normalization.log).await?;
        db::stage_scores(
            pool,
            run_id,
            StagedScores {
                pillar_scores: &aggregation.pillar_scores,
                industry_scores: &aggregation.industry_scores,
                country_scores: &aggregation.country_scores,
                country_pillar_scores: &aggregation.country_pillar_scores,
            },
        )
        .await?;
        db::publish_run(pool, run_id, &summary.counts()).await
    }
    .await;

    if let Err(e) = published {
        if let Err(mark_err) = db::mark_run_failed(pool, run_id, &e.to_string()).await {
            warn!("Could not mark run {} failed: {}", run_id, mark_err);
        }
        return Err(e).context(format!("Pipeline run {} failed", run_id));
    }

    info!(
        run_id = %run_id,
        "Run complete: {} raw records, {} metrics normalized, {} skipped, {} normalized rows, \
         {} pillar / {} industry / {} country / {} country-pillar scores, {} observations excluded",
        summary.records_processed,
        summary.metrics_normalized,
        summary.skipped.len(),
        summary.normalized_rows,
        summary.pillar_rows,
        summary.industry_rows,
        summary.country_rows,
        summary.country_pillar_rows,
        summary.excluded_observations
    );

    Ok(summary)
}

/// Export the active generation
pub async fn export_active(
    pool: &SqlitePool,
    directory: &CountryDirectory,
    options: &ExportOptions,
) -> Result<ExportSummary> {
    let catalog = db::load_catalog(pool).await.context("Failed to load metric catalog")?;
    let snapshot = ScoreSnapshot::load(pool)
        .await
        .context("Failed to read the active generation")?;
    let summary = exporter::export(&snapshot, &catalog, directory, options)
        .with_context(|| format!("Failed to export to {}", options.output_dir.display()))?;
    Ok(summary)
}
