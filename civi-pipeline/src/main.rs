//! CIVI pipeline - command line entry point
//!
//! Seeds the catalog, imports and fetches raw observations, runs the
//! normalization/aggregation pipeline and exports static documents.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use civi_common::catalog::{default_definitions, MILITARY_EXPENDITURE_PER_CAPITA};
use civi_common::config::{RootFolderInitializer, RootFolderResolver, TomlConfig};
use civi_common::db::{self, RunStatus};
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use civi_pipeline::confidence::ConfidenceEstimator;
use civi_pipeline::derived::DERIVED_INPUTS;
use civi_pipeline::exporter::{CountryDirectory, ExportOptions};
use civi_pipeline::sources::{JsonFileSource, ObservationSource, WorldBankSource};
use civi_pipeline::workflow;

/// Runs listed by `status`
const RECENT_RUNS: i64 = 5;

/// Command-line arguments for civi-pipeline
#[derive(Parser, Debug)]
#[command(name = "civi-pipeline")]
#[command(about = "Critical Infrastructure Vitals Index batch pipeline")]
#[command(version)]
struct Args {
    /// Root folder holding the database
    #[arg(short, long, global = true)]
    root_folder: Option<PathBuf>,

    /// Path to a TOML config file
    #[arg(short, long, global = true, env = "CIVI_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Insert the built-in metric catalog
    SeedCatalog {
        /// Clear raw observations, derived data and the catalog first
        #[arg(long)]
        reset: bool,
    },

    /// Import raw observations from a JSON file
    Ingest {
        file: PathBuf,
    },

    /// Fetch World Bank indicators of the catalog
    Fetch {
        #[arg(long)]
        start_year: Option<i32>,

        #[arg(long)]
        end_year: Option<i32>,

        /// Limit the fetch to these metric ids
        #[arg(long = "metric")]
        metrics: Vec<String>,
    },

    /// Normalize, aggregate, publish and export
    Run {
        /// Reference year for confidence (default: latest year with data)
        #[arg(long)]
        as_of_year: Option<i32>,

        #[arg(long)]
        export_dir: Option<PathBuf>,

        /// Publish without writing export files
        #[arg(long)]
        no_export: bool,
    },

    /// Rebuild export files from the active generation
    Export {
        #[arg(long)]
        as_of_year: Option<i32>,

        #[arg(long)]
        export_dir: Option<PathBuf>,
    },

    /// Report per-metric data coverage
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("civi_pipeline={0},civi_common={0}", config.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let root_folder = RootFolderResolver::new("civi-pipeline")
        .with_cli_override(args.root_folder.clone())
        .with_config(&config)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to create root folder")?;

    let pool = db::init_database(&initializer.database_path())
        .await
        .context("Failed to open database")?;

    match args.command {
        Command::SeedCatalog { reset } => seed_catalog(&pool, reset).await,
        Command::Ingest { file } => ingest(&pool, file).await,
        Command::Fetch {
            start_year,
            end_year,
            metrics,
        } => {
            let start_year = start_year.unwrap_or(config.fetch.start_year);
            let end_year = end_year.unwrap_or(config.fetch.end_year);
            fetch(&pool, start_year, end_year, metrics).await
        }
        Command::Run {
            as_of_year,
            export_dir,
            no_export,
        } => {
            let weights = config.weight_config().context("Invalid [weights] configuration")?;
            workflow::run_pipeline(&pool, &weights).await?;
            if no_export {
                info!("Export skipped (--no-export)");
                return Ok(());
            }
            export(&pool, &config, &initializer, as_of_year, export_dir).await
        }
        Command::Export {
            as_of_year,
            export_dir,
        } => export(&pool, &config, &initializer, as_of_year, export_dir).await,
        Command::Status => status(&pool).await,
    }
}

async fn seed_catalog(pool: &SqlitePool, reset: bool) -> Result<()> {
    let definitions = default_definitions();
    let inserted = if reset {
        warn!("Resetting catalog: raw observations and derived data will be removed");
        db::reset_catalog(pool, &definitions).await?
    } else {
        db::insert_definitions(pool, &definitions).await?
    };
    info!(
        "Catalog seeded: {} added, {} already present",
        inserted,
        definitions.len() as u64 - inserted
    );
    Ok(())
}

async fn ingest(pool: &SqlitePool, file: PathBuf) -> Result<()> {
    let source = JsonFileSource::new(&file);
    let report = source.fetch(&[]).await;
    if report.observations.is_empty() && !report.failures.is_empty() {
        bail!("Nothing imported from {}", file.display());
    }

    let written = db::upsert_observations(pool, &report.observations)
        .await
        .context("Failed to store observations")?;
    info!(
        "Ingested {} observations from {} ({} rejected)",
        written,
        file.display(),
        report.rejected
    );
    Ok(())
}

async fn fetch(pool: &SqlitePool, start_year: i32, end_year: i32, metrics: Vec<String>) -> Result<()> {
    let metric_ids = if metrics.is_empty() {
        let catalog = workflow::load_required_catalog(pool).await?;
        let mut ids: Vec<String> = catalog
            .iter()
            .filter(|m| {
                m.source.as_deref() == Some("World Bank")
                    && m.metric_id.contains('.')
                    && m.metric_id != MILITARY_EXPENDITURE_PER_CAPITA
            })
            .map(|m| m.metric_id.clone())
            .collect();
        ids.extend(DERIVED_INPUTS.iter().map(|id| id.to_string()));
        ids
    } else {
        metrics
    };

    let source = WorldBankSource::new(start_year, end_year)?;
    info!(
        "Fetching {} indicators from {} for {}-{}",
        metric_ids.len(),
        source.name(),
        start_year,
        end_year
    );
    let report = source.fetch(&metric_ids).await;

    let written = db::upsert_observations(pool, &report.observations)
        .await
        .context("Failed to store observations")?;
    info!(
        "Fetch complete: {} observations stored, {} rejected, {} indicators failed",
        written,
        report.rejected,
        report.failures.len()
    );
    Ok(())
}

async fn export(
    pool: &SqlitePool,
    config: &TomlConfig,
    initializer: &RootFolderInitializer,
    as_of_year: Option<i32>,
    export_dir: Option<PathBuf>,
) -> Result<()> {
    let options = ExportOptions {
        output_dir: export_dir.unwrap_or_else(|| initializer.export_dir(&config.export)),
        source_version: config.export.source_version.clone(),
        as_of_year,
        estimator: ConfidenceEstimator::new(config.confidence.decay_per_year),
    };
    let directory = CountryDirectory::load_or_default(config.export.country_codes_path.as_deref());

    workflow::export_active(pool, &directory, &options).await?;
    Ok(())
}

async fn status(pool: &SqlitePool) -> Result<()> {
    let catalog = db::load_catalog(pool).await?;
    let coverage = db::raw_coverage(pool).await?;
    let normalized = db::normalized_counts(pool).await?;

    println!("{:<24} {:>8} {:>11} {:>7}  {}", "METRIC", "RAW", "NORMALIZED", "LATEST", "NAME");
    let mut with_data = 0;
    for metric in catalog.iter() {
        let raw = coverage.iter().find(|c| c.metric_id == metric.metric_id);
        let raw_rows = raw.map(|c| c.observations).unwrap_or(0);
        if raw_rows > 0 {
            with_data += 1;
        }
        println!(
            "{:<24} {:>8} {:>11} {:>7}  {}",
            metric.metric_id,
            raw_rows,
            normalized.get(&metric.metric_id).copied().unwrap_or(0),
            raw.and_then(|c| c.latest_year)
                .map(|y| y.to_string())
                .unwrap_or_else(|| "-".to_string()),
            metric.name
        );
    }

    println!();
    println!("{} of {} catalog metrics have raw data", with_data, catalog.len());
    match db::active_run(pool).await? {
        Some(run) => println!(
            "Active generation: {} (published {})",
            run.run_id,
            run.finished_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "-".to_string())
        ),
        None => println!("Active generation: none"),
    }

    let runs = db::recent_runs(pool, RECENT_RUNS).await?;
    if !runs.is_empty() {
        println!();
        println!("Recent runs:");
        for run in runs {
            println!(
                "  {}  {:<9}  started {}  {} records, {} normalized, {} skipped",
                run.run_id,
                run.status,
                run.started_at.to_rfc3339(),
                run.records_processed,
                run.metrics_normalized,
                run.metrics_skipped
            );
            if let Some(notes) = run.notes.filter(|_| run.status == RunStatus::Failed) {
                println!("    {}", notes);
            }
        }
    }
    Ok(())
}
