//! Static JSON export of the active generation
//!
//! Writes one `<ISO3>.json` document per country plus `metadata.json` into
//! the export directory. Every file goes through a temp file and a rename so
//! static file servers never serve a partial document.

pub mod document;
pub mod writer;

pub use document::{build_country_document, CountryRows};
pub use writer::{remove_stale_country_files, write_json_atomic};

use chrono::Utc;
use civi_common::catalog::MetricCatalog;
use civi_common::db::{self, MetricValue, ScoreFilter};
use civi_common::observation::{CountryPillarScore, CountryScore, IndustryScore, PillarScore};
use civi_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

use crate::confidence::ConfidenceEstimator;

/// Display data for one country
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryInfo {
    pub name: String,
    pub region: String,
}

#[derive(Debug, Deserialize)]
struct CountryCodeEntry {
    #[serde(rename = "alpha-3")]
    alpha3: String,
    name: String,
    #[serde(default)]
    region: Option<String>,
}

/// ISO alpha-3 -> name/region lookup
#[derive(Debug, Clone, Default)]
pub struct CountryDirectory {
    countries: BTreeMap<String, CountryInfo>,
}

impl CountryDirectory {
    /// Load a `[{"alpha-3", "name", "region"}]` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let entries: Vec<CountryCodeEntry> = serde_json::from_str(content)?;
        let countries = entries
            .into_iter()
            .map(|entry| {
                let info = CountryInfo {
                    name: entry.name,
                    region: entry.region.unwrap_or_else(|| "Unknown".to_string()),
                };
                (entry.alpha3.to_ascii_uppercase(), info)
            })
            .collect();
        Ok(Self { countries })
    }

    /// Load from an optional path; a missing or unreadable file falls back to codes
    pub fn load_or_default(path: Option<&Path>) -> Self {
        match path {
            Some(path) => match Self::load(path) {
                Ok(directory) => directory,
                Err(e) => {
                    warn!("Country code file {} unusable, using codes as names: {}", path.display(), e);
                    Self::default()
                }
            },
            None => Self::default(),
        }
    }

    /// Name and region for `code`; unknown codes use the code as name
    pub fn lookup(&self, code: &str) -> CountryInfo {
        self.countries.get(code).cloned().unwrap_or_else(|| CountryInfo {
            name: code.to_string(),
            region: "Unknown".to_string(),
        })
    }
}

/// Every derived row of one generation
#[derive(Debug, Clone, Default)]
pub struct ScoreSnapshot {
    pub run_id: Option<Uuid>,
    pub pillar_scores: Vec<PillarScore>,
    pub industry_scores: Vec<IndustryScore>,
    pub country_scores: Vec<CountryScore>,
    pub country_pillar_scores: Vec<CountryPillarScore>,
    pub metrics: Vec<MetricValue>,
}

impl ScoreSnapshot {
    /// Read the active generation
    pub async fn load(pool: &SqlitePool) -> Result<Self> {
        let run_id = db::active_run_id(pool)
            .await?
            .ok_or_else(|| Error::NotFound("No published pipeline run".to_string()))?;
        let all = ScoreFilter::default();

        Ok(Self {
            run_id: Some(run_id),
            pillar_scores: db::pillar_scores(pool, &all).await?,
            industry_scores: db::industry_scores(pool, &all).await?,
            country_scores: db::country_scores(pool, &all).await?,
            country_pillar_scores: db::country_pillar_scores(pool, &all).await?,
            metrics: db::metric_values(pool, &all).await?,
        })
    }

    /// Most recent year with any score
    pub fn latest_year(&self) -> Option<i32> {
        self.pillar_scores.iter().map(|s| s.year).max()
    }

    /// Split rows per country
    pub fn by_country(&self) -> BTreeMap<&str, CountryRows<'_>> {
        let mut countries: BTreeMap<&str, CountryRows<'_>> = BTreeMap::new();
        for row in &self.pillar_scores {
            countries.entry(row.country_code.as_str()).or_default().pillar_scores.push(row);
        }
        for row in &self.industry_scores {
            countries.entry(row.country_code.as_str()).or_default().industry_scores.push(row);
        }
        for row in &self.country_scores {
            countries.entry(row.country_code.as_str()).or_default().country_scores.push(row);
        }
        for row in &self.country_pillar_scores {
            countries
                .entry(row.country_code.as_str())
                .or_default()
                .country_pillar_scores
                .push(row);
        }
        for row in &self.metrics {
            countries.entry(row.country_code.as_str()).or_default().metrics.push(row);
        }
        countries
    }
}

/// Export settings
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub output_dir: PathBuf,
    pub source_version: String,
    /// Reference year for confidence; defaults to the latest year in the data
    pub as_of_year: Option<i32>,
    pub estimator: ConfidenceEstimator,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportSummary {
    pub countries_written: usize,
    pub stale_files_removed: usize,
    pub as_of_year: Option<i32>,
}

/// Write every country document and `metadata.json`
pub fn export(
    snapshot: &ScoreSnapshot,
    catalog: &MetricCatalog,
    directory: &CountryDirectory,
    options: &ExportOptions,
) -> Result<ExportSummary> {
    std::fs::create_dir_all(&options.output_dir)?;

    let as_of_year = options.as_of_year.or_else(|| snapshot.latest_year());
    let countries = snapshot.by_country();
    let mut written = BTreeSet::new();

    if let Some(as_of_year) = as_of_year {
        for (code, rows) in &countries {
            let document = build_country_document(&directory.lookup(code), rows, &options.estimator, as_of_year);
            write_json_atomic(&options.output_dir.join(format!("{}.json", code)), &document)?;
            written.insert(code.to_string());
        }
    } else {
        warn!("Nothing to export: the active generation has no scores");
    }

    let metadata = serde_json::json!({
        "last_updated": Utc::now().format("%Y-%m-%d").to_string(),
        "source_version": options.source_version,
        "sources": catalog.sources(),
        "run_id": snapshot.run_id,
        "as_of_year": as_of_year,
        "countries": written,
    });
    write_json_atomic(&options.output_dir.join("metadata.json"), &metadata)?;

    let stale_files_removed = remove_stale_country_files(&options.output_dir, &written)?;

    info!(
        "Exported {} countries to {} ({} stale files removed)",
        written.len(),
        options.output_dir.display(),
        stale_files_removed
    );

    Ok(ExportSummary {
        countries_written: written.len(),
        stale_files_removed,
        as_of_year,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_country_directory_lookup() {
        let directory = CountryDirectory::from_json(
            r#"[{"alpha-3": "usa", "name": "United States of America", "region": "Americas"},
                {"alpha-3": "TLS", "name": "Timor-Leste"}]"#,
        )
        .unwrap();

        assert_eq!(directory.lookup("USA").name, "United States of America");
        assert_eq!(directory.lookup("USA").region, "Americas");
        assert_eq!(directory.lookup("TLS").region, "Unknown");
        assert_eq!(
            directory.lookup("XKX"),
            CountryInfo {
                name: "XKX".to_string(),
                region: "Unknown".to_string()
            }
        );
    }

    #[test]
    fn test_missing_directory_file_falls_back() {
        let directory = CountryDirectory::load_or_default(Some(Path::new("/nonexistent/codes.json")));
        assert_eq!(directory.lookup("FRA").name, "FRA");
    }
}
