//! Read queries over the active generation
//!
//! Every query filters on the run id held in `active_generation`; rows of
//! staged or superseded runs are never returned. Each optional filter field
//! narrows the result when set.

use crate::catalog::Directionality;
use crate::observation::{
    CountryPillarScore, CountryScore, IndustryScore, NormalizationLogEntry, NormalizationMethod,
    NormalizedObservation, PillarScore, YearWindow,
};
use crate::taxonomy::{Industry, Pillar};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;

use super::generations::parse_uuid;

const ACTIVE_RUN: &str = "(SELECT run_id FROM active_generation WHERE id = 1)";

/// Optional filters shared by the score queries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreFilter {
    pub country_code: Option<String>,
    pub year: Option<i32>,
    pub industry: Option<Industry>,
    pub pillar: Option<Pillar>,
}

impl ScoreFilter {
    pub fn country(code: &str) -> Self {
        Self {
            country_code: Some(code.to_string()),
            ..Self::default()
        }
    }

    pub fn with_year(mut self, year: Option<i32>) -> Self {
        self.year = year;
        self
    }

    pub fn with_industry(mut self, industry: Option<Industry>) -> Self {
        self.industry = industry;
        self
    }

    pub fn with_pillar(mut self, pillar: Option<Pillar>) -> Self {
        self.pillar = pillar;
        self
    }

    fn industry_key(&self) -> Option<&'static str> {
        self.industry.map(|i| i.as_str())
    }

    fn pillar_key(&self) -> Option<&'static str> {
        self.pillar.map(|p| p.as_str())
    }
}

/// Normalized value of one metric joined with its catalog entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricValue {
    pub metric_id: String,
    pub name: String,
    pub industry: Industry,
    pub pillar: Pillar,
    pub directionality: Directionality,
    pub units: Option<String>,
    pub source: Option<String>,
    pub country_code: String,
    pub year: i32,
    pub raw_value: Option<f64>,
    pub normalized_value: f64,
}

fn parse_window(raw: &str) -> Result<YearWindow> {
    let parsed = raw
        .split_once('-')
        .and_then(|(start, end)| Some((start.parse().ok()?, end.parse().ok()?)));
    match parsed {
        Some((start_year, end_year)) => Ok(YearWindow { start_year, end_year }),
        None => Err(Error::Internal(format!("Invalid normalization window: {:?}", raw))),
    }
}

fn parse_method(raw: &str) -> Result<NormalizationMethod> {
    match raw {
        "min-max" => Ok(NormalizationMethod::MinMax),
        other => Err(Error::Internal(format!("Unknown normalization method: {}", other))),
    }
}

pub async fn country_scores(pool: &SqlitePool, filter: &ScoreFilter) -> Result<Vec<CountryScore>> {
    let sql = format!(
        r#"
        SELECT country_code, year, country_score
        FROM country_scores
        WHERE run_id = {ACTIVE_RUN}
          AND (? IS NULL OR country_code = ?)
          AND (? IS NULL OR year = ?)
        ORDER BY country_code, year
        "#
    );
    let rows = sqlx::query(&sql)
        .bind(&filter.country_code)
        .bind(&filter.country_code)
        .bind(filter.year)
        .bind(filter.year)
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| CountryScore {
            country_code: row.get("country_code"),
            year: row.get("year"),
            country_score: row.get("country_score"),
        })
        .collect())
}

pub async fn industry_scores(pool: &SqlitePool, filter: &ScoreFilter) -> Result<Vec<IndustryScore>> {
    let sql = format!(
        r#"
        SELECT country_code, year, industry, industry_score
        FROM industry_scores
        WHERE run_id = {ACTIVE_RUN}
          AND (? IS NULL OR country_code = ?)
          AND (? IS NULL OR year = ?)
          AND (? IS NULL OR industry = ?)
        ORDER BY country_code, year, industry
        "#
    );
    let rows = sqlx::query(&sql)
        .bind(&filter.country_code)
        .bind(&filter.country_code)
        .bind(filter.year)
        .bind(filter.year)
        .bind(filter.industry_key())
        .bind(filter.industry_key())
        .fetch_all(pool)
        .await?;

    rows.into_iter()
        .map(|row| {
            let industry: String = row.get("industry");
            Ok(IndustryScore {
                country_code: row.get("country_code"),
                year: row.get("year"),
                industry: industry.parse()?,
                industry_score: row.get("industry_score"),
            })
        })
        .collect()
}

pub async fn pillar_scores(pool: &SqlitePool, filter: &ScoreFilter) -> Result<Vec<PillarScore>> {
    let sql = format!(
        r#"
        SELECT country_code, year, industry, pillar, pillar_score
        FROM pillar_scores
        WHERE run_id = {ACTIVE_RUN}
          AND (? IS NULL OR country_code = ?)
          AND (? IS NULL OR year = ?)
          AND (? IS NULL OR industry = ?)
          AND (? IS NULL OR pillar = ?)
        ORDER BY country_code, year, industry, pillar
        "#
    );
    let rows = sqlx::query(&sql)
        .bind(&filter.country_code)
        .bind(&filter.country_code)
        .bind(filter.year)
        .bind(filter.year)
        .bind(filter.industry_key())
        .bind(filter.industry_key())
        .bind(filter.pillar_key())
        .bind(filter.pillar_key())
        .fetch_all(pool)
        .await?;

    rows.into_iter()
        .map(|row| {
            let industry: String = row.get("industry");
            let pillar: String = row.get("pillar");
            Ok(PillarScore {
                country_code: row.get("country_code"),
                year: row.get("year"),
                industry: industry.parse()?,
                pillar: pillar.parse()?,
                pillar_score: row.get("pillar_score"),
            })
        })
        .collect()
}

pub async fn country_pillar_scores(
    pool: &SqlitePool,
    filter: &ScoreFilter,
) -> Result<Vec<CountryPillarScore>> {
    let sql = format!(
        r#"
        SELECT country_code, year, pillar, score
        FROM country_pillar_scores
        WHERE run_id = {ACTIVE_RUN}
          AND (? IS NULL OR country_code = ?)
          AND (? IS NULL OR year = ?)
          AND (? IS NULL OR pillar = ?)
        ORDER BY country_code, year, pillar
        "#
    );
    let rows = sqlx::query(&sql)
        .bind(&filter.country_code)
        .bind(&filter.country_code)
        .bind(filter.year)
        .bind(filter.year)
        .bind(filter.pillar_key())
        .bind(filter.pillar_key())
        .fetch_all(pool)
        .await?;

    rows.into_iter()
        .map(|row| {
            let pillar: String = row.get("pillar");
            Ok(CountryPillarScore {
                country_code: row.get("country_code"),
                year: row.get("year"),
                pillar: pillar.parse()?,
                score: row.get("score"),
            })
        })
        .collect()
}

/// Normalized observations of the active generation
///
/// Industry and pillar filters apply through the metric's catalog entry.
pub async fn normalized_observations(
    pool: &SqlitePool,
    filter: &ScoreFilter,
) -> Result<Vec<NormalizedObservation>> {
    let sql = format!(
        r#"
        SELECT n.country_code, n.year, n.metric_id, n.normalized_value,
               n.normalization_method, n.normalization_window
        FROM metrics_normalized n
        LEFT JOIN metrics_catalog c ON c.metric_id = n.metric_id
        WHERE n.run_id = {ACTIVE_RUN}
          AND (? IS NULL OR n.country_code = ?)
          AND (? IS NULL OR n.year = ?)
          AND (? IS NULL OR c.industry = ?)
          AND (? IS NULL OR c.pillar = ?)
        ORDER BY n.metric_id, n.country_code, n.year
        "#
    );
    let rows = sqlx::query(&sql)
        .bind(&filter.country_code)
        .bind(&filter.country_code)
        .bind(filter.year)
        .bind(filter.year)
        .bind(filter.industry_key())
        .bind(filter.industry_key())
        .bind(filter.pillar_key())
        .bind(filter.pillar_key())
        .fetch_all(pool)
        .await?;

    rows.into_iter()
        .map(|row| {
            let method: String = row.get("normalization_method");
            let window: String = row.get("normalization_window");
            Ok(NormalizedObservation {
                country_code: row.get("country_code"),
                year: row.get("year"),
                metric_id: row.get("metric_id"),
                normalized_value: row.get("normalized_value"),
                method: parse_method(&method)?,
                window: parse_window(&window)?,
            })
        })
        .collect()
}

/// Normalized values joined with catalog metadata and the raw value
pub async fn metric_values(pool: &SqlitePool, filter: &ScoreFilter) -> Result<Vec<MetricValue>> {
    let sql = format!(
        r#"
        SELECT n.metric_id, c.name, c.industry, c.pillar, c.directionality, c.units, c.source,
               n.country_code, n.year, r.metric_value AS raw_value, n.normalized_value
        FROM metrics_normalized n
        JOIN metrics_catalog c ON c.metric_id = n.metric_id
        LEFT JOIN metrics_raw r
            ON r.country_code = n.country_code AND r.year = n.year AND r.metric_id = n.metric_id
        WHERE n.run_id = {ACTIVE_RUN}
          AND (? IS NULL OR n.country_code = ?)
          AND (? IS NULL OR n.year = ?)
          AND (? IS NULL OR c.industry = ?)
          AND (? IS NULL OR c.pillar = ?)
        ORDER BY n.country_code, n.year, c.industry, c.pillar, n.metric_id
        "#
    );
    let rows = sqlx::query(&sql)
        .bind(&filter.country_code)
        .bind(&filter.country_code)
        .bind(filter.year)
        .bind(filter.year)
        .bind(filter.industry_key())
        .bind(filter.industry_key())
        .bind(filter.pillar_key())
        .bind(filter.pillar_key())
        .fetch_all(pool)
        .await?;

    rows.into_iter()
        .map(|row| {
            let industry: String = row.get("industry");
            let pillar: String = row.get("pillar");
            let directionality: String = row.get("directionality");
            Ok(MetricValue {
                metric_id: row.get("metric_id"),
                name: row.get("name"),
                industry: industry.parse()?,
                pillar: pillar.parse()?,
                directionality: directionality.parse()?,
                units: row.get("units"),
                source: row.get("source"),
                country_code: row.get("country_code"),
                year: row.get("year"),
                raw_value: row.get("raw_value"),
                normalized_value: row.get("normalized_value"),
            })
        })
        .collect()
}

/// Normalization log of the active generation
pub async fn normalization_log(pool: &SqlitePool) -> Result<Vec<NormalizationLogEntry>> {
    let sql = format!(
        r#"
        SELECT run_id, metric_id, normalization_method, window_start_year, window_end_year,
               min_value, max_value, log_timestamp
        FROM normalization_log
        WHERE run_id = {ACTIVE_RUN}
        ORDER BY metric_id
        "#
    );
    let rows = sqlx::query(&sql).fetch_all(pool).await?;

    rows.into_iter()
        .map(|row| {
            let run_id: String = row.get("run_id");
            let method: String = row.get("normalization_method");
            let timestamp: String = row.get("log_timestamp");
            let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| Error::Internal(format!("Invalid log timestamp: {}", e)))?;
            Ok(NormalizationLogEntry {
                metric_id: row.get("metric_id"),
                run_id: parse_uuid(&run_id)?,
                method: parse_method(&method)?,
                window_start_year: row.get("window_start_year"),
                window_end_year: row.get("window_end_year"),
                min_value: row.get("min_value"),
                max_value: row.get("max_value"),
                timestamp,
            })
        })
        .collect()
}

/// Normalized row count per metric in the active generation
pub async fn normalized_counts(pool: &SqlitePool) -> Result<BTreeMap<String, i64>> {
    let sql = format!(
        r#"
        SELECT metric_id, COUNT(*) AS rows_count
        FROM metrics_normalized
        WHERE run_id = {ACTIVE_RUN}
        GROUP BY metric_id
        "#
    );
    let rows = sqlx::query(&sql).fetch_all(pool).await?;

    Ok(rows
        .into_iter()
        .map(|row| (row.get("metric_id"), row.get("rows_count")))
        .collect())
}

/// Distinct years with a country score, ascending
pub async fn score_years(pool: &SqlitePool) -> Result<Vec<i32>> {
    let sql = format!(
        "SELECT DISTINCT year FROM country_scores WHERE run_id = {ACTIVE_RUN} ORDER BY year"
    );
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    Ok(rows.into_iter().map(|row| row.get("year")).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_window() {
        let window = parse_window("2019-2024").unwrap();
        assert_eq!(window, YearWindow { start_year: 2019, end_year: 2024 });
        assert!(parse_window("2019").is_err());
        assert!(parse_window("a-b").is_err());
    }

    #[test]
    fn test_filter_builders() {
        let filter = ScoreFilter::country("USA")
            .with_year(Some(2020))
            .with_industry(Some(Industry::Energy))
            .with_pillar(None);
        assert_eq!(filter.country_code.as_deref(), Some("USA"));
        assert_eq!(filter.industry_key(), Some("energy"));
        assert_eq!(filter.pillar_key(), None);
    }
}
