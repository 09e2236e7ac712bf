//! Observation and score row types
//!
//! Shared between the pipeline (which produces them) and the query API
//! (which reads them back out of the store).

use crate::taxonomy::{Industry, Pillar};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Round a derived score to 2 decimal digits for storage
pub fn round_score(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Validate and upper-case an ISO-3166 alpha-3 country code
pub fn normalize_country_code(raw: &str) -> Result<String> {
    let code = raw.trim().to_ascii_uppercase();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code)
    } else {
        Err(Error::InvalidInput(format!("Invalid ISO-3166 alpha-3 code: {:?}", raw)))
    }
}

/// Raw indicator value as produced by a fetcher
///
/// `value` is `None` when the provider reported the (country, year) cell
/// without a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub country_code: String,
    pub year: i32,
    pub metric_id: String,
    pub value: Option<f64>,
    #[serde(default)]
    pub source: Option<String>,
}

impl RawObservation {
    /// The value if it can take part in normalization (present and finite)
    pub fn usable_value(&self) -> Option<f64> {
        self.value.filter(|v| v.is_finite())
    }
}

/// Normalization method recorded with every normalized row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormalizationMethod {
    #[serde(rename = "min-max")]
    MinMax,
}

impl NormalizationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            NormalizationMethod::MinMax => "min-max",
        }
    }
}

impl fmt::Display for NormalizationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Year range covered by a metric's normalization window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearWindow {
    pub start_year: i32,
    pub end_year: i32,
}

impl fmt::Display for YearWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start_year, self.end_year)
    }
}

/// Raw value rescaled to 0–100 with directionality applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedObservation {
    pub country_code: String,
    pub year: i32,
    pub metric_id: String,
    pub normalized_value: f64,
    pub method: NormalizationMethod,
    pub window: YearWindow,
}

/// Audit record of the parameters used to normalize one metric in one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationLogEntry {
    pub metric_id: String,
    pub run_id: Uuid,
    pub method: NormalizationMethod,
    pub window_start_year: i32,
    pub window_end_year: i32,
    pub min_value: f64,
    pub max_value: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PillarScore {
    pub country_code: String,
    pub year: i32,
    pub industry: Industry,
    pub pillar: Pillar,
    pub pillar_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndustryScore {
    pub country_code: String,
    pub year: i32,
    pub industry: Industry,
    pub industry_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryScore {
    pub country_code: String,
    pub year: i32,
    pub country_score: f64,
}

/// One pillar averaged across industries for a country
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryPillarScore {
    pub country_code: String,
    pub year: i32,
    pub pillar: Pillar,
    pub score: f64,
}
