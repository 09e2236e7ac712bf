//! Min-max normalization of raw observations onto a 0-100 scale
//!
//! Each metric is normalized against a single window spanning every
//! (country, year) observation of that metric, so normalized values are
//! comparable across years. NEG metrics are inverted after scaling.
//!
//! Metrics that cannot be normalized are skipped as a whole and reported in
//! [`NormalizationOutput::skipped`]; they never abort the run.

use chrono::{DateTime, Utc};
use civi_common::catalog::{Directionality, MetricCatalog};
use civi_common::observation::{
    NormalizationLogEntry, NormalizationMethod, NormalizedObservation, RawObservation, YearWindow,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};
use uuid::Uuid;

/// Identity of the run producing normalized rows
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunStamp {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

impl RunStamp {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            timestamp: Utc::now(),
        }
    }
}

/// Why a metric produced no normalized rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Every value was absent or not a finite number
    NoUsableValues,
    /// Fewer than two distinct values (min == max)
    DegenerateRange,
    /// The metric id is not in the catalog
    UnknownMetric,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::NoUsableValues => "no usable values",
            SkipReason::DegenerateRange => "degenerate range",
            SkipReason::UnknownMetric => "metric not in catalog",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedMetric {
    pub metric_id: String,
    pub reason: SkipReason,
    /// Raw observations of the metric that were dropped
    pub observations: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizationOutput {
    pub observations: Vec<NormalizedObservation>,
    pub log: Vec<NormalizationLogEntry>,
    pub skipped: Vec<SkippedMetric>,
}

impl NormalizationOutput {
    /// Number of metrics that produced a log entry
    pub fn metrics_normalized(&self) -> usize {
        self.log.len()
    }
}

/// Scale `value` into 0-100 against `[min, max]`, inverting for NEG metrics
///
/// Requires `max > min`. Works on halved operands so `max - min` stays
/// finite for ranges wider than `f64::MAX`.
pub fn scale(value: f64, min: f64, max: f64, directionality: Directionality) -> f64 {
    let (value, min, max) = (value * 0.5, min * 0.5, max * 0.5);
    let scaled = ((value - min) / (max - min) * 100.0).clamp(0.0, 100.0);
    match directionality {
        Directionality::Pos => scaled,
        Directionality::Neg => 100.0 - scaled,
    }
}

/// Normalize every metric present in `raw`
///
/// Duplicate (country, year, metric) keys resolve last-write-wins, matching
/// the store's upsert semantics. Output is ordered by metric, country, year.
pub fn normalize(raw: &[RawObservation], catalog: &MetricCatalog, run: RunStamp) -> NormalizationOutput {
    let mut by_metric: BTreeMap<&str, BTreeMap<(&str, i32), Option<f64>>> = BTreeMap::new();
    for obs in raw {
        by_metric
            .entry(obs.metric_id.as_str())
            .or_default()
            .insert((obs.country_code.as_str(), obs.year), obs.usable_value());
    }

    let mut output = NormalizationOutput::default();

    for (metric_id, cells) in by_metric {
        let skip = |reason: SkipReason| SkippedMetric {
            metric_id: metric_id.to_string(),
            reason,
            observations: cells.len(),
        };

        let Some(definition) = catalog.get(metric_id) else {
            warn!(
                "Skipping metric {}: not in catalog ({} observations excluded)",
                metric_id,
                cells.len()
            );
            output.skipped.push(skip(SkipReason::UnknownMetric));
            continue;
        };

        let usable: Vec<((&str, i32), f64)> = cells
            .iter()
            .filter_map(|(key, value)| value.map(|v| (*key, v)))
            .collect();

        let excluded = cells.len() - usable.len();
        if excluded > 0 {
            debug!("Metric {}: {} absent or non-numeric values excluded", metric_id, excluded);
        }

        if usable.is_empty() {
            warn!("Skipping metric {}: no usable values", metric_id);
            output.skipped.push(skip(SkipReason::NoUsableValues));
            continue;
        }

        let (min_value, max_value) = usable
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (_, v)| (lo.min(*v), hi.max(*v)));

        if min_value == max_value {
            warn!(
                "Skipping metric {}: degenerate range (all {} values equal {})",
                metric_id,
                usable.len(),
                min_value
            );
            output.skipped.push(skip(SkipReason::DegenerateRange));
            continue;
        }

        let (start_year, end_year) = usable
            .iter()
            .fold((i32::MAX, i32::MIN), |(lo, hi), ((_, year), _)| (lo.min(*year), hi.max(*year)));
        let window = YearWindow { start_year, end_year };

        for ((country_code, year), value) in &usable {
            output.observations.push(NormalizedObservation {
                country_code: country_code.to_string(),
                year: *year,
                metric_id: metric_id.to_string(),
                normalized_value: scale(*value, min_value, max_value, definition.directionality),
                method: NormalizationMethod::MinMax,
                window,
            });
        }

        output.log.push(NormalizationLogEntry {
            metric_id: metric_id.to_string(),
            run_id: run.run_id,
            method: NormalizationMethod::MinMax,
            window_start_year: start_year,
            window_end_year: end_year,
            min_value,
            max_value,
            timestamp: run.timestamp,
        });

        debug!(
            "Normalized {}: {} rows, window {}, range [{}, {}]",
            metric_id,
            usable.len(),
            window,
            min_value,
            max_value
        );
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use civi_common::catalog::MetricDefinition;
    use civi_common::{Industry, Pillar};

    fn definition(id: &str, directionality: Directionality) -> MetricDefinition {
        MetricDefinition {
            metric_id: id.to_string(),
            name: id.to_string(),
            description: None,
            industry: Industry::Energy,
            pillar: Pillar::Effectiveness,
            directionality,
            units: None,
            source: None,
            source_url: None,
        }
    }

    fn obs(country: &str, year: i32, metric: &str, value: Option<f64>) -> RawObservation {
        RawObservation {
            country_code: country.to_string(),
            year,
            metric_id: metric.to_string(),
            value,
            source: None,
        }
    }

    fn stamp() -> RunStamp {
        RunStamp::new(Uuid::new_v4())
    }

    fn value_for(output: &NormalizationOutput, country: &str, year: i32) -> Option<f64> {
        output
            .observations
            .iter()
            .find(|o| o.country_code == country && o.year == year)
            .map(|o| o.normalized_value)
    }

    #[test]
    fn test_pos_metric_min_maps_to_zero() {
        let catalog = MetricCatalog::from_definitions([definition("ACCESS", Directionality::Pos)]).unwrap();
        let raw = vec![
            obs("USA", 2020, "ACCESS", Some(100.0)),
            obs("TLS", 2020, "ACCESS", Some(20.0)),
            obs("FRA", 2020, "ACCESS", Some(60.0)),
        ];

        let output = normalize(&raw, &catalog, stamp());
        assert_eq!(value_for(&output, "USA", 2020), Some(100.0));
        assert_eq!(value_for(&output, "TLS", 2020), Some(0.0));
        assert_eq!(value_for(&output, "FRA", 2020), Some(50.0));
    }

    #[test]
    fn test_neg_metric_is_inverted() {
        let catalog = MetricCatalog::from_definitions([definition("LOSS", Directionality::Neg)]).unwrap();
        let raw = vec![
            obs("USA", 2020, "LOSS", Some(5.0)),
            obs("TLS", 2020, "LOSS", Some(25.0)),
            obs("FRA", 2020, "LOSS", Some(10.0)),
        ];

        let output = normalize(&raw, &catalog, stamp());
        assert_eq!(value_for(&output, "USA", 2020), Some(100.0));
        assert_eq!(value_for(&output, "TLS", 2020), Some(0.0));
        assert_eq!(value_for(&output, "FRA", 2020), Some(75.0));
    }

    #[test]
    fn test_window_is_global_across_years() {
        let catalog = MetricCatalog::from_definitions([definition("M", Directionality::Pos)]).unwrap();
        let raw = vec![
            obs("USA", 2019, "M", Some(10.0)),
            obs("USA", 2021, "M", Some(30.0)),
            obs("TLS", 2020, "M", Some(20.0)),
        ];

        let output = normalize(&raw, &catalog, stamp());
        assert_eq!(value_for(&output, "USA", 2019), Some(0.0));
        assert_eq!(value_for(&output, "TLS", 2020), Some(50.0));
        assert_eq!(value_for(&output, "USA", 2021), Some(100.0));

        assert_eq!(output.log.len(), 1);
        let entry = &output.log[0];
        assert_eq!((entry.window_start_year, entry.window_end_year), (2019, 2021));
        assert_eq!((entry.min_value, entry.max_value), (10.0, 30.0));
        assert_eq!(entry.method, NormalizationMethod::MinMax);
        assert!(output
            .observations
            .iter()
            .all(|o| o.window == YearWindow { start_year: 2019, end_year: 2021 }));
    }

    #[test]
    fn test_degenerate_range_is_skipped() {
        let catalog = MetricCatalog::from_definitions([
            definition("FLAT", Directionality::Pos),
            definition("OK", Directionality::Pos),
        ])
        .unwrap();
        let raw = vec![
            obs("USA", 2020, "FLAT", Some(7.0)),
            obs("TLS", 2020, "FLAT", Some(7.0)),
            obs("USA", 2020, "OK", Some(1.0)),
            obs("TLS", 2020, "OK", Some(2.0)),
        ];

        let output = normalize(&raw, &catalog, stamp());
        assert!(output.observations.iter().all(|o| o.metric_id == "OK"));
        assert!(output.log.iter().all(|l| l.metric_id == "OK"));
        assert_eq!(
            output.skipped,
            vec![SkippedMetric {
                metric_id: "FLAT".to_string(),
                reason: SkipReason::DegenerateRange,
                observations: 2,
            }]
        );
    }

    #[test]
    fn test_single_value_is_degenerate() {
        let catalog = MetricCatalog::from_definitions([definition("ONE", Directionality::Pos)]).unwrap();
        let output = normalize(&[obs("USA", 2020, "ONE", Some(3.0))], &catalog, stamp());
        assert!(output.observations.is_empty());
        assert_eq!(output.skipped[0].reason, SkipReason::DegenerateRange);
    }

    #[test]
    fn test_absent_and_nan_values_excluded() {
        let catalog = MetricCatalog::from_definitions([
            definition("M", Directionality::Pos),
            definition("EMPTY", Directionality::Pos),
        ])
        .unwrap();
        let raw = vec![
            obs("USA", 2020, "M", Some(10.0)),
            obs("TLS", 2020, "M", Some(f64::NAN)),
            obs("FRA", 2020, "M", None),
            obs("DEU", 2020, "M", Some(20.0)),
            obs("USA", 2020, "EMPTY", None),
            obs("TLS", 2020, "EMPTY", Some(f64::NAN)),
        ];

        let output = normalize(&raw, &catalog, stamp());
        assert_eq!(output.observations.len(), 2);
        assert_eq!(value_for(&output, "TLS", 2020), None);
        assert_eq!(value_for(&output, "FRA", 2020), None);
        assert_eq!(output.log[0].min_value, 10.0);
        assert_eq!(output.skipped[0].metric_id, "EMPTY");
        assert_eq!(output.skipped[0].reason, SkipReason::NoUsableValues);
    }

    #[test]
    fn test_unknown_metric_excluded() {
        let catalog = MetricCatalog::from_definitions([definition("M", Directionality::Pos)]).unwrap();
        let raw = vec![
            obs("USA", 2020, "M", Some(1.0)),
            obs("TLS", 2020, "M", Some(2.0)),
            obs("USA", 2020, "ROGUE", Some(5.0)),
        ];

        let output = normalize(&raw, &catalog, stamp());
        assert!(output.observations.iter().all(|o| o.metric_id == "M"));
        assert_eq!(output.skipped[0].reason, SkipReason::UnknownMetric);
    }

    #[test]
    fn test_duplicate_keys_last_write_wins() {
        let catalog = MetricCatalog::from_definitions([definition("M", Directionality::Pos)]).unwrap();
        let raw = vec![
            obs("USA", 2020, "M", Some(999.0)),
            obs("TLS", 2020, "M", Some(0.0)),
            obs("USA", 2020, "M", Some(10.0)),
        ];

        let output = normalize(&raw, &catalog, stamp());
        assert_eq!(output.observations.len(), 2);
        assert_eq!(output.log[0].max_value, 10.0);
    }

    #[test]
    fn test_range_invariant_and_idempotence() {
        let catalog = MetricCatalog::from_definitions([
            definition("A", Directionality::Pos),
            definition("B", Directionality::Neg),
        ])
        .unwrap();
        let raw: Vec<RawObservation> = (0..40)
            .map(|i| {
                let metric = if i % 2 == 0 { "A" } else { "B" };
                let country = ["USA", "TLS", "FRA", "BRA", "IND"][i % 5];
                obs(country, 2015 + (i / 5) as i32, metric, Some((i as f64 * 37.3) % 91.7 - 12.0))
            })
            .collect();

        let run = stamp();
        let first = normalize(&raw, &catalog, run);
        let second = normalize(&raw, &catalog, run);
        assert_eq!(first, second);
        assert!(first
            .observations
            .iter()
            .all(|o| (0.0..=100.0).contains(&o.normalized_value)));
    }

    #[test]
    fn test_scale_clamps_and_inverts() {
        assert_eq!(scale(5.0, 0.0, 10.0, Directionality::Pos), 50.0);
        assert_eq!(scale(2.0, 0.0, 10.0, Directionality::Neg), 80.0);
        assert_eq!(scale(10.0, 0.0, 10.0, Directionality::Neg), 0.0);
    }

    #[test]
    fn test_range_wider_than_f64_max_stays_in_bounds() {
        let catalog = MetricCatalog::from_definitions([definition("WIDE", Directionality::Pos)]).unwrap();
        let raw = vec![
            obs("USA", 2020, "WIDE", Some(1e308)),
            obs("TLS", 2020, "WIDE", Some(-1e308)),
            obs("FRA", 2020, "WIDE", Some(0.0)),
        ];

        let output = normalize(&raw, &catalog, stamp());
        assert_eq!(value_for(&output, "USA", 2020), Some(100.0));
        assert_eq!(value_for(&output, "FRA", 2020), Some(50.0));
        assert_eq!(value_for(&output, "TLS", 2020), Some(0.0));
        assert_eq!(scale(f64::MAX, -f64::MAX, f64::MAX, Directionality::Neg), 0.0);
    }
}
