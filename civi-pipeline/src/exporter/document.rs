//! Per-country document builder
//!
//! The "latest" view picks, per dimension, the most recent year at or before
//! `as_of_year` and attaches its confidence. `historical_scores` lists every
//! year with data as-is.

use civi_common::db::MetricValue;
use civi_common::observation::{CountryPillarScore, CountryScore, IndustryScore, PillarScore};
use civi_common::{Industry, Pillar};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use super::CountryInfo;
use crate::confidence::{ConfidenceEstimator, LatestValue};

/// Rows of one country across every derived table
#[derive(Debug, Clone, Default)]
pub struct CountryRows<'a> {
    pub pillar_scores: Vec<&'a PillarScore>,
    pub industry_scores: Vec<&'a IndustryScore>,
    pub country_scores: Vec<&'a CountryScore>,
    pub country_pillar_scores: Vec<&'a CountryPillarScore>,
    pub metrics: Vec<&'a MetricValue>,
}

impl CountryRows<'_> {
    fn industries(&self) -> BTreeSet<Industry> {
        self.pillar_scores
            .iter()
            .map(|s| s.industry)
            .chain(self.industry_scores.iter().map(|s| s.industry))
            .chain(self.metrics.iter().map(|m| m.industry))
            .collect()
    }

    fn years(&self) -> BTreeSet<i32> {
        self.pillar_scores
            .iter()
            .map(|s| s.year)
            .chain(self.country_scores.iter().map(|s| s.year))
            .collect()
    }

    fn country_history(&self) -> BTreeMap<i32, f64> {
        self.country_scores.iter().map(|s| (s.year, s.country_score)).collect()
    }

    fn country_pillar_history(&self, pillar: Pillar) -> BTreeMap<i32, f64> {
        self.country_pillar_scores
            .iter()
            .filter(|s| s.pillar == pillar)
            .map(|s| (s.year, s.score))
            .collect()
    }

    fn industry_history(&self, industry: Industry) -> BTreeMap<i32, f64> {
        self.industry_scores
            .iter()
            .filter(|s| s.industry == industry)
            .map(|s| (s.year, s.industry_score))
            .collect()
    }

    fn pillar_history(&self, industry: Industry, pillar: Pillar) -> BTreeMap<i32, f64> {
        self.pillar_scores
            .iter()
            .filter(|s| s.industry == industry && s.pillar == pillar)
            .map(|s| (s.year, s.pillar_score))
            .collect()
    }
}

/// `key`, `key_confidence` and `key_year`
fn insert_latest(map: &mut Map<String, Value>, key: &str, latest: LatestValue) {
    map.insert(key.to_string(), json!(latest.value));
    map.insert(format!("{}_confidence", key), json!(latest.confidence));
    map.insert(format!("{}_year", key), json!(latest.year));
}

/// Latest normalized value of each indicator in `industry`
fn indicators(rows: &CountryRows<'_>, industry: Industry, as_of_year: i32) -> Vec<Value> {
    let mut latest: BTreeMap<&str, &MetricValue> = BTreeMap::new();
    for metric in rows
        .metrics
        .iter()
        .copied()
        .filter(|m| m.industry == industry && m.year <= as_of_year)
    {
        let entry = latest.entry(metric.metric_id.as_str()).or_insert(metric);
        if metric.year > entry.year {
            *entry = metric;
        }
    }

    latest
        .into_values()
        .map(|m| {
            json!({
                "metric_id": m.metric_id,
                "name": m.name,
                "pillar": m.pillar,
                "year": m.year,
                "normalized_value": m.normalized_value,
                "raw_value": m.raw_value,
                "units": m.units,
                "directionality": m.directionality,
                "source": m.source,
            })
        })
        .collect()
}

fn industry_section(
    rows: &CountryRows<'_>,
    industry: Industry,
    estimator: &ConfidenceEstimator,
    as_of_year: i32,
) -> Value {
    let mut scores = Map::new();
    insert_latest(
        &mut scores,
        "industry_score",
        estimator.latest(&rows.industry_history(industry), as_of_year),
    );

    let mut pillars = Map::new();
    for pillar in Pillar::ALL {
        let latest = estimator.latest(&rows.pillar_history(industry, pillar), as_of_year);
        scores.insert(pillar.as_str().to_string(), json!(latest.value));
        pillars.insert(
            pillar.as_str().to_string(),
            json!({
                "score": latest.value,
                "year": latest.year,
                "confidence": latest.confidence,
            }),
        );
    }

    json!({
        "scores": scores,
        "pillars": pillars,
        "indicators": indicators(rows, industry, as_of_year),
    })
}

fn historical_entry(rows: &CountryRows<'_>, year: i32) -> Value {
    let mut scores = Map::new();
    for pillar in Pillar::ALL {
        let value = rows
            .country_pillar_scores
            .iter()
            .find(|s| s.year == year && s.pillar == pillar)
            .map(|s| s.score);
        scores.insert(pillar.as_str().to_string(), json!(value));
    }
    let civi_index = rows
        .country_scores
        .iter()
        .find(|s| s.year == year)
        .map(|s| s.country_score);
    scores.insert("civi_index".to_string(), json!(civi_index));

    let mut industries = Map::new();
    for industry in rows.industries() {
        let score = rows
            .industry_scores
            .iter()
            .find(|s| s.year == year && s.industry == industry)
            .map(|s| s.industry_score);
        let mut pillars = Map::new();
        for pillar in Pillar::ALL {
            let value = rows
                .pillar_scores
                .iter()
                .find(|s| s.year == year && s.industry == industry && s.pillar == pillar)
                .map(|s| s.pillar_score);
            pillars.insert(pillar.as_str().to_string(), json!(value));
        }
        if score.is_some() || pillars.values().any(|v| !v.is_null()) {
            industries.insert(
                industry.as_str().to_string(),
                json!({ "score": score, "pillars": pillars }),
            );
        }
    }

    json!({
        "year": year,
        "scores": scores,
        "industries": industries,
    })
}

/// Build the document for one country
pub fn build_country_document(
    info: &CountryInfo,
    rows: &CountryRows<'_>,
    estimator: &ConfidenceEstimator,
    as_of_year: i32,
) -> Value {
    let mut scores = Map::new();
    for pillar in Pillar::ALL {
        let latest = estimator.latest(&rows.country_pillar_history(pillar), as_of_year);
        insert_latest(&mut scores, pillar.as_str(), latest);
    }
    insert_latest(
        &mut scores,
        "civi_index",
        estimator.latest(&rows.country_history(), as_of_year),
    );

    let industries: Map<String, Value> = rows
        .industries()
        .into_iter()
        .map(|industry| {
            (
                industry.as_str().to_string(),
                industry_section(rows, industry, estimator, as_of_year),
            )
        })
        .collect();

    let historical: Vec<Value> = rows
        .years()
        .into_iter()
        .map(|year| historical_entry(rows, year))
        .collect();

    json!({
        "name": info.name,
        "region": info.region,
        "scores": scores,
        "industries": industries,
        "historical_scores": historical,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use civi_common::catalog::Directionality;

    fn pillar(year: i32, industry: Industry, pillar: Pillar, score: f64) -> PillarScore {
        PillarScore {
            country_code: "USA".to_string(),
            year,
            industry,
            pillar,
            pillar_score: score,
        }
    }

    fn info() -> CountryInfo {
        CountryInfo {
            name: "United States".to_string(),
            region: "Americas".to_string(),
        }
    }

    #[test]
    fn test_latest_view_mixes_reference_years() {
        let pillar_scores = vec![
            pillar(2021, Industry::Energy, Pillar::Autonomy, 40.0),
            pillar(2024, Industry::Energy, Pillar::Resilience, 80.0),
        ];
        let industry_scores = vec![
            IndustryScore {
                country_code: "USA".to_string(),
                year: 2021,
                industry: Industry::Energy,
                industry_score: 40.0,
            },
            IndustryScore {
                country_code: "USA".to_string(),
                year: 2024,
                industry: Industry::Energy,
                industry_score: 80.0,
            },
        ];
        let country_pillar_scores = vec![
            CountryPillarScore {
                country_code: "USA".to_string(),
                year: 2021,
                pillar: Pillar::Autonomy,
                score: 40.0,
            },
            CountryPillarScore {
                country_code: "USA".to_string(),
                year: 2024,
                pillar: Pillar::Resilience,
                score: 80.0,
            },
        ];
        let country_scores = vec![CountryScore {
            country_code: "USA".to_string(),
            year: 2024,
            country_score: 80.0,
        }];

        let rows = CountryRows {
            pillar_scores: pillar_scores.iter().collect(),
            industry_scores: industry_scores.iter().collect(),
            country_scores: country_scores.iter().collect(),
            country_pillar_scores: country_pillar_scores.iter().collect(),
            metrics: Vec::new(),
        };

        let doc = build_country_document(&info(), &rows, &ConfidenceEstimator::default(), 2024);

        assert_eq!(doc["name"], "United States");
        assert_eq!(doc["scores"]["autonomy"], 40.0);
        assert_eq!(doc["scores"]["autonomy_year"], 2021);
        assert_eq!(doc["scores"]["autonomy_confidence"], 0.7);
        assert_eq!(doc["scores"]["resilience_confidence"], 1.0);
        assert!(doc["scores"]["sustainability"].is_null());
        assert_eq!(doc["scores"]["sustainability_confidence"], 0.0);
        assert_eq!(doc["scores"]["civi_index"], 80.0);

        let energy = &doc["industries"]["energy"];
        assert_eq!(energy["scores"]["industry_score"], 80.0);
        assert_eq!(energy["scores"]["autonomy"], 40.0);
        assert_eq!(energy["pillars"]["autonomy"]["year"], 2021);
        assert!(energy["pillars"]["effectiveness"]["score"].is_null());

        let history = doc["historical_scores"].as_array().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0]["year"], 2021);
        assert!(history[0]["scores"]["civi_index"].is_null());
        assert_eq!(history[1]["industries"]["energy"]["score"], 80.0);
        assert!(history[1]["industries"]["energy"]["pillars"]["autonomy"].is_null());
    }

    #[test]
    fn test_indicators_use_latest_year_at_or_before_as_of() {
        let metric = |year: i32, value: f64| MetricValue {
            metric_id: "EG.ELC.ACCS.ZS".to_string(),
            name: "Access to electricity".to_string(),
            industry: Industry::Energy,
            pillar: Pillar::Effectiveness,
            directionality: Directionality::Pos,
            units: Some("%".to_string()),
            source: Some("World Bank".to_string()),
            country_code: "USA".to_string(),
            year,
            raw_value: Some(value),
            normalized_value: value,
        };
        let metrics = vec![metric(2020, 10.0), metric(2022, 20.0), metric(2025, 30.0)];
        let rows = CountryRows {
            metrics: metrics.iter().collect(),
            ..CountryRows::default()
        };

        let doc = build_country_document(&info(), &rows, &ConfidenceEstimator::default(), 2024);
        let indicators = doc["industries"]["energy"]["indicators"].as_array().unwrap();
        assert_eq!(indicators.len(), 1);
        assert_eq!(indicators[0]["year"], 2022);
        assert_eq!(indicators[0]["directionality"], "POS");
        assert_eq!(indicators[0]["pillar"], "effectiveness");
    }
}
