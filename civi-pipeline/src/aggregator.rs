//! Weighted roll-up of normalized metrics into the score hierarchy
//!
//! Per (country, year): indicator -> pillar -> industry -> country. Every
//! level is a weighted average over the children that have a value; absent
//! children drop out of both numerator and denominator, and a level with no
//! contributing children is absent rather than zero.
//!
//! Intermediate levels use full precision. Only emitted rows are rounded to
//! two decimals.
//!
//! Alongside the industry-first hierarchy, each pillar is also averaged
//! across industries (industry weights) into a [`CountryPillarScore`]. That
//! view never feeds the country score.

use civi_common::catalog::MetricCatalog;
use civi_common::observation::{
    round_score, CountryPillarScore, CountryScore, IndustryScore, NormalizedObservation, PillarScore,
};
use civi_common::{Industry, Pillar, WeightConfig};
use std::collections::BTreeMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationOutput {
    pub pillar_scores: Vec<PillarScore>,
    pub industry_scores: Vec<IndustryScore>,
    pub country_scores: Vec<CountryScore>,
    pub country_pillar_scores: Vec<CountryPillarScore>,
    /// Observations dropped because their metric is not in the catalog, by metric id
    pub excluded: BTreeMap<String, usize>,
}

impl AggregationOutput {
    pub fn excluded_total(&self) -> usize {
        self.excluded.values().sum()
    }
}

/// Weighted average over `(weight, value)` pairs
///
/// Pairs with a zero weight contribute nothing. Returns `None` when no pair
/// carries weight.
pub fn weighted_mean<I>(items: I) -> Option<f64>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let (sum, total_weight) = items
        .into_iter()
        .filter(|(weight, value)| *weight > 0.0 && value.is_finite())
        .fold((0.0, 0.0), |(sum, total), (weight, value)| {
            (sum + weight * value, total + weight)
        });

    (total_weight > 0.0).then(|| sum / total_weight)
}

type CountryYear = (String, i32);

/// Roll normalized observations up through pillar, industry and country
///
/// Output rows are ordered by country, year, then industry/pillar.
pub fn aggregate(
    normalized: &[NormalizedObservation],
    catalog: &MetricCatalog,
    weights: &WeightConfig,
) -> AggregationOutput {
    let mut output = AggregationOutput::default();

    // (country, year) -> (industry, pillar) -> [(indicator weight, value)]
    let mut cells: BTreeMap<CountryYear, BTreeMap<(Industry, Pillar), Vec<(f64, f64)>>> = BTreeMap::new();
    for obs in normalized {
        let Some(definition) = catalog.get(&obs.metric_id) else {
            *output.excluded.entry(obs.metric_id.clone()).or_default() += 1;
            continue;
        };
        cells
            .entry((obs.country_code.clone(), obs.year))
            .or_default()
            .entry((definition.industry, definition.pillar))
            .or_default()
            .push((weights.indicator_weight(&obs.metric_id), obs.normalized_value));
    }

    for (metric_id, count) in &output.excluded {
        warn!(
            "Excluded {} normalized observations of {}: metric not in catalog",
            count, metric_id
        );
    }

    for ((country_code, year), indicator_cells) in cells {
        let pillars: BTreeMap<(Industry, Pillar), f64> = indicator_cells
            .into_iter()
            .filter_map(|(key, values)| weighted_mean(values).map(|score| (key, score)))
            .collect();

        let mut by_industry: BTreeMap<Industry, Vec<(f64, f64)>> = BTreeMap::new();
        let mut by_pillar: BTreeMap<Pillar, Vec<(f64, f64)>> = BTreeMap::new();
        for ((industry, pillar), score) in &pillars {
            output.pillar_scores.push(PillarScore {
                country_code: country_code.clone(),
                year,
                industry: *industry,
                pillar: *pillar,
                pillar_score: round_score(*score),
            });
            by_industry
                .entry(*industry)
                .or_default()
                .push((weights.pillar_weight(*pillar), *score));
            by_pillar
                .entry(*pillar)
                .or_default()
                .push((weights.industry_weight(*industry), *score));
        }

        let mut industries = Vec::new();
        for (industry, values) in by_industry {
            if let Some(score) = weighted_mean(values) {
                output.industry_scores.push(IndustryScore {
                    country_code: country_code.clone(),
                    year,
                    industry,
                    industry_score: round_score(score),
                });
                industries.push((weights.industry_weight(industry), score));
            }
        }

        for (pillar, values) in by_pillar {
            if let Some(score) = weighted_mean(values) {
                output.country_pillar_scores.push(CountryPillarScore {
                    country_code: country_code.clone(),
                    year,
                    pillar,
                    score: round_score(score),
                });
            }
        }

        match weighted_mean(industries) {
            Some(score) => output.country_scores.push(CountryScore {
                country_code,
                year,
                country_score: round_score(score),
            }),
            None => debug!("No country score for {} {}: no weighted industries", country_code, year),
        }
    }

    output
}
