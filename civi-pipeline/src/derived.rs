//! Metrics computed from other raw metrics before normalization

use civi_common::catalog::MILITARY_EXPENDITURE_PER_CAPITA;
use civi_common::observation::RawObservation;
use std::collections::BTreeMap;

/// Military expenditure, current USD
pub const MILITARY_EXPENDITURE_USD: &str = "MS.MIL.XPND.CD";

/// Population, total
pub const POPULATION: &str = "SP.POP.TOTL";

pub const DERIVED_SOURCE: &str = "Derived from World Bank";

/// Raw inputs consumed only by derived metrics, never normalized directly
pub const DERIVED_INPUTS: [&str; 2] = [MILITARY_EXPENDITURE_USD, POPULATION];

/// Military expenditure per capita for every (country, year) with both inputs
///
/// Pairs with an absent or zero population are skipped.
pub fn military_expenditure_per_capita(raw: &[RawObservation]) -> Vec<RawObservation> {
    let mut expenditure: BTreeMap<(&str, i32), f64> = BTreeMap::new();
    let mut population: BTreeMap<(&str, i32), f64> = BTreeMap::new();

    for obs in raw {
        let Some(value) = obs.usable_value() else {
            continue;
        };
        let key = (obs.country_code.as_str(), obs.year);
        match obs.metric_id.as_str() {
            MILITARY_EXPENDITURE_USD => {
                expenditure.insert(key, value);
            }
            POPULATION => {
                population.insert(key, value);
            }
            _ => {}
        }
    }

    expenditure
        .into_iter()
        .filter_map(|(key, spend)| {
            let people = population.get(&key).copied().filter(|p| *p > 0.0)?;
            Some(RawObservation {
                country_code: key.0.to_string(),
                year: key.1,
                metric_id: MILITARY_EXPENDITURE_PER_CAPITA.to_string(),
                value: Some(spend / people),
                source: Some(DERIVED_SOURCE.to_string()),
            })
        })
        .collect()
}
