//! Latest-value selection with staleness decay
//!
//! For "latest" views each dimension (a pillar, or an industry/pillar pair)
//! independently reports its most recent year with data, so one country can
//! mix reference years. Confidence falls linearly with the age of that year.

use civi_common::observation::round_score;
use serde::Serialize;
use std::collections::BTreeMap;

/// Confidence lost per year of staleness
pub const DEFAULT_DECAY_PER_YEAR: f64 = 0.1;

/// Most recent value of one dimension and how much to trust it
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatestValue {
    pub value: Option<f64>,
    pub year: Option<i32>,
    pub confidence: f64,
}

impl LatestValue {
    pub fn absent() -> Self {
        Self {
            value: None,
            year: None,
            confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceEstimator {
    decay_per_year: f64,
}

impl Default for ConfidenceEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_DECAY_PER_YEAR)
    }
}

impl ConfidenceEstimator {
    /// Negative or non-finite decay rates fall back to the default
    pub fn new(decay_per_year: f64) -> Self {
        let decay_per_year = if decay_per_year.is_finite() && decay_per_year >= 0.0 {
            decay_per_year
        } else {
            DEFAULT_DECAY_PER_YEAR
        };
        Self { decay_per_year }
    }

    pub fn decay_per_year(&self) -> f64 {
        self.decay_per_year
    }

    /// `max(0, 1 - (as_of_year - found_year) * decay)`, rounded to 2 decimals
    pub fn confidence(&self, found_year: i32, as_of_year: i32) -> f64 {
        let age = (as_of_year - found_year).max(0) as f64;
        round_score((1.0 - age * self.decay_per_year).clamp(0.0, 1.0))
    }

    /// Pick the most recent year at or before `as_of_year` in `history`
    ///
    /// `history` holds only years where the dimension has a value.
    pub fn latest(&self, history: &BTreeMap<i32, f64>, as_of_year: i32) -> LatestValue {
        match history.range(..=as_of_year).next_back() {
            Some((year, value)) => LatestValue {
                value: Some(*value),
                year: Some(*year),
                confidence: self.confidence(*year, as_of_year),
            },
            None => LatestValue::absent(),
        }
    }
}

/// [`ConfidenceEstimator::latest`] with the default decay rate
pub fn latest_with_confidence(history: &BTreeMap<i32, f64>, as_of_year: i32) -> LatestValue {
    ConfidenceEstimator::default().latest(history, as_of_year)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(entries: &[(i32, f64)]) -> BTreeMap<i32, f64> {
        entries.iter().copied().collect()
    }

    #[test]
    fn test_three_years_stale_is_point_seven() {
        let latest = latest_with_confidence(&history(&[(2017, 55.0), (2021, 64.0)]), 2024);
        assert_eq!(latest.value, Some(64.0));
        assert_eq!(latest.year, Some(2021));
        assert_eq!(latest.confidence, 0.7);
    }

    #[test]
    fn test_eleven_years_stale_is_zero() {
        let latest = latest_with_confidence(&history(&[(2013, 40.0)]), 2024);
        assert_eq!(latest.value, Some(40.0));
        assert_eq!(latest.confidence, 0.0);
    }

    #[test]
    fn test_current_year_is_full_confidence() {
        let latest = latest_with_confidence(&history(&[(2024, 10.0)]), 2024);
        assert_eq!(latest.confidence, 1.0);
    }

    #[test]
    fn test_no_data_is_absent_with_zero_confidence() {
        assert_eq!(latest_with_confidence(&BTreeMap::new(), 2024), LatestValue::absent());
    }

    #[test]
    fn test_years_after_as_of_are_ignored() {
        let latest = latest_with_confidence(&history(&[(2020, 1.0), (2023, 2.0)]), 2021);
        assert_eq!(latest.year, Some(2020));
        assert_eq!(latest.confidence, 0.9);

        let none = latest_with_confidence(&history(&[(2023, 2.0)]), 2021);
        assert_eq!(none, LatestValue::absent());
    }

    #[test]
    fn test_custom_decay() {
        let estimator = ConfidenceEstimator::new(0.25);
        assert_eq!(estimator.confidence(2020, 2022), 0.5);
        assert_eq!(ConfidenceEstimator::new(-1.0).decay_per_year(), DEFAULT_DECAY_PER_YEAR);
    }
}
