//! Weight configuration for the aggregation hierarchy
//!
//! A `WeightConfig` is a plain value handed to each aggregation call, so two
//! runs with different weights (scenario analysis) never see each other's
//! settings.
//!
//! Defaults:
//! - Indicator weight: from the catalog seed, otherwise 1.0
//! - Pillar weight: 0.25 each
//! - Industry weight: 1/N over all industries

use crate::catalog::default_indicator_weights;
use crate::taxonomy::{Industry, Pillar};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Weight used for indicators with no configured weight
pub const DEFAULT_INDICATOR_WEIGHT: f64 = 1.0;

/// Weights as written in the TOML `[weights]` section
///
/// Keys are free-form and canonicalized when converted to a [`WeightConfig`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeightSettings {
    #[serde(default)]
    pub pillars: BTreeMap<String, f64>,
    #[serde(default)]
    pub industries: BTreeMap<String, f64>,
    #[serde(default)]
    pub indicators: BTreeMap<String, f64>,
}

/// Validated weights for pillar, industry and indicator levels
#[derive(Debug, Clone, PartialEq)]
pub struct WeightConfig {
    pillars: BTreeMap<Pillar, f64>,
    industries: BTreeMap<Industry, f64>,
    indicators: BTreeMap<String, f64>,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self::equal().with_indicator_weights(default_indicator_weights())
    }
}

impl WeightConfig {
    /// Equal pillar and industry weights, no per-indicator weights
    pub fn equal() -> Self {
        let industry_weight = 1.0 / Industry::ALL.len() as f64;
        Self {
            pillars: Pillar::ALL.iter().map(|p| (*p, 0.25)).collect(),
            industries: Industry::ALL.iter().map(|i| (*i, industry_weight)).collect(),
            indicators: BTreeMap::new(),
        }
    }

    /// Defaults overlaid with the TOML `[weights]` section
    pub fn from_settings(settings: &WeightSettings) -> Result<Self> {
        let mut config = Self::default();
        for (key, weight) in &settings.pillars {
            config.pillars.insert(key.parse::<Pillar>()?, *weight);
        }
        for (key, weight) in &settings.industries {
            config.industries.insert(key.parse::<Industry>()?, *weight);
        }
        for (metric_id, weight) in &settings.indicators {
            config.indicators.insert(metric_id.clone(), *weight);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_indicator_weights(mut self, weights: BTreeMap<String, f64>) -> Self {
        self.indicators.extend(weights);
        self
    }

    pub fn with_indicator_weight(mut self, metric_id: &str, weight: f64) -> Self {
        self.indicators.insert(metric_id.to_string(), weight);
        self
    }

    pub fn with_pillar_weight(mut self, pillar: Pillar, weight: f64) -> Self {
        self.pillars.insert(pillar, weight);
        self
    }

    pub fn with_industry_weight(mut self, industry: Industry, weight: f64) -> Self {
        self.industries.insert(industry, weight);
        self
    }

    pub fn pillar_weight(&self, pillar: Pillar) -> f64 {
        self.pillars.get(&pillar).copied().unwrap_or(0.25)
    }

    pub fn industry_weight(&self, industry: Industry) -> f64 {
        self.industries
            .get(&industry)
            .copied()
            .unwrap_or(1.0 / Industry::ALL.len() as f64)
    }

    pub fn indicator_weight(&self, metric_id: &str) -> f64 {
        self.indicators
            .get(metric_id)
            .copied()
            .unwrap_or(DEFAULT_INDICATOR_WEIGHT)
    }

    /// Every weight must be finite and non-negative
    pub fn validate(&self) -> Result<()> {
        let check = |label: String, weight: f64| {
            if weight.is_finite() && weight >= 0.0 {
                Ok(())
            } else {
                Err(Error::Config(format!("Invalid weight for {}: {}", label, weight)))
            }
        };
        for (pillar, weight) in &self.pillars {
            check(format!("pillar {}", pillar), *weight)?;
        }
        for (industry, weight) in &self.industries {
            check(format!("industry {}", industry), *weight)?;
        }
        for (metric_id, weight) in &self.indicators {
            check(format!("indicator {}", metric_id), *weight)?;
        }
        Ok(())
    }
}
