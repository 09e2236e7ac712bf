//! Producers of raw observations
//!
//! A source fetches metrics one at a time. A failing metric is reported in
//! the [`FetchReport`] and never stops the remaining metrics.

pub mod json_file;
pub mod world_bank;

pub use json_file::JsonFileSource;
pub use world_bank::WorldBankSource;

use civi_common::observation::{normalize_country_code, RawObservation};
use thiserror::Error;
use tracing::warn;

/// Upstream fetch errors
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-metric failure
#[derive(Debug)]
pub struct MetricFailure {
    pub metric_id: String,
    pub error: SourceError,
}

#[derive(Debug, Default)]
pub struct FetchReport {
    pub observations: Vec<RawObservation>,
    pub failures: Vec<MetricFailure>,
    /// Observations dropped for an invalid country code
    pub rejected: usize,
}

impl FetchReport {
    /// Add observations after validating their country codes
    pub fn extend_validated(&mut self, observations: impl IntoIterator<Item = RawObservation>) {
        for mut obs in observations {
            match normalize_country_code(&obs.country_code) {
                Ok(code) => {
                    obs.country_code = code;
                    self.observations.push(obs);
                }
                Err(e) => {
                    warn!("Rejected observation of {} ({}): {}", obs.metric_id, obs.year, e);
                    self.rejected += 1;
                }
            }
        }
    }

    pub fn record_failure(&mut self, metric_id: &str, error: SourceError) {
        warn!("Fetch failed for {}: {}", metric_id, error);
        self.failures.push(MetricFailure {
            metric_id: metric_id.to_string(),
            error,
        });
    }
}

/// A producer of raw observations
#[async_trait::async_trait]
pub trait ObservationSource: Send + Sync {
    /// Source name for logging
    fn name(&self) -> &str;

    /// Fetch `metric_ids`; an empty slice means everything the source offers
    async fn fetch(&self, metric_ids: &[String]) -> FetchReport;
}
