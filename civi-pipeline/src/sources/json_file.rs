//! JSON file import
//!
//! Reads an array of `{country_code, year, metric_id, value, source}`
//! objects. `value` may be `null`.

use super::{FetchReport, ObservationSource, SourceError};
use civi_common::observation::RawObservation;
use std::path::PathBuf;
use tracing::info;

pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Parse the whole file
    pub async fn read_all(&self) -> Result<Vec<RawObservation>, SourceError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        serde_json::from_str(&content)
            .map_err(|e| SourceError::Parse(format!("{}: {}", self.path.display(), e)))
    }
}

#[async_trait::async_trait]
impl ObservationSource for JsonFileSource {
    fn name(&self) -> &str {
        "json-file"
    }

    async fn fetch(&self, metric_ids: &[String]) -> FetchReport {
        let mut report = FetchReport::default();

        match self.read_all().await {
            Ok(observations) => {
                let total = observations.len();
                report.extend_validated(
                    observations
                        .into_iter()
                        .filter(|o| metric_ids.is_empty() || metric_ids.contains(&o.metric_id)),
                );
                info!(
                    "Read {} observations from {} ({} kept)",
                    total,
                    self.path.display(),
                    report.observations.len()
                );
            }
            Err(e) => report.record_failure("*", e),
        }

        report
    }
}
