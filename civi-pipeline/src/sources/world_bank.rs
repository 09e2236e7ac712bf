//! World Bank indicators API client

use super::{FetchReport, ObservationSource, SourceError};
use civi_common::observation::RawObservation;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

pub const WORLD_BANK_BASE_URL: &str = "https://api.worldbank.org/v2";
const USER_AGENT: &str = "CIVI/0.1.0";
const REQUEST_TIMEOUT_SECS: u64 = 180;
const SOURCE_NAME: &str = "World Bank";

/// One record of the second element of a World Bank response
#[derive(Debug, Deserialize)]
struct WbRecord {
    #[serde(default)]
    countryiso3code: Option<String>,
    date: String,
    value: Option<f64>,
}

/// Parse a World Bank `[meta, [records]]` response body
///
/// Records without a 3-letter ISO code (regional aggregates without a code)
/// or with a non-numeric `date` are dropped. A `null` record list means the
/// indicator has no data for the range.
pub fn parse_response(metric_id: &str, body: &str) -> Result<Vec<RawObservation>, SourceError> {
    let document: serde_json::Value =
        serde_json::from_str(body).map_err(|e| SourceError::Parse(e.to_string()))?;

    let parts = document
        .as_array()
        .ok_or_else(|| SourceError::Parse("expected a JSON array".to_string()))?;

    if let Some(messages) = parts.first().and_then(|meta| meta.get("message")) {
        return Err(SourceError::Api(200, messages.to_string()));
    }

    let records = match parts.get(1) {
        None | Some(serde_json::Value::Null) => return Ok(Vec::new()),
        Some(records) => records.clone(),
    };
    let records: Vec<WbRecord> =
        serde_json::from_value(records).map_err(|e| SourceError::Parse(e.to_string()))?;

    Ok(records
        .into_iter()
        .filter_map(|record| {
            let code = record.countryiso3code.filter(|c| c.len() == 3)?;
            let year = record.date.parse::<i32>().ok()?;
            Some(RawObservation {
                country_code: code,
                year,
                metric_id: metric_id.to_string(),
                value: record.value,
                source: Some(SOURCE_NAME.to_string()),
            })
        })
        .collect())
}

pub struct WorldBankSource {
    http_client: reqwest::Client,
    base_url: String,
    start_year: i32,
    end_year: i32,
}

impl WorldBankSource {
    pub fn new(start_year: i32, end_year: i32) -> Result<Self, SourceError> {
        Self::with_base_url(WORLD_BANK_BASE_URL, start_year, end_year)
    }

    pub fn with_base_url(base_url: &str, start_year: i32, end_year: i32) -> Result<Self, SourceError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| SourceError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            start_year,
            end_year,
        })
    }

    pub fn indicator_url(&self, metric_id: &str) -> String {
        format!(
            "{}/country/all/indicator/{}?date={}:{}&format=json&per_page=20000",
            self.base_url, metric_id, self.start_year, self.end_year
        )
    }

    /// Fetch one indicator
    pub async fn fetch_indicator(&self, metric_id: &str) -> Result<Vec<RawObservation>, SourceError> {
        let url = self.indicator_url(metric_id);
        debug!(metric_id = %metric_id, url = %url, "Querying World Bank API");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SourceError::Api(status.as_u16(), error_text));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        parse_response(metric_id, &body)
    }
}

#[async_trait::async_trait]
impl ObservationSource for WorldBankSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn fetch(&self, metric_ids: &[String]) -> FetchReport {
        let mut report = FetchReport::default();

        for metric_id in metric_ids {
            match self.fetch_indicator(metric_id).await {
                Ok(observations) => {
                    info!("Fetched {} records for {}", observations.len(), metric_id);
                    report.extend_validated(observations);
                }
                Err(e) => report.record_failure(metric_id, e),
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response() {
        let body = r#"[
            {"page": 1, "pages": 1, "per_page": 20000, "total": 4},
            [
                {"indicator": {"id": "EG.ELC.ACCS.ZS"}, "country": {"id": "US"},
                 "countryiso3code": "USA", "date": "2020", "value": 100.0},
                {"indicator": {"id": "EG.ELC.ACCS.ZS"}, "country": {"id": "TL"},
                 "countryiso3code": "TLS", "date": "2020", "value": null},
                {"indicator": {"id": "EG.ELC.ACCS.ZS"}, "country": {"id": "XX"},
                 "countryiso3code": "", "date": "2020", "value": 55.0},
                {"indicator": {"id": "EG.ELC.ACCS.ZS"}, "country": {"id": "US"},
                 "countryiso3code": "USA", "date": "n/a", "value": 1.0}
            ]
        ]"#;

        let rows = parse_response("EG.ELC.ACCS.ZS", body).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].country_code, "USA");
        assert_eq!(rows[0].year, 2020);
        assert_eq!(rows[0].value, Some(100.0));
        assert_eq!(rows[0].source.as_deref(), Some("World Bank"));
        assert_eq!(rows[1].value, None);
    }

    #[test]
    fn test_parse_empty_range() {
        let body = r#"[{"page": 0, "pages": 0, "total": 0}, null]"#;
        assert!(parse_response("X", body).unwrap().is_empty());
    }

    #[test]
    fn test_parse_api_message() {
        let body = r#"[{"message": [{"id": "120", "key": "Invalid value", "value": "The provided parameter value is not valid"}]}]"#;
        assert!(matches!(parse_response("X", body), Err(SourceError::Api(_, _))));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(parse_response("X", "<html>"), Err(SourceError::Parse(_))));
        assert!(matches!(parse_response("X", "{}"), Err(SourceError::Parse(_))));
    }

    #[test]
    fn test_indicator_url() {
        let source = WorldBankSource::with_base_url("http://localhost:9/v2/", 2019, 2024).unwrap();
        assert_eq!(
            source.indicator_url("SP.POP.TOTL"),
            "http://localhost:9/v2/country/all/indicator/SP.POP.TOTL?date=2019:2024&format=json&per_page=20000"
        );
    }
}
