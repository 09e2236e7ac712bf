//! Country score listing and per-country profile

use axum::{
    extract::{Path, Query, State},
    Json,
};
use civi_common::db::{self, MetricValue, ScoreFilter};
use civi_common::observation::{CountryScore, IndustryScore, PillarScore};
use serde::Serialize;

use super::{ApiError, YearQuery};
use crate::AppState;

/// Everything the active generation holds for one country
#[derive(Debug, Serialize)]
pub struct CountryProfile {
    pub country_code: String,
    pub country_scores: Vec<CountryScore>,
    pub industry_scores: Vec<IndustryScore>,
    pub pillar_scores: Vec<PillarScore>,
    pub metrics: Vec<MetricValue>,
}

impl CountryProfile {
    fn is_empty(&self) -> bool {
        self.country_scores.is_empty()
            && self.industry_scores.is_empty()
            && self.pillar_scores.is_empty()
            && self.metrics.is_empty()
    }
}

/// GET /countries?year=
pub async fn list_countries(
    State(state): State<AppState>,
    Query(query): Query<YearQuery>,
) -> Result<Json<Vec<CountryScore>>, ApiError> {
    let filter = ScoreFilter::default().with_year(query.year);
    Ok(Json(db::country_scores(&state.db, &filter).await?))
}

/// GET /countries/:code?year=
pub async fn get_country_profile(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(query): Query<YearQuery>,
) -> Result<Json<CountryProfile>, ApiError> {
    let country_code = code.trim().to_ascii_uppercase();
    let filter = ScoreFilter::country(&country_code).with_year(query.year);

    let profile = CountryProfile {
        country_scores: db::country_scores(&state.db, &filter).await?,
        industry_scores: db::industry_scores(&state.db, &filter).await?,
        pillar_scores: db::pillar_scores(&state.db, &filter).await?,
        metrics: db::metric_values(&state.db, &filter).await?,
        country_code,
    };

    if profile.is_empty() {
        return Err(ApiError::NotFound(format!(
            "No data for country {}",
            profile.country_code
        )));
    }
    Ok(Json(profile))
}
