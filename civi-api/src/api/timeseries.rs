//! Score trend lines for one country

use axum::{
    extract::{Query, State},
    Json,
};
use civi_common::db::{self, ScoreFilter};
use civi_common::{Industry, Pillar};
use serde::{Deserialize, Serialize};

use super::ApiError;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct TimeseriesQuery {
    pub country: Option<String>,
    pub industry: Option<String>,
    pub pillar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeseriesPoint {
    pub year: i32,
    pub score: f64,
}

/// GET /scores/timeseries?country=&industry=&pillar=
///
/// Level picked by the filters given: industry+pillar gives the pillar
/// score, industry alone the industry score, pillar alone the country-level
/// pillar score, neither the country score.
pub async fn get_timeseries(
    State(state): State<AppState>,
    Query(query): Query<TimeseriesQuery>,
) -> Result<Json<Vec<TimeseriesPoint>>, ApiError> {
    let country = query
        .country
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::Unprocessable("Query parameter `country` is required".to_string()))?
        .to_ascii_uppercase();
    let industry = query.industry.as_deref().map(str::parse::<Industry>).transpose()?;
    let pillar = query.pillar.as_deref().map(str::parse::<Pillar>).transpose()?;

    let filter = ScoreFilter::country(&country)
        .with_industry(industry)
        .with_pillar(pillar);

    let mut points: Vec<TimeseriesPoint> = match (industry, pillar) {
        (Some(_), Some(_)) => db::pillar_scores(&state.db, &filter)
            .await?
            .into_iter()
            .map(|s| TimeseriesPoint { year: s.year, score: s.pillar_score })
            .collect(),
        (Some(_), None) => db::industry_scores(&state.db, &filter)
            .await?
            .into_iter()
            .map(|s| TimeseriesPoint { year: s.year, score: s.industry_score })
            .collect(),
        (None, Some(_)) => db::country_pillar_scores(&state.db, &filter)
            .await?
            .into_iter()
            .map(|s| TimeseriesPoint { year: s.year, score: s.score })
            .collect(),
        (None, None) => db::country_scores(&state.db, &filter)
            .await?
            .into_iter()
            .map(|s| TimeseriesPoint { year: s.year, score: s.country_score })
            .collect(),
    };

    if points.is_empty() {
        return Err(ApiError::NotFound(format!("No scores for country {}", country)));
    }
    points.sort_by_key(|p| p.year);
    Ok(Json(points))
}
