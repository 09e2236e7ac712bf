//! Cross-country comparison for one industry or pillar

use axum::{
    extract::{Path, Query, State},
    Json,
};
use civi_common::db::{self, ScoreFilter};
use civi_common::observation::{IndustryScore, PillarScore};
use civi_common::{Industry, Pillar};
use serde::Deserialize;

use super::{ApiError, YearQuery};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PillarQuery {
    pub year: Option<i32>,
    pub industry: Option<String>,
}

/// Rows ordered best score first, then by country
fn rank_by<T>(rows: &mut [T], score: impl Fn(&T) -> f64, code: impl Fn(&T) -> &str) {
    rows.sort_by(|a, b| {
        score(b)
            .total_cmp(&score(a))
            .then_with(|| code(a).cmp(code(b)))
    });
}

/// GET /industries/:industry?year=
pub async fn get_industry_comparison(
    State(state): State<AppState>,
    Path(industry): Path<String>,
    Query(query): Query<YearQuery>,
) -> Result<Json<Vec<IndustryScore>>, ApiError> {
    let industry: Industry = industry.parse()?;
    let filter = ScoreFilter::default()
        .with_industry(Some(industry))
        .with_year(query.year);

    let mut rows = db::industry_scores(&state.db, &filter).await?;
    if rows.is_empty() {
        return Err(ApiError::NotFound(format!("No scores for industry {}", industry)));
    }
    rank_by(&mut rows, |r| r.industry_score, |r| r.country_code.as_str());
    Ok(Json(rows))
}

/// GET /pillars/:pillar?year=&industry=
pub async fn get_pillar_comparison(
    State(state): State<AppState>,
    Path(pillar): Path<String>,
    Query(query): Query<PillarQuery>,
) -> Result<Json<Vec<PillarScore>>, ApiError> {
    let pillar: Pillar = pillar.parse()?;
    let industry = query
        .industry
        .as_deref()
        .map(str::parse::<Industry>)
        .transpose()?;
    let filter = ScoreFilter::default()
        .with_pillar(Some(pillar))
        .with_industry(industry)
        .with_year(query.year);

    let mut rows = db::pillar_scores(&state.db, &filter).await?;
    if rows.is_empty() {
        return Err(ApiError::NotFound(format!("No scores for pillar {}", pillar)));
    }
    rank_by(&mut rows, |r| r.pillar_score, |r| r.country_code.as_str());
    Ok(Json(rows))
}
