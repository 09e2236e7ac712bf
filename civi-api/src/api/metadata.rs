//! Active generation metadata

use axum::{extract::State, Json};
use civi_common::db::{self, RunRecord};
use serde::Serialize;
use std::collections::BTreeMap;

use super::ApiError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct MetadataResponse {
    pub run: RunRecord,
    /// Years with at least one country score
    pub years: Vec<i32>,
    /// Normalized rows per metric
    pub metrics: BTreeMap<String, i64>,
}

/// GET /metadata
pub async fn get_metadata(State(state): State<AppState>) -> Result<Json<MetadataResponse>, ApiError> {
    let run = db::active_run(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("No published generation yet".to_string()))?;

    Ok(Json(MetadataResponse {
        run,
        years: db::score_years(&state.db).await?,
        metrics: db::normalized_counts(&state.db).await?,
    }))
}
