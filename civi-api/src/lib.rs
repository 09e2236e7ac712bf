//! civi-api library - read-only query service
//!
//! Serves the active generation of the CIVI store over HTTP and, when an
//! export directory is configured, the static documents under `/data`.

use axum::Router;
use sqlx::SqlitePool;
use std::path::PathBuf;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool (read-only)
    pub db: SqlitePool,
    /// Directory of exported country documents, served under `/data`
    pub export_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(db: SqlitePool) -> Self {
        Self { db, export_dir: None }
    }

    pub fn with_export_dir(mut self, export_dir: Option<PathBuf>) -> Self {
        self.export_dir = export_dir;
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    let export_dir = state.export_dir.clone();

    let router = Router::new()
        .route("/metadata", get(api::get_metadata))
        .route("/countries", get(api::list_countries))
        .route("/countries/:code", get(api::get_country_profile))
        .route("/industries/:industry", get(api::get_industry_comparison))
        .route("/pillars/:pillar", get(api::get_pillar_comparison))
        .route("/scores/timeseries", get(api::get_timeseries))
        .merge(api::health_routes())
        .with_state(state);

    let router = match export_dir {
        Some(dir) => router.nest_service("/data", ServeDir::new(dir)),
        None => router,
    };

    router.layer(TraceLayer::new_for_http())
}
