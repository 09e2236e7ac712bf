//! Integration tests for civi-api endpoints
//!
//! Each test builds a throwaway database, publishes a small generation
//! through the store layer and queries it over a read-only connection.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use civi_api::{build_router, AppState};
use civi_common::catalog::default_definitions;
use civi_common::db::{self, RunCounts, StagedScores};
use civi_common::observation::{
    CountryPillarScore, CountryScore, IndustryScore, NormalizationMethod, NormalizedObservation,
    PillarScore, RawObservation, YearWindow,
};
use civi_common::{Industry, Pillar};
use serde_json::Value;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method

const ACCESS: &str = "EG.ELC.ACCS.ZS";

/// Keeps the temp dir and the writer pool alive for the test's duration
struct Fixture {
    temp: TempDir,
    _writer: SqlitePool,
    reader: SqlitePool,
}

/// (country, year, score) rows published for energy/effectiveness
const ROWS: [(&str, i32, f64); 3] = [("USA", 2023, 80.0), ("USA", 2024, 100.0), ("TLS", 2024, 0.0)];

async fn setup(publish: bool) -> Fixture {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("civi.db");
    let writer = db::init_database(&db_path).await.unwrap();
    db::insert_definitions(&writer, &default_definitions()).await.unwrap();

    if publish {
        publish_generation(&writer).await;
    }

    let reader = civi_api::db::connect_readonly(&db_path).await.unwrap();
    Fixture {
        temp,
        _writer: writer,
        reader,
    }
}

async fn publish_generation(pool: &SqlitePool) {
    let raw: Vec<RawObservation> = ROWS
        .iter()
        .map(|&(country, year, value)| RawObservation {
            country_code: country.to_string(),
            year,
            metric_id: ACCESS.to_string(),
            value: Some(value / 2.0 + 50.0),
            source: Some("World Bank".to_string()),
        })
        .collect();
    db::upsert_observations(pool, &raw).await.unwrap();

    let normalized: Vec<NormalizedObservation> = ROWS
        .iter()
        .map(|&(country, year, value)| NormalizedObservation {
            country_code: country.to_string(),
            year,
            metric_id: ACCESS.to_string(),
            normalized_value: value,
            method: NormalizationMethod::MinMax,
            window: YearWindow {
                start_year: 2023,
                end_year: 2024,
            },
        })
        .collect();
    let pillar_scores: Vec<PillarScore> = ROWS
        .iter()
        .map(|&(country, year, score)| PillarScore {
            country_code: country.to_string(),
            year,
            industry: Industry::Energy,
            pillar: Pillar::Effectiveness,
            pillar_score: score,
        })
        .collect();
    let industry_scores: Vec<IndustryScore> = ROWS
        .iter()
        .map(|&(country, year, score)| IndustryScore {
            country_code: country.to_string(),
            year,
            industry: Industry::Energy,
            industry_score: score,
        })
        .collect();
    let country_scores: Vec<CountryScore> = ROWS
        .iter()
        .map(|&(country, year, score)| CountryScore {
            country_code: country.to_string(),
            year,
            country_score: score,
        })
        .collect();
    let country_pillar_scores: Vec<CountryPillarScore> = ROWS
        .iter()
        .map(|&(country, year, score)| CountryPillarScore {
            country_code: country.to_string(),
            year,
            pillar: Pillar::Effectiveness,
            score,
        })
        .collect();

    let run_id = db::begin_run(pool).await.unwrap();
    db::stage_normalization(pool, run_id, &normalized, &[]).await.unwrap();
    db::stage_scores(
        pool,
        run_id,
        StagedScores {
            pillar_scores: &pillar_scores,
            industry_scores: &industry_scores,
            country_scores: &country_scores,
            country_pillar_scores: &country_pillar_scores,
        },
    )
    .await
    .unwrap();
    db::publish_run(pool, run_id, &RunCounts::default()).await.unwrap();
}

fn app(fixture: &Fixture) -> axum::Router {
    build_router(AppState::new(fixture.reader.clone()))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

async fn get_json(router: axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = router.oneshot(get(uri)).await.unwrap();
    let status = response.status();
    (status, extract_json(response.into_body()).await)
}

// =============================================================================
// Health and metadata
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let fixture = setup(false).await;
    let (status, body) = get_json(app(&fixture), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "civi-api");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_metadata_before_first_publish() {
    let fixture = setup(false).await;
    let (status, body) = get_json(app(&fixture), "/metadata").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_metadata_describes_active_generation() {
    let fixture = setup(true).await;
    let (status, body) = get_json(app(&fixture), "/metadata").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["run"]["status"], "published");
    assert_eq!(body["years"], serde_json::json!([2023, 2024]));
    assert_eq!(body["metrics"][ACCESS], 3);
}

// =============================================================================
// Countries
// =============================================================================

#[tokio::test]
async fn test_list_countries_with_year_filter() {
    let fixture = setup(true).await;

    let (status, all) = get_json(app(&fixture), "/countries").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 3);

    let (_, latest) = get_json(app(&fixture), "/countries?year=2024").await;
    let latest = latest.as_array().unwrap();
    assert_eq!(latest.len(), 2);
    assert!(latest.iter().all(|row| row["year"] == 2024));
}

#[tokio::test]
async fn test_invalid_year_is_rejected() {
    let fixture = setup(true).await;
    let response = app(&fixture).oneshot(get("/countries?year=latest")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_country_profile() {
    let fixture = setup(true).await;
    let (status, body) = get_json(app(&fixture), "/countries/usa").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["country_code"], "USA");
    assert_eq!(body["country_scores"].as_array().unwrap().len(), 2);
    assert_eq!(body["industry_scores"][0]["industry"], "energy");
    assert_eq!(body["pillar_scores"][0]["pillar"], "effectiveness");

    let metrics = body["metrics"].as_array().unwrap();
    assert_eq!(metrics.len(), 2);
    assert_eq!(metrics[0]["metric_id"], ACCESS);
    assert_eq!(metrics[0]["name"], "Access to electricity (% of population)");
    assert!(metrics[0]["raw_value"].is_number());
}

#[tokio::test]
async fn test_country_profile_for_one_year() {
    let fixture = setup(true).await;
    let (status, body) = get_json(app(&fixture), "/countries/USA?year=2023").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["country_scores"].as_array().unwrap().len(), 1);
    assert_eq!(body["country_scores"][0]["country_score"], 80.0);
    assert_eq!(body["metrics"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_country_is_not_found() {
    let fixture = setup(true).await;
    let (status, body) = get_json(app(&fixture), "/countries/FRA").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"]["message"].as_str().unwrap().contains("FRA"));
}

// =============================================================================
// Comparisons
// =============================================================================

#[tokio::test]
async fn test_industry_comparison_is_ranked() {
    let fixture = setup(true).await;
    let (status, body) = get_json(app(&fixture), "/industries/energy?year=2024").await;

    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["country_code"], "USA");
    assert_eq!(rows[0]["industry_score"], 100.0);
    assert_eq!(rows[1]["country_code"], "TLS");
}

#[tokio::test]
async fn test_industry_comparison_errors() {
    let fixture = setup(true).await;

    let (status, body) = get_json(app(&fixture), "/industries/bogus").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, _) = get_json(app(&fixture), "/industries/Food%20%26%20Agriculture").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_pillar_comparison() {
    let fixture = setup(true).await;

    let (status, body) = get_json(app(&fixture), "/pillars/effectiveness?industry=energy").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 3);

    let (status, _) = get_json(app(&fixture), "/pillars/effectiveness?industry=bogus").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get_json(app(&fixture), "/pillars/autonomy").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get_json(app(&fixture), "/pillars/speed").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Timeseries
// =============================================================================

#[tokio::test]
async fn test_country_timeseries() {
    let fixture = setup(true).await;
    let (status, body) = get_json(app(&fixture), "/scores/timeseries?country=usa").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        serde_json::json!([{"year": 2023, "score": 80.0}, {"year": 2024, "score": 100.0}])
    );
}

#[tokio::test]
async fn test_timeseries_levels() {
    let fixture = setup(true).await;

    for uri in [
        "/scores/timeseries?country=USA&industry=energy&pillar=effectiveness",
        "/scores/timeseries?country=USA&industry=energy",
        "/scores/timeseries?country=USA&pillar=effectiveness",
    ] {
        let (status, body) = get_json(app(&fixture), uri).await;
        assert_eq!(status, StatusCode::OK, "{}", uri);
        assert_eq!(body.as_array().unwrap().len(), 2, "{}", uri);
        assert_eq!(body[1]["score"], 100.0, "{}", uri);
    }

    let (status, _) = get_json(app(&fixture), "/scores/timeseries?country=USA&industry=water").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_timeseries_requires_country() {
    let fixture = setup(true).await;
    let (status, body) = get_json(app(&fixture), "/scores/timeseries?industry=energy").await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "missing_parameter");
}

// =============================================================================
// Static export directory
// =============================================================================

#[tokio::test]
async fn test_export_directory_is_served() {
    let fixture = setup(true).await;
    let export_dir = fixture.temp.path().join("export");
    std::fs::create_dir_all(&export_dir).unwrap();
    std::fs::write(export_dir.join("USA.json"), r#"{"name": "United States"}"#).unwrap();

    let router = build_router(AppState::new(fixture.reader.clone()).with_export_dir(Some(export_dir)));
    let (status, body) = get_json(router.clone(), "/data/USA.json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "United States");

    let response = router.oneshot(get("/data/TLS.json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_data_route_absent_without_export_dir() {
    let fixture = setup(true).await;
    let response = app(&fixture).oneshot(get("/data/USA.json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
