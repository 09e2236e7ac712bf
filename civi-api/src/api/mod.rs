//! HTTP API handlers for civi-api

pub mod comparison;
pub mod countries;
pub mod error;
pub mod health;
pub mod metadata;
pub mod timeseries;

pub use comparison::{get_industry_comparison, get_pillar_comparison};
pub use countries::{get_country_profile, list_countries};
pub use error::ApiError;
pub use health::health_routes;
pub use metadata::get_metadata;
pub use timeseries::get_timeseries;

use serde::Deserialize;

/// `?year=` filter shared by the list endpoints
#[derive(Debug, Default, Deserialize)]
pub struct YearQuery {
    pub year: Option<i32>,
}
