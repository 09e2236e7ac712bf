//! # CIVI Common Library
//!
//! Shared code for the Critical Infrastructure Vitals Index services:
//! - Industry/pillar taxonomy and key canonicalization
//! - Metric catalog definitions and the built-in catalog seed
//! - Observation and score row types shared by the pipeline and the API
//! - Weight configuration for the aggregation hierarchy
//! - Configuration loading and root folder resolution
//! - SQLite schema and keyed store access

pub mod catalog;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod observation;
pub mod taxonomy;
pub mod weights;

pub use catalog::{Directionality, MetricCatalog, MetricDefinition};
pub use error::{Error, Result};
pub use taxonomy::{canonical_key, Industry, Pillar};
pub use weights::WeightConfig;
