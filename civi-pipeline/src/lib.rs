//! # CIVI pipeline
//!
//! Batch side of the Critical Infrastructure Vitals Index: turns raw
//! observations into normalized metrics and the weighted score hierarchy,
//! publishes them as a new store generation and exports static documents.

pub mod aggregator;
pub mod confidence;
pub mod derived;
pub mod exporter;
pub mod normalizer;
pub mod sources;
pub mod workflow;

pub use aggregator::{aggregate, AggregationOutput};
pub use confidence::{latest_with_confidence, ConfidenceEstimator, LatestValue};
pub use normalizer::{normalize, NormalizationOutput, RunStamp, SkipReason, SkippedMetric};
pub use workflow::{run_pipeline, RunSummary};
