//! Metrics for the gallery-elo service
//!
//! Prometheus counters and histograms for pair serving, vote commits and
//! the shape of the rating population.

pub mod collector;

pub use collector::{MetricsCollector, MetricsTimer, PopulationMetrics, VoteMetrics};
