//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the gallery-elo service
//! using Prometheus metrics.

use crate::error::RatingError;
use crate::types::{OutcomeReport, RatableItem};
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the rating service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Pair and vote traffic
    vote_metrics: VoteMetrics,

    /// Item population and rating spread
    population_metrics: PopulationMetrics,
}

/// Pair and vote traffic
#[derive(Clone)]
pub struct VoteMetrics {
    /// Pairs handed out to voters
    pub pairs_served_total: IntCounter,

    /// Outcomes committed to the store
    pub outcomes_recorded_total: IntCounter,

    /// Failed operations by error kind
    pub errors_total: IntCounterVec,

    /// Time from vote receipt to commit
    pub outcome_duration: Histogram,
}

/// Item population and rating spread
#[derive(Clone)]
pub struct PopulationMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Number of items in the store
    pub items: IntGauge,

    /// Ratings observed at commit time
    pub rating_distribution: Histogram,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let vote_metrics = VoteMetrics::new(&registry)?;
        let population_metrics = PopulationMetrics::new(&registry)?;

        Ok(Self {
            registry,
            vote_metrics,
            population_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn votes(&self) -> &VoteMetrics {
        &self.vote_metrics
    }

    pub fn population(&self) -> &PopulationMetrics {
        &self.population_metrics
    }

    /// Record a pair handed to a voter
    pub fn record_pair_served(&self) {
        self.vote_metrics.pairs_served_total.inc();
    }

    /// Record a committed outcome and the ratings it produced
    pub fn record_outcome(&self, report: &OutcomeReport, duration: Duration) {
        self.vote_metrics.outcomes_recorded_total.inc();
        self.vote_metrics
            .outcome_duration
            .observe(duration.as_secs_f64());

        self.population_metrics
            .rating_distribution
            .observe(report.winner.new_rating);
        self.population_metrics
            .rating_distribution
            .observe(report.loser.new_rating);
    }

    /// Record a failed operation under its error kind
    pub fn record_error(&self, error: &RatingError) {
        self.vote_metrics
            .errors_total
            .with_label_values(&[error.kind()])
            .inc();
    }

    /// Record a newly ingested item
    pub fn record_item_added(&self, item: &RatableItem) {
        self.population_metrics.items.inc();
        self.population_metrics
            .rating_distribution
            .observe(item.rating);
    }

    pub fn set_item_count(&self, count: usize) {
        self.population_metrics.items.set(count as i64);
    }

    pub fn set_uptime(&self, uptime: Duration) {
        self.population_metrics
            .uptime_seconds
            .set(uptime.as_secs() as i64);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl VoteMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let pairs_served_total = IntCounter::new(
            "gallery_elo_pairs_served_total",
            "Comparison pairs served to voters",
        )?;
        registry.register(Box::new(pairs_served_total.clone()))?;

        let outcomes_recorded_total = IntCounter::new(
            "gallery_elo_outcomes_recorded_total",
            "Vote outcomes committed",
        )?;
        registry.register(Box::new(outcomes_recorded_total.clone()))?;

        let errors_total = IntCounterVec::new(
            Opts::new("gallery_elo_errors_total", "Failed operations by kind"),
            &["kind"],
        )?;
        registry.register(Box::new(errors_total.clone()))?;

        let outcome_duration = Histogram::with_opts(
            HistogramOpts::new(
                "gallery_elo_outcome_duration_seconds",
                "Time to validate and commit a vote",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
        )?;
        registry.register(Box::new(outcome_duration.clone()))?;

        Ok(Self {
            pairs_served_total,
            outcomes_recorded_total,
            errors_total,
            outcome_duration,
        })
    }
}

impl PopulationMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("gallery_elo_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let items = IntGauge::new("gallery_elo_items", "Items in the rating store")?;
        registry.register(Box::new(items.clone()))?;

        let rating_distribution = Histogram::with_opts(
            HistogramOpts::new(
                "gallery_elo_rating_distribution",
                "Item ratings observed at ingestion and commit",
            )
            .buckets(vec![
                600.0, 800.0, 900.0, 950.0, 1000.0, 1050.0, 1100.0, 1200.0, 1400.0,
            ]),
        )?;
        registry.register(Box::new(rating_distribution.clone()))?;

        Ok(Self {
            uptime_seconds,
            items,
            rating_distribution,
        })
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create default metrics collector")
    }
}
