//! Main application state and service coordination
//!
//! This module contains the AppState that wires the rating store, engine and
//! metrics together and owns the background snapshot and uptime tasks.

use crate::config::AppConfig;
use crate::metrics::MetricsCollector;
use crate::rating::{
    EloRatingCalculator, ExtendedEloConfig, InMemoryRatingStore, RatingEngine,
};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Concrete store, kept for snapshotting
    store: Arc<InMemoryRatingStore>,

    /// Pair selection and vote recording
    engine: RatingEngine,

    /// Prometheus metrics
    metrics: Arc<MetricsCollector>,

    /// Background task handles
    background_tasks: Mutex<Vec<JoinHandle<()>>>,

    /// Service status
    is_running: Arc<RwLock<bool>>,

    started_at: Instant,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing gallery-elo rating service");

        let store = match &config.storage.snapshot_path {
            Some(path) => {
                InMemoryRatingStore::open(path).map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to open rating snapshot: {}", e),
                })?
            }
            None => {
                info!("No snapshot path configured, ratings are kept in memory only");
                InMemoryRatingStore::new()
            }
        };

        Self::with_store(config, Arc::new(store))
    }

    /// Initialize over the configured snapshot without ever writing it back
    ///
    /// Used by one-off probes that run beside a live service sharing the
    /// same snapshot file.
    pub fn read_only(config: AppConfig) -> Result<Self, ServiceError> {
        let store = match &config.storage.snapshot_path {
            Some(path) => InMemoryRatingStore::load_read_only(path).map_err(|e| {
                ServiceError::Initialization {
                    message: format!("Failed to read rating snapshot: {}", e),
                }
            })?,
            None => InMemoryRatingStore::new(),
        };

        Self::with_store(config, Arc::new(store))
    }

    /// Initialize around an existing store
    pub fn with_store(
        config: AppConfig,
        store: Arc<InMemoryRatingStore>,
    ) -> Result<Self, ServiceError> {
        let rating_config = ExtendedEloConfig::from(&config.rating);
        info!(
            "Rating configuration: initial_rating={}, k_factor={:?}",
            rating_config.initial_rating, rating_config.k_factor
        );

        let calculator =
            EloRatingCalculator::new(rating_config).map_err(|e| ServiceError::Configuration {
                message: format!("Failed to initialize rating calculator: {}", e),
            })?;

        let metrics = Arc::new(MetricsCollector::new().map_err(|e| {
            ServiceError::Initialization {
                message: format!("Failed to create metrics collector: {}", e),
            }
        })?);

        let engine = RatingEngine::new(store.clone(), Arc::new(calculator));

        Ok(Self {
            config,
            store,
            engine,
            metrics,
            background_tasks: Mutex::new(Vec::new()),
            is_running: Arc::new(RwLock::new(false)),
            started_at: Instant::now(),
        })
    }

    /// Start background tasks and mark the service ready
    pub async fn start(&self) -> Result<(), ServiceError> {
        info!("Starting gallery-elo rating service");

        let count = self
            .engine
            .item_count()
            .map_err(|e| ServiceError::Initialization {
                message: format!("Rating store unavailable at startup: {}", e),
            })?;
        self.metrics.set_item_count(count);
        info!("Rating store holds {} items", count);

        *self.is_running.write().await = true;

        self.start_background_tasks().await;

        info!("✅ Gallery-elo rating service started successfully");
        Ok(())
    }

    /// Perform graceful shutdown, writing a final snapshot when configured
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of gallery-elo service");

        *self.is_running.write().await = false;

        self.stop_background_tasks().await;

        if self.store.snapshot_path().is_some() {
            let store = self.store.clone();
            let saved = tokio::task::spawn_blocking(move || store.save_snapshot())
                .await
                .map_err(|e| ServiceError::BackgroundTask {
                    message: format!("Final snapshot task failed: {}", e),
                })?
                .map_err(|e| ServiceError::BackgroundTask {
                    message: format!("Failed to write final snapshot: {}", e),
                })?;
            info!("✅ Final snapshot written with {} items", saved);
        }

        info!("✅ Gallery-elo service shutdown completed");
        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn engine(&self) -> &RatingEngine {
        &self.engine
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    pub fn uptime(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    /// Start background maintenance tasks
    async fn start_background_tasks(&self) {
        let mut tasks = self.background_tasks.lock().await;

        if self.store.snapshot_path().is_some() {
            let interval_duration = self.config.snapshot_interval();
            info!(
                "Starting snapshot task ({}s interval)...",
                interval_duration.as_secs()
            );

            let store = self.store.clone();
            let is_running = self.is_running.clone();

            tasks.push(tokio::spawn(async move {
                let mut interval = tokio::time::interval(interval_duration);
                // The first tick completes immediately
                interval.tick().await;

                while *is_running.read().await {
                    interval.tick().await;

                    let store = store.clone();
                    match tokio::task::spawn_blocking(move || store.save_snapshot()).await {
                        Ok(Ok(saved)) => debug!("Snapshot written with {} items", saved),
                        Ok(Err(e)) => warn!("Snapshot failed: {}", e),
                        Err(e) => error!("Snapshot task panicked: {}", e),
                    }
                }

                info!("Snapshot task stopped");
            }));
        } else {
            info!("Snapshots disabled - skipping snapshot task");
        }

        let metrics_task = {
            let engine = self.engine.clone();
            let metrics = self.metrics.clone();
            let is_running = self.is_running.clone();
            let started_at = self.started_at;

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(15));

                while *is_running.read().await {
                    interval.tick().await;

                    metrics.set_uptime(started_at.elapsed());
                    match engine.item_count() {
                        Ok(count) => metrics.set_item_count(count),
                        Err(e) => warn!("Failed to count items for metrics: {}", e),
                    }
                }

                info!("Metrics update task stopped");
            })
        };
        tasks.push(metrics_task);

        info!("{} background tasks started", tasks.len());
    }

    /// Stop all background tasks
    async fn stop_background_tasks(&self) {
        let mut tasks = self.background_tasks.lock().await;
        let task_count = tasks.len();
        if task_count == 0 {
            info!("No background tasks to stop");
            return;
        }

        info!("Stopping {} background tasks...", task_count);
        for (i, task) in tasks.drain(..).enumerate() {
            debug!("Aborting background task {}/{}", i + 1, task_count);
            task.abort();
        }

        info!("✅ All {} background tasks stopped", task_count);
    }
}
