//! Main application configuration
//!
//! This module defines the primary configuration structures for the
//! gallery-elo service, including environment variable loading, TOML file
//! loading and validation.

use crate::config::rating::RatingConfig;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub rating: RatingConfig,
    pub storage: StorageSettings,
}

/// Service-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Host the HTTP API binds to
    pub http_host: String,
    /// Port for the HTTP API, health and metrics endpoints
    pub http_port: u16,
    /// Deadline applied to each vote commit, in milliseconds
    pub request_timeout_ms: u64,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Persistence settings for the rating store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// JSON snapshot file; the store is memory-only when unset
    pub snapshot_path: Option<PathBuf>,
    /// How often the snapshot is rewritten
    pub snapshot_interval_seconds: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "gallery-elo".to_string(),
            log_level: "info".to_string(),
            http_host: "0.0.0.0".to_string(),
            http_port: 8080,
            request_timeout_ms: 2000,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            snapshot_interval_seconds: 60,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Ok(host) = env::var("HTTP_HOST") {
            self.service.http_host = host;
        }
        if let Ok(port) = env::var("HTTP_PORT") {
            self.service.http_port = port
                .parse()
                .map_err(|_| anyhow!("Invalid HTTP_PORT value: {}", port))?;
        }
        if let Ok(timeout) = env::var("REQUEST_TIMEOUT_MS") {
            self.service.request_timeout_ms = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid REQUEST_TIMEOUT_MS value: {}", timeout))?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            self.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }

        // Rating settings
        if let Ok(initial) = env::var("INITIAL_RATING") {
            self.rating.initial_rating = initial
                .parse()
                .map_err(|_| anyhow!("Invalid INITIAL_RATING value: {}", initial))?;
        }
        if let Ok(k) = env::var("K_FACTOR") {
            self.rating.k_factor = k
                .parse()
                .map_err(|_| anyhow!("Invalid K_FACTOR value: {}", k))?;
        }
        if let Ok(k) = env::var("PROVISIONAL_K_FACTOR") {
            self.rating.provisional_k_factor = Some(
                k.parse()
                    .map_err(|_| anyhow!("Invalid PROVISIONAL_K_FACTOR value: {}", k))?,
            );
        }
        if let Ok(threshold) = env::var("PROVISIONAL_THRESHOLD") {
            self.rating.provisional_threshold = threshold
                .parse()
                .map_err(|_| anyhow!("Invalid PROVISIONAL_THRESHOLD value: {}", threshold))?;
        }

        // Storage settings
        if let Ok(path) = env::var("SNAPSHOT_PATH") {
            self.storage.snapshot_path = if path.is_empty() {
                None
            } else {
                Some(PathBuf::from(path))
            };
        }
        if let Ok(interval) = env::var("SNAPSHOT_INTERVAL_SECONDS") {
            self.storage.snapshot_interval_seconds = interval
                .parse()
                .map_err(|_| anyhow!("Invalid SNAPSHOT_INTERVAL_SECONDS value: {}", interval))?;
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get per-request deadline as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.service.request_timeout_ms)
    }

    /// Get snapshot interval as Duration
    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.storage.snapshot_interval_seconds)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.http_port == 0 {
        return Err(anyhow!("HTTP port cannot be 0"));
    }
    if config.service.request_timeout_ms == 0 {
        return Err(anyhow!("Request timeout must be greater than 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    // Validate rating settings
    if !config.rating.initial_rating.is_finite() {
        return Err(anyhow!("Initial rating must be finite"));
    }
    if !config.rating.k_factor.is_finite() || config.rating.k_factor <= 0.0 {
        return Err(anyhow!("K-factor must be positive"));
    }
    if let Some(k) = config.rating.provisional_k_factor {
        if !k.is_finite() || k <= 0.0 {
            return Err(anyhow!("Provisional K-factor must be positive"));
        }
    }

    if config.storage.snapshot_path.is_some() && config.storage.snapshot_interval_seconds == 0 {
        return Err(anyhow!("Snapshot interval must be greater than 0"));
    }

    Ok(())
}
