//! Health check aggregation
//!
//! This module provides health check functionality for the gallery-elo
//! service, including readiness and liveness probes.

use crate::service::app::AppState;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    pub version: String,
    /// Current timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    /// Service statistics
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional error message if unhealthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Items currently in the store; absent when the store cannot count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<usize>,
    /// Pairs served since start
    pub pairs_served: u64,
    /// Outcomes committed since start
    pub outcomes_recorded: u64,
    pub uptime_seconds: u64,
}

impl HealthCheck {
    /// Perform a comprehensive health check of the service
    pub async fn check(app_state: Arc<AppState>) -> Result<Self> {
        let mut checks = Vec::new();
        let mut overall_status = HealthStatus::Healthy;

        let service_check = Self::check_service_running(&app_state).await;
        if service_check.status != HealthStatus::Healthy {
            overall_status = HealthStatus::Unhealthy;
        }
        checks.push(service_check);

        let (store_check, items) = Self::check_rating_store(&app_state);
        if store_check.status == HealthStatus::Unhealthy {
            overall_status = HealthStatus::Unhealthy;
        } else if store_check.status == HealthStatus::Degraded
            && overall_status == HealthStatus::Healthy
        {
            overall_status = HealthStatus::Degraded;
        }
        checks.push(store_check);

        Ok(HealthCheck {
            status: overall_status,
            service: app_state.config().service.name.clone(),
            version: crate::VERSION.to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats: Self::gather_service_stats(&app_state, items),
        })
    }

    /// Simple liveness check - just verify service is running
    pub async fn liveness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if app_state.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness check - verify the store can serve requests
    pub async fn readiness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if !app_state.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }

        Ok(Self::check_rating_store(&app_state).0.status)
    }

    async fn check_service_running(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = if app_state.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// The store is healthy when it answers a count
    fn check_rating_store(app_state: &AppState) -> (ComponentCheck, Option<usize>) {
        let start = std::time::Instant::now();
        let count = app_state.engine().item_count();
        let (status, message) = Self::store_status(&count);

        let check = ComponentCheck {
            name: "rating_store".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        (check, count.ok())
    }

    fn store_status(count: &crate::error::Result<usize>) -> (HealthStatus, Option<String>) {
        match count {
            Ok(count) if *count < 2 => (
                HealthStatus::Degraded,
                Some(format!("Only {} items, pairs cannot be served", count)),
            ),
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => {
                error!("Rating store check failed: {}", e);
                (HealthStatus::Unhealthy, Some(e.to_string()))
            }
        }
    }

    fn gather_service_stats(app_state: &AppState, items: Option<usize>) -> ServiceStats {
        let metrics = app_state.metrics();
        ServiceStats {
            items,
            pairs_served: metrics.votes().pairs_served_total.get(),
            outcomes_recorded: metrics.votes().outcomes_recorded_total.get(),
            uptime_seconds: app_state.uptime().as_secs(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}
