//! Service layer for the gallery-elo rating service
//!
//! This module contains the application state, the HTTP adapter, health
//! checks and background task management for the production service.

pub mod app;
pub mod health;
pub mod http;

pub use app::{AppState, ServiceError};
pub use health::{HealthCheck, HealthStatus};
pub use http::{router, serve, ApiError, VoteRequest};
