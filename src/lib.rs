//! Gallery Elo - pairwise-comparison rating service for image galleries
//!
//! This crate provides a concurrency-safe rating store, an Elo rating engine
//! that serves random pairs and records votes, and a thin HTTP service with
//! health checks and Prometheus metrics around them.

pub mod config;
pub mod error;
pub mod metrics;
pub mod rating;
pub mod service;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{RatingError, Result};
pub use types::*;

// Re-export key components
pub use rating::{EloRatingCalculator, InMemoryRatingStore, RatingCalculator, RatingEngine, RatingStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
