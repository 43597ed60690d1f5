//! Pairwise rating core
//!
//! This module provides the Elo update rule, the concurrency-safe item store
//! and the engine that ties them together for pair selection and voting.

pub mod calculator;
pub mod elo;
pub mod engine;
pub mod storage;

// Re-export commonly used types
pub use calculator::{OutcomeRatings, RatingCalculator};
pub use elo::{EloRatingCalculator, ExtendedEloConfig, KFactorPolicy};
pub use engine::RatingEngine;
pub use storage::{InMemoryRatingStore, ItemIter, RatingStore};
