//! Rating calculator trait and test implementations
//!
//! This module defines the interface for turning a pairwise outcome into new
//! ratings. The store invokes the calculator inside its commit so the update
//! is always computed from the ratings it is about to overwrite.

use crate::error::{RatingError, Result};
use crate::types::RatableItem;
use serde::{Deserialize, Serialize};

/// New ratings produced for one pairwise outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRatings {
    pub winner_rating: f64,
    pub loser_rating: f64,
    /// Winner's expected score against the loser before the vote
    pub expected_winner_score: f64,
    /// K-factor applied to this event
    pub k_factor: f64,
}

/// Trait for calculating rating changes after a comparison
pub trait RatingCalculator: Send + Sync {
    /// Rating assigned to newly ingested items
    fn initial_rating(&self) -> f64;

    /// Probability that `rating` beats `opponent_rating`
    fn expected_score(&self, rating: f64, opponent_rating: f64) -> f64;

    /// Calculate the winner's and loser's new ratings
    ///
    /// # Arguments
    /// * `winner` - authoritative current state of the winning item
    /// * `loser` - authoritative current state of the losing item
    fn calculate_outcome(&self, winner: &RatableItem, loser: &RatableItem)
        -> Result<OutcomeRatings>;

    /// Get current configuration as JSON
    fn config(&self) -> serde_json::Value;
}

/// Mock rating calculator for testing
#[derive(Debug, Default)]
pub struct MockRatingCalculator {
    calculation_calls: std::sync::Mutex<Vec<(RatableItem, RatableItem)>>,
    fixed_result: std::sync::RwLock<Option<OutcomeRatings>>,
    fail_with: std::sync::RwLock<Option<RatingError>>,
}

impl MockRatingCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a fixed result to return for all calculations
    pub fn set_fixed_result(&self, result: OutcomeRatings) {
        if let Ok(mut fixed) = self.fixed_result.write() {
            *fixed = Some(result);
        }
    }

    /// Make every calculation fail with the given error
    pub fn set_failure(&self, error: RatingError) {
        if let Ok(mut fail) = self.fail_with.write() {
            *fail = Some(error);
        }
    }

    /// Get all calculation calls made (for testing)
    pub fn get_calculation_calls(&self) -> Vec<(RatableItem, RatableItem)> {
        self.calculation_calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

impl RatingCalculator for MockRatingCalculator {
    fn initial_rating(&self) -> f64 {
        crate::types::DEFAULT_RATING
    }

    fn expected_score(&self, _rating: f64, _opponent_rating: f64) -> f64 {
        0.5
    }

    fn calculate_outcome(
        &self,
        winner: &RatableItem,
        loser: &RatableItem,
    ) -> Result<OutcomeRatings> {
        if let Ok(mut calls) = self.calculation_calls.lock() {
            calls.push((winner.clone(), loser.clone()));
        }

        if let Ok(fail) = self.fail_with.read() {
            if let Some(error) = fail.as_ref() {
                return Err(error.clone());
            }
        }

        if let Ok(fixed) = self.fixed_result.read() {
            if let Some(result) = fixed.as_ref() {
                return Ok(result.clone());
            }
        }

        // Default behavior: no rating change
        Ok(OutcomeRatings {
            winner_rating: winner.rating,
            loser_rating: loser.rating,
            expected_winner_score: 0.5,
            k_factor: 0.0,
        })
    }

    fn config(&self) -> serde_json::Value {
        serde_json::json!({ "type": "mock" })
    }
}
