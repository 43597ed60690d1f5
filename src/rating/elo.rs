//! Elo rating system implementation
//!
//! This module provides a concrete implementation of the rating calculator
//! using the Elo algorithm from the skillratings crate.

use crate::config::RatingConfig;
use crate::error::{RatingError, Result};
use crate::rating::calculator::{OutcomeRatings, RatingCalculator};
use crate::types::{RatableItem, DEFAULT_RATING};
use crate::utils::ensure_finite;
use serde::{Deserialize, Serialize};
use skillratings::elo::{elo, expected_score, EloConfig, EloRating};
use skillratings::Outcomes;

/// How the K-factor for one comparison is chosen
///
/// A single K is applied to both items of an event so the rating exchange
/// stays zero-sum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KFactorPolicy {
    /// Same K for every event
    Fixed { k: f64 },
    /// `provisional_k` while either item has fewer than `threshold` comparisons
    Provisional {
        k: f64,
        provisional_k: f64,
        threshold: u64,
    },
}

impl KFactorPolicy {
    /// K-factor for an event between items with the given comparison counts
    pub fn k_for(&self, winner_comparisons: u64, loser_comparisons: u64) -> f64 {
        match *self {
            KFactorPolicy::Fixed { k } => k,
            KFactorPolicy::Provisional {
                k,
                provisional_k,
                threshold,
            } => {
                if winner_comparisons < threshold || loser_comparisons < threshold {
                    provisional_k
                } else {
                    k
                }
            }
        }
    }
}

impl Default for KFactorPolicy {
    fn default() -> Self {
        KFactorPolicy::Fixed { k: 32.0 }
    }
}

/// Elo parameters plus the initial rating for new items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedEloConfig {
    pub initial_rating: f64,
    pub k_factor: KFactorPolicy,
}

impl Default for ExtendedEloConfig {
    fn default() -> Self {
        Self {
            initial_rating: DEFAULT_RATING,
            k_factor: KFactorPolicy::default(),
        }
    }
}

impl From<&RatingConfig> for ExtendedEloConfig {
    fn from(config: &RatingConfig) -> Self {
        let k_factor = match config.provisional_k_factor {
            Some(provisional_k) if config.provisional_threshold > 0 => KFactorPolicy::Provisional {
                k: config.k_factor,
                provisional_k,
                threshold: config.provisional_threshold,
            },
            _ => KFactorPolicy::Fixed {
                k: config.k_factor,
            },
        };

        Self {
            initial_rating: config.initial_rating,
            k_factor,
        }
    }
}

impl ExtendedEloConfig {
    /// Faster movement for items with few comparisons
    pub fn provisional() -> Self {
        Self {
            initial_rating: DEFAULT_RATING,
            k_factor: KFactorPolicy::Provisional {
                k: 32.0,
                provisional_k: 64.0,
                threshold: 10,
            },
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if !self.initial_rating.is_finite() {
            return Err(RatingError::Configuration {
                message: "Initial rating must be finite".to_string(),
            });
        }

        let ks = match self.k_factor {
            KFactorPolicy::Fixed { k } => vec![k],
            KFactorPolicy::Provisional {
                k, provisional_k, ..
            } => vec![k, provisional_k],
        };
        if ks.iter().any(|k| !k.is_finite() || *k <= 0.0) {
            return Err(RatingError::Configuration {
                message: "K-factor must be positive and finite".to_string(),
            });
        }

        Ok(())
    }
}

/// Elo rating calculator implementation
#[derive(Debug, Clone)]
pub struct EloRatingCalculator {
    config: ExtendedEloConfig,
}

impl EloRatingCalculator {
    /// Create a new Elo rating calculator
    pub fn new(config: ExtendedEloConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self { config })
    }
}

impl Default for EloRatingCalculator {
    fn default() -> Self {
        Self {
            config: ExtendedEloConfig::default(),
        }
    }
}

impl RatingCalculator for EloRatingCalculator {
    fn initial_rating(&self) -> f64 {
        self.config.initial_rating
    }

    fn expected_score(&self, rating: f64, opponent_rating: f64) -> f64 {
        let (expected, _) = expected_score(
            &EloRating { rating },
            &EloRating {
                rating: opponent_rating,
            },
        );
        expected
    }

    fn calculate_outcome(
        &self,
        winner: &RatableItem,
        loser: &RatableItem,
    ) -> Result<OutcomeRatings> {
        let winner_rating = EloRating {
            rating: ensure_finite(winner.rating, "winner")?,
        };
        let loser_rating = EloRating {
            rating: ensure_finite(loser.rating, "loser")?,
        };

        let k = self
            .config
            .k_factor
            .k_for(winner.comparisons, loser.comparisons);
        let elo_config = EloConfig { k };

        let (expected_winner_score, _) = expected_score(&winner_rating, &loser_rating);
        let (new_winner, new_loser) =
            elo(&winner_rating, &loser_rating, &Outcomes::WIN, &elo_config);

        Ok(OutcomeRatings {
            winner_rating: ensure_finite(new_winner.rating, "updated winner")?,
            loser_rating: ensure_finite(new_loser.rating, "updated loser")?,
            expected_winner_score,
            k_factor: k,
        })
    }

    fn config(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or(serde_json::Value::Null)
    }
}
