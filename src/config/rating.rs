//! Rating system configuration

use serde::{Deserialize, Serialize};

/// Elo parameters as loaded from the environment or a config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    pub initial_rating: f64,
    pub k_factor: f64,
    /// Higher K used while an item is still provisional
    pub provisional_k_factor: Option<f64>,
    /// Comparisons below which an item counts as provisional (0 disables)
    pub provisional_threshold: u64,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            initial_rating: 1000.0,
            k_factor: 32.0,
            provisional_k_factor: None,
            provisional_threshold: 0,
        }
    }
}
