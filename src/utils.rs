//! Utility functions for the rating service

use crate::error::{RatingError, Result};
use crate::types::ItemId;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique item ID
pub fn generate_item_id() -> ItemId {
    Uuid::new_v4().to_string()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Reject NaN and infinite ratings
pub fn ensure_finite(rating: f64, what: &str) -> Result<f64> {
    if rating.is_finite() {
        Ok(rating)
    } else {
        Err(RatingError::InvalidOutcome {
            reason: format!("{} rating is not finite: {}", what, rating),
        })
    }
}

/// Calculate the absolute difference between two ratings
pub fn rating_difference(rating1: f64, rating2: f64) -> f64 {
    (rating1 - rating2).abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique_ids() {
        let id1 = generate_item_id();
        let id2 = generate_item_id();
        assert_ne!(id1, id2);
        assert!(Uuid::parse_str(&id1).is_ok());
    }

    #[test]
    fn test_rating_difference() {
        assert_eq!(rating_difference(1016.0, 984.0), 32.0);
        assert_eq!(rating_difference(984.0, 1016.0), 32.0);
        assert_eq!(rating_difference(1000.0, 1000.0), 0.0);
    }

    #[test]
    fn test_ensure_finite() {
        assert_eq!(ensure_finite(1000.0, "winner").unwrap(), 1000.0);
        assert!(ensure_finite(f64::NAN, "winner").is_err());
        assert!(ensure_finite(f64::INFINITY, "loser").is_err());
        assert!(ensure_finite(f64::NEG_INFINITY, "loser").is_err());
    }
}
