//! Error types for the rating service
//!
//! The rating core reports every failure as a typed [`RatingError`] so the
//! HTTP layer can decide between a placeholder, a re-fetch prompt and a
//! hard failure. Binaries and service wiring use anyhow on top of this.

use crate::types::ItemId;

/// Result type alias for the rating core
pub type Result<T> = std::result::Result<T, RatingError>;

/// Failures surfaced by the rating store and engine
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RatingError {
    #[error("Item not found: {item_id}")]
    NotFound { item_id: ItemId },

    #[error("Invalid outcome: {reason}")]
    InvalidOutcome { reason: String },

    #[error("Invalid item: {reason}")]
    InvalidItem { reason: String },

    #[error("Not enough items to compare: {available} available, 2 required")]
    InsufficientItems { available: usize },

    #[error("Commit conflict on item {item_id}")]
    Conflict { item_id: ItemId },

    #[error("Outcome for {winner_id} over {loser_id} is stale, re-select a pair")]
    OutcomeStale { winner_id: ItemId, loser_id: ItemId },

    #[error("Deadline exceeded before commit")]
    DeadlineExceeded,

    #[error("Storage unavailable: {message}")]
    StorageUnavailable { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl RatingError {
    /// Only storage failures are transient; everything else needs new input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RatingError::StorageUnavailable { .. })
    }

    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            RatingError::NotFound { .. } => "not_found",
            RatingError::InvalidOutcome { .. } => "invalid_outcome",
            RatingError::InvalidItem { .. } => "invalid_item",
            RatingError::InsufficientItems { .. } => "insufficient_items",
            RatingError::Conflict { .. } => "conflict",
            RatingError::OutcomeStale { .. } => "outcome_stale",
            RatingError::DeadlineExceeded => "deadline_exceeded",
            RatingError::StorageUnavailable { .. } => "storage_unavailable",
            RatingError::Configuration { .. } => "configuration",
        }
    }

    pub(crate) fn lock_poisoned(what: &str) -> Self {
        RatingError::StorageUnavailable {
            message: format!("Failed to acquire {} lock", what),
        }
    }
}
