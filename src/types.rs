//! Common types used throughout the rating service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque unique identifier for a rated item
pub type ItemId = String;

/// Rating every item starts from unless ingestion says otherwise
pub const DEFAULT_RATING: f64 = 1000.0;

/// A gallery item with its current skill rating
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatableItem {
    pub id: ItemId,
    /// Reference to the externally hosted image
    pub url: String,
    pub prompt: String,
    /// Who submitted the item, if known
    #[serde(default)]
    pub creator: Option<String>,
    pub rating: f64,
    /// Number of recorded outcomes this item took part in
    pub comparisons: u64,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl RatableItem {
    /// Public projection handed to voters
    pub fn view(&self) -> ItemView {
        ItemView {
            id: self.id.clone(),
            url: self.url.clone(),
            prompt: self.prompt.clone(),
            rating: self.rating,
        }
    }

    /// Record the result of one comparison
    pub fn apply_rating(&mut self, new_rating: f64, at: DateTime<Utc>) {
        self.rating = new_rating;
        self.comparisons += 1;
        self.last_updated = at;
    }
}

/// Ingestion request for a new item
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewItem {
    /// Caller-chosen id; generated when absent
    #[serde(default)]
    pub id: Option<ItemId>,
    pub url: String,
    pub prompt: String,
    #[serde(default)]
    pub creator: Option<String>,
    /// Starting rating; the configured initial rating when absent
    #[serde(default)]
    pub rating: Option<f64>,
}

impl NewItem {
    pub fn new(url: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<ItemId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = Some(creator.into());
        self
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }
}

/// Public fields of an item shown for comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemView {
    pub id: ItemId,
    pub url: String,
    pub prompt: String,
    pub rating: f64,
}

/// Two distinct items offered to a voter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonPair {
    pub first: ItemView,
    pub second: ItemView,
}

/// Rating movement of one item after a recorded outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingChange {
    pub item_id: ItemId,
    pub old_rating: f64,
    pub new_rating: f64,
    /// Comparison count after the commit
    pub comparisons: u64,
}

impl RatingChange {
    pub fn delta(&self) -> f64 {
        self.new_rating - self.old_rating
    }
}

/// Committed result of a single vote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeReport {
    pub winner: RatingChange,
    pub loser: RatingChange,
    /// Winner's expected score before the vote
    pub expected_winner_score: f64,
    pub k_factor: f64,
}

/// Ordering for listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListOrder {
    /// Highest rating first, ties broken by id
    #[default]
    RatingDesc,
    /// Ascending id
    Id,
}

impl std::fmt::Display for ListOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListOrder::RatingDesc => write!(f, "rating_desc"),
            ListOrder::Id => write!(f, "id"),
        }
    }
}

/// Listing filter for gallery and portfolio views
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub order: ListOrder,
    /// Restrict to a single creator's items
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl ListQuery {
    pub fn ordered_by(order: ListOrder) -> Self {
        Self {
            order,
            ..Default::default()
        }
    }

    pub fn for_creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = Some(creator.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
