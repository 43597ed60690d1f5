//! Rating engine: pair selection and outcome recording
//!
//! The engine holds no state of its own. It owns handles to a store and a
//! calculator, and every rating it writes is recomputed from the store's
//! current values; ratings shown to a voter are never trusted.

use crate::error::{RatingError, Result};
use crate::rating::calculator::RatingCalculator;
use crate::rating::storage::{ItemIter, RatingStore};
use crate::types::{
    ComparisonPair, ItemId, ListQuery, NewItem, OutcomeReport, RatableItem,
};
use crate::utils::{current_timestamp, generate_item_id, rating_difference};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Pair selection and Elo updates over a shared [`RatingStore`]
#[derive(Clone)]
pub struct RatingEngine {
    store: Arc<dyn RatingStore>,
    calculator: Arc<dyn RatingCalculator>,
}

impl RatingEngine {
    pub fn new(store: Arc<dyn RatingStore>, calculator: Arc<dyn RatingCalculator>) -> Self {
        Self { store, calculator }
    }

    pub fn calculator(&self) -> Arc<dyn RatingCalculator> {
        self.calculator.clone()
    }

    /// Pick two distinct random items for a voter
    ///
    /// Fails with `InsufficientItems` when fewer than two items exist, which
    /// callers should render as an empty gallery rather than an error page.
    pub fn select_pair(&self) -> Result<ComparisonPair> {
        let (first, second) = self.store.random_distinct_pair()?;
        debug!("Selected pair {} vs {}", first.id, second.id);

        Ok(ComparisonPair {
            first: first.view(),
            second: second.view(),
        })
    }

    /// Record that `winner_id` beat `loser_id` and return both new ratings
    pub fn record_outcome(&self, winner_id: &ItemId, loser_id: &ItemId) -> Result<OutcomeReport> {
        self.record(winner_id, loser_id, None)
    }

    /// Like [`record_outcome`](Self::record_outcome), but gives up with
    /// `DeadlineExceeded` if the commit has not started by `deadline`
    pub fn record_outcome_before(
        &self,
        winner_id: &ItemId,
        loser_id: &ItemId,
        deadline: Instant,
    ) -> Result<OutcomeReport> {
        self.record(winner_id, loser_id, Some(deadline))
    }

    fn record(
        &self,
        winner_id: &ItemId,
        loser_id: &ItemId,
        deadline: Option<Instant>,
    ) -> Result<OutcomeReport> {
        if winner_id == loser_id {
            return Err(RatingError::InvalidOutcome {
                reason: format!("Item {} cannot win against itself", winner_id),
            });
        }

        let winner = self.store.get(winner_id)?;
        let loser = self.store.get(loser_id)?;
        debug!(
            "Recording outcome {} ({:.1}) over {} ({:.1}), gap {:.1}",
            winner.id,
            winner.rating,
            loser.id,
            loser.rating,
            rating_difference(winner.rating, loser.rating)
        );

        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return Err(RatingError::DeadlineExceeded);
            }
        }

        let report = self
            .store
            .apply_outcome(winner_id, loser_id, self.calculator.as_ref())
            .map_err(|e| match e {
                RatingError::Conflict { item_id } => {
                    warn!(
                        "Outcome {} over {} went stale, item {} vanished before commit",
                        winner_id, loser_id, item_id
                    );
                    RatingError::OutcomeStale {
                        winner_id: winner_id.clone(),
                        loser_id: loser_id.clone(),
                    }
                }
                other => other,
            })?;

        info!(
            "Outcome committed: {} {:.1} -> {:.1}, {} {:.1} -> {:.1} (k={})",
            report.winner.item_id,
            report.winner.old_rating,
            report.winner.new_rating,
            report.loser.item_id,
            report.loser.old_rating,
            report.loser.new_rating,
            report.k_factor
        );

        Ok(report)
    }

    /// Ranked listing for the gallery, highest rating first by default
    pub fn leaderboard(&self, query: &ListQuery) -> Result<ItemIter> {
        self.store.list_all(query)
    }

    pub fn get_item(&self, id: &ItemId) -> Result<RatableItem> {
        self.store.get(id)
    }

    /// Ingest a new item at the calculator's initial rating
    pub fn add_item(&self, new_item: NewItem) -> Result<RatableItem> {
        if new_item.url.trim().is_empty() {
            return Err(RatingError::InvalidItem {
                reason: "Item url cannot be empty".to_string(),
            });
        }
        if matches!(new_item.id.as_deref(), Some(id) if id.trim().is_empty()) {
            return Err(RatingError::InvalidItem {
                reason: "Item id cannot be empty".to_string(),
            });
        }

        let now = current_timestamp();
        let item = RatableItem {
            id: new_item.id.unwrap_or_else(generate_item_id),
            url: new_item.url,
            prompt: new_item.prompt,
            creator: new_item.creator,
            rating: new_item
                .rating
                .unwrap_or_else(|| self.calculator.initial_rating()),
            comparisons: 0,
            created_at: now,
            last_updated: now,
        };

        let item = self.store.insert(item)?;
        info!("Added item {} at rating {}", item.id, item.rating);
        Ok(item)
    }

    pub fn item_count(&self) -> Result<usize> {
        self.store.count()
    }
}
