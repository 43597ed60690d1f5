//! Test fixtures shared by the integration tests

#![allow(dead_code)]

use gallery_elo::error::{RatingError, Result};
use gallery_elo::rating::{
    EloRatingCalculator, InMemoryRatingStore, ItemIter, RatingCalculator, RatingEngine,
    RatingStore,
};
use gallery_elo::types::{ItemId, ListQuery, NewItem, OutcomeReport, RatableItem};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Engine over a fresh in-memory store with default Elo settings
pub fn create_test_engine() -> (RatingEngine, Arc<InMemoryRatingStore>) {
    let store = Arc::new(InMemoryRatingStore::new());
    let engine = RatingEngine::new(store.clone(), Arc::new(EloRatingCalculator::default()));
    (engine, store)
}

/// Engine seeded with items `item-0` .. `item-{count-1}` at 1000
pub fn seeded_engine(count: usize) -> (RatingEngine, Arc<InMemoryRatingStore>) {
    let (engine, store) = create_test_engine();
    for i in 0..count {
        engine
            .add_item(new_item(&format!("item-{}", i)))
            .expect("seed item");
    }
    (engine, store)
}

pub fn new_item(id: &str) -> NewItem {
    NewItem::new(format!("https://img.example/{}.png", id), format!("prompt for {}", id))
        .with_id(id)
}

pub fn id(value: &str) -> ItemId {
    value.to_string()
}

/// Sum of all ratings in the store
pub fn total_rating(engine: &RatingEngine) -> f64 {
    engine
        .leaderboard(&ListQuery::default())
        .expect("listing")
        .map(|item| item.rating)
        .sum()
}

/// Store wrapper that removes an item between the engine's read and its
/// commit, to exercise the stale-outcome path deterministically
pub struct VanishingStore {
    inner: InMemoryRatingStore,
    vanish: ItemId,
    commits: AtomicUsize,
}

impl VanishingStore {
    pub fn new(inner: InMemoryRatingStore, vanish: &str) -> Self {
        Self {
            inner,
            vanish: vanish.to_string(),
            commits: AtomicUsize::new(0),
        }
    }

    pub fn commit_attempts(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

impl RatingStore for VanishingStore {
    fn get(&self, id: &ItemId) -> Result<RatableItem> {
        self.inner.get(id)
    }

    fn insert(&self, item: RatableItem) -> Result<RatableItem> {
        self.inner.insert(item)
    }

    fn random_distinct_pair(&self) -> Result<(RatableItem, RatableItem)> {
        self.inner.random_distinct_pair()
    }

    fn apply_outcome(
        &self,
        winner_id: &ItemId,
        loser_id: &ItemId,
        calculator: &dyn RatingCalculator,
    ) -> Result<OutcomeReport> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        if winner_id == &self.vanish || loser_id == &self.vanish {
            return Err(RatingError::Conflict {
                item_id: self.vanish.clone(),
            });
        }
        self.inner.apply_outcome(winner_id, loser_id, calculator)
    }

    fn list_all(&self, query: &ListQuery) -> Result<ItemIter> {
        self.inner.list_all(query)
    }

    fn count(&self) -> Result<usize> {
        self.inner.count()
    }
}
