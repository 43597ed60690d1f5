//! Rating storage interface and implementations
//!
//! This module defines the interface for keeping rated items, drawing random
//! comparison pairs and committing outcomes atomically, with an in-memory
//! implementation that can persist itself as a JSON snapshot.

use crate::error::{RatingError, Result};
use crate::rating::calculator::RatingCalculator;
use crate::types::{ItemId, ListOrder, ListQuery, OutcomeReport, RatableItem, RatingChange};
use crate::utils::{current_timestamp, ensure_finite};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Rejection-sampling attempts before the second slot is drawn from the
/// remaining `n - 1` items directly
pub const MAX_PAIR_DRAWS: usize = 16;

/// Map a draw over `0..n - 1` onto the `n - 1` indices other than `skipped`
fn skip_index(skipped: usize, drawn: usize) -> usize {
    if drawn >= skipped {
        drawn + 1
    } else {
        drawn
    }
}

/// Snapshot-ordered sequence of items returned by listings
pub type ItemIter = Box<dyn Iterator<Item = RatableItem> + Send>;

/// Trait for rating storage operations
#[cfg_attr(test, mockall::automock)]
pub trait RatingStore: Send + Sync {
    /// Get an item by id
    fn get(&self, id: &ItemId) -> Result<RatableItem>;

    /// Add a new item; the id must not already exist
    fn insert(&self, item: RatableItem) -> Result<RatableItem>;

    /// Draw two distinct items uniformly at random
    fn random_distinct_pair(&self) -> Result<(RatableItem, RatableItem)>;

    /// Atomically rate both items of an outcome and bump their counters
    ///
    /// The calculator is run against the committed ratings while the commit
    /// is held, so concurrent outcomes on a shared item serialize. Returns
    /// `Conflict` if either id is gone at commit time; a calculator error
    /// leaves both items untouched.
    fn apply_outcome(
        &self,
        winner_id: &ItemId,
        loser_id: &ItemId,
        calculator: &dyn RatingCalculator,
    ) -> Result<OutcomeReport>;

    /// List items matching the query, in the requested order
    fn list_all(&self, query: &ListQuery) -> Result<ItemIter>;

    /// Get total number of stored items
    fn count(&self) -> Result<usize>;
}

#[derive(Debug, Default)]
struct StoreInner {
    items: HashMap<ItemId, RatableItem>,
    /// Insertion order; gives O(1) uniform draws
    ids: Vec<ItemId>,
}

impl StoreInner {
    fn push(&mut self, item: RatableItem) {
        self.ids.push(item.id.clone());
        self.items.insert(item.id.clone(), item);
    }

    fn item_at(&self, index: usize) -> Result<RatableItem> {
        self.ids
            .get(index)
            .and_then(|id| self.items.get(id))
            .cloned()
            .ok_or_else(|| RatingError::StorageUnavailable {
                message: format!("Item index {} is out of sync", index),
            })
    }
}

/// Read a snapshot file into store contents; a missing file is empty
fn read_snapshot(path: &Path) -> Result<StoreInner> {
    let mut inner = StoreInner::default();

    if path.exists() {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            RatingError::StorageUnavailable {
                message: format!("Failed to read snapshot {}: {}", path.display(), e),
            }
        })?;
        let snapshot: Snapshot =
            serde_json::from_str(&contents).map_err(|e| RatingError::StorageUnavailable {
                message: format!("Failed to decode snapshot {}: {}", path.display(), e),
            })?;

        for item in snapshot.items {
            if inner.items.contains_key(&item.id) {
                return Err(RatingError::StorageUnavailable {
                    message: format!("Snapshot contains duplicate item {}", item.id),
                });
            }
            if !item.rating.is_finite() {
                return Err(RatingError::StorageUnavailable {
                    message: format!("Snapshot rating for {} is not finite", item.id),
                });
            }
            inner.push(item);
        }
        info!(
            "Loaded {} items from snapshot {} (saved {})",
            inner.ids.len(),
            path.display(),
            snapshot.saved_at
        );
    } else {
        info!(
            "No snapshot at {}, starting with an empty store",
            path.display()
        );
    }

    Ok(inner)
}

/// On-disk form of the store
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    saved_at: DateTime<Utc>,
    items: Vec<RatableItem>,
}

/// In-memory rating store implementation
#[derive(Debug, Default)]
pub struct InMemoryRatingStore {
    inner: RwLock<StoreInner>,
    snapshot_path: Option<PathBuf>,
    /// Held across write and rename so saves never interleave
    save_lock: Mutex<()>,
}

impl InMemoryRatingStore {
    /// Create an empty, memory-only store
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store backed by a JSON snapshot file
    ///
    /// A missing file yields an empty store that will be written on the
    /// first `save_snapshot`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let inner = read_snapshot(&path)?;

        Ok(Self {
            inner: RwLock::new(inner),
            snapshot_path: Some(path),
            save_lock: Mutex::new(()),
        })
    }

    /// Load a snapshot without taking ownership of the file
    ///
    /// The returned store has no snapshot path, so nothing it does is ever
    /// written back.
    pub fn load_read_only(path: &Path) -> Result<Self> {
        let inner = read_snapshot(path)?;

        Ok(Self {
            inner: RwLock::new(inner),
            snapshot_path: None,
            save_lock: Mutex::new(()),
        })
    }

    /// Snapshot file this store persists to, if any
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    /// Write the current contents to the configured snapshot file
    pub fn save_snapshot(&self) -> Result<usize> {
        match &self.snapshot_path {
            Some(path) => self.save_snapshot_to(path),
            None => Err(RatingError::Configuration {
                message: "Store has no snapshot path".to_string(),
            }),
        }
    }

    /// Write the current contents to `path`, replacing it atomically
    pub fn save_snapshot_to(&self, path: &Path) -> Result<usize> {
        let _saving = self
            .save_lock
            .lock()
            .map_err(|_| RatingError::lock_poisoned("snapshot save"))?;

        let items: Vec<RatableItem> = {
            let inner = self
                .inner
                .read()
                .map_err(|_| RatingError::lock_poisoned("store read"))?;
            inner
                .ids
                .iter()
                .filter_map(|id| inner.items.get(id).cloned())
                .collect()
        };
        let count = items.len();

        let snapshot = Snapshot {
            saved_at: current_timestamp(),
            items,
        };
        let encoded =
            serde_json::to_vec_pretty(&snapshot).map_err(|e| RatingError::StorageUnavailable {
                message: format!("Failed to encode snapshot: {}", e),
            })?;

        // One temp file per save; writers in other processes never share it
        let tmp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        std::fs::write(&tmp_path, encoded).map_err(|e| RatingError::StorageUnavailable {
            message: format!("Failed to write snapshot {}: {}", tmp_path.display(), e),
        })?;
        if let Err(e) = std::fs::rename(&tmp_path, path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(RatingError::StorageUnavailable {
                message: format!("Failed to replace snapshot {}: {}", path.display(), e),
            });
        }

        debug!("Wrote {} items to snapshot {}", count, path.display());
        Ok(count)
    }
}

impl RatingStore for InMemoryRatingStore {
    fn get(&self, id: &ItemId) -> Result<RatableItem> {
        let inner = self
            .inner
            .read()
            .map_err(|_| RatingError::lock_poisoned("store read"))?;

        inner
            .items
            .get(id)
            .cloned()
            .ok_or_else(|| RatingError::NotFound {
                item_id: id.clone(),
            })
    }

    fn insert(&self, item: RatableItem) -> Result<RatableItem> {
        if !item.rating.is_finite() {
            return Err(RatingError::InvalidItem {
                reason: format!("Rating for {} is not finite", item.id),
            });
        }

        let mut inner = self
            .inner
            .write()
            .map_err(|_| RatingError::lock_poisoned("store write"))?;

        if inner.items.contains_key(&item.id) {
            return Err(RatingError::Conflict {
                item_id: item.id.clone(),
            });
        }

        inner.push(item.clone());
        debug!("Inserted item {} at rating {}", item.id, item.rating);
        Ok(item)
    }

    fn random_distinct_pair(&self) -> Result<(RatableItem, RatableItem)> {
        let inner = self
            .inner
            .read()
            .map_err(|_| RatingError::lock_poisoned("store read"))?;

        let available = inner.ids.len();
        if available < 2 {
            return Err(RatingError::InsufficientItems { available });
        }

        let mut rng = rand::rng();
        let first = rng.random_range(0..available);

        let mut second = None;
        for _ in 0..MAX_PAIR_DRAWS {
            let candidate = rng.random_range(0..available);
            if candidate != first {
                second = Some(candidate);
                break;
            }
        }
        let second = match second {
            Some(index) => index,
            None => skip_index(first, rng.random_range(0..available - 1)),
        };

        Ok((inner.item_at(first)?, inner.item_at(second)?))
    }

    fn apply_outcome(
        &self,
        winner_id: &ItemId,
        loser_id: &ItemId,
        calculator: &dyn RatingCalculator,
    ) -> Result<OutcomeReport> {
        if winner_id == loser_id {
            return Err(RatingError::InvalidOutcome {
                reason: format!("Item {} cannot be compared with itself", winner_id),
            });
        }

        let mut inner = self
            .inner
            .write()
            .map_err(|_| RatingError::lock_poisoned("store write"))?;

        let winner = inner
            .items
            .get(winner_id)
            .cloned()
            .ok_or_else(|| RatingError::Conflict {
                item_id: winner_id.clone(),
            })?;
        let loser = inner
            .items
            .get(loser_id)
            .cloned()
            .ok_or_else(|| RatingError::Conflict {
                item_id: loser_id.clone(),
            })?;

        let ratings = calculator.calculate_outcome(&winner, &loser)?;
        let new_winner_rating = ensure_finite(ratings.winner_rating, "updated winner")?;
        let new_loser_rating = ensure_finite(ratings.loser_rating, "updated loser")?;

        let now = current_timestamp();
        if let Some(item) = inner.items.get_mut(winner_id) {
            item.apply_rating(new_winner_rating, now);
        }
        if let Some(item) = inner.items.get_mut(loser_id) {
            item.apply_rating(new_loser_rating, now);
        }

        Ok(OutcomeReport {
            winner: RatingChange {
                item_id: winner.id,
                old_rating: winner.rating,
                new_rating: new_winner_rating,
                comparisons: winner.comparisons + 1,
            },
            loser: RatingChange {
                item_id: loser.id,
                old_rating: loser.rating,
                new_rating: new_loser_rating,
                comparisons: loser.comparisons + 1,
            },
            expected_winner_score: ratings.expected_winner_score,
            k_factor: ratings.k_factor,
        })
    }

    fn list_all(&self, query: &ListQuery) -> Result<ItemIter> {
        let inner = self
            .inner
            .read()
            .map_err(|_| RatingError::lock_poisoned("store read"))?;

        let mut items: Vec<RatableItem> = inner
            .items
            .values()
            .filter(|item| match &query.creator {
                Some(creator) => item.creator.as_deref() == Some(creator.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        drop(inner);

        match query.order {
            ListOrder::RatingDesc => items.sort_by(|a, b| {
                b.rating
                    .total_cmp(&a.rating)
                    .then_with(|| a.id.cmp(&b.id))
            }),
            ListOrder::Id => items.sort_by(|a, b| a.id.cmp(&b.id)),
        }

        if let Some(limit) = query.limit {
            items.truncate(limit);
        }

        Ok(Box::new(items.into_iter()))
    }

    fn count(&self) -> Result<usize> {
        let inner = self
            .inner
            .read()
            .map_err(|_| RatingError::lock_poisoned("store read"))?;

        Ok(inner.ids.len())
    }
}
