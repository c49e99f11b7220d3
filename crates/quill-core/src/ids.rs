//! Article and series ID allocation
//!
//! Ids below the visibility boundary are reserved for static pages, so
//! chronological content asks for an id with a floor. The sequence jumps
//! straight to the floor rather than drawing and discarding ids below it.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::error::{IndexError, IndexResult};
use crate::storage::ArticleStore;

/// Source of unique, increasing ids
pub trait IdGenerator: Send + Sync {
    /// Return an id `>= floor`, greater than every id returned before
    fn next_id(&self, floor: i64) -> IndexResult<i64>;
}

/// In-process counter seeded from the store's largest id
#[derive(Debug, Default)]
pub struct SequenceIdGenerator {
    last: AtomicI64,
}

impl SequenceIdGenerator {
    /// Start after `last`
    pub fn starting_after(last: i64) -> Self {
        Self {
            last: AtomicI64::new(last),
        }
    }

    /// Seed from the largest article or series id already stored
    pub fn from_store(store: &dyn ArticleStore) -> IndexResult<Self> {
        let last = store.max_id()?.unwrap_or(0);
        Ok(Self::starting_after(last))
    }

    /// The most recently issued id
    pub fn last(&self) -> i64 {
        self.last.load(Ordering::SeqCst)
    }
}

impl IdGenerator for SequenceIdGenerator {
    fn next_id(&self, floor: i64) -> IndexResult<i64> {
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                last.checked_add(1).map(|next| next.max(floor))
            })
            .map_err(|last| IndexError::IdGenerator(format!("id space exhausted after {last}")))?;
        Ok(previous.saturating_add(1).max(floor))
    }
}
