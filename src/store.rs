//! In-memory item store.
//!
//! [`ItemStore`] is the single owner of every [`Item`]. The map and the id
//! counter sit behind one `parking_lot::Mutex`, and every operation holds it
//! for its whole duration, so:
//!
//! - concurrent `create` calls never observe the same counter value,
//! - `toggle`/`delete` never see a half-written item,
//! - `list` never sees a partial insert or removal.
//!
//! Nothing under the lock performs I/O, so a single coarse lock is enough.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// A tracked item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Unique id, assigned in creation order starting at 1
    pub id: u64,
    /// Trimmed, non-empty title
    pub title: String,
    /// Completion flag
    pub done: bool,
}

/// Errors returned by store operations.
///
/// A failed operation never changes the store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Input failed a precondition (e.g. blank title)
    #[error("{0}")]
    Validation(String),

    /// No item with this id (never existed or already deleted)
    #[error("item {0} not found")]
    NotFound(u64),
}

#[derive(Debug, Default)]
struct Inner {
    items: BTreeMap<u64, Item>,
    /// Highest id ever issued. Never decremented.
    last_id: u64,
}

/// Authoritative collection of items.
#[derive(Debug, Default)]
pub struct ItemStore {
    inner: Mutex<Inner>,
}

impl ItemStore {
    /// Create an empty store. The first created item gets id 1.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Items whose title contains `filter` (case-insensitive), by ascending id.
    ///
    /// `None` or an empty filter returns every item.
    pub fn list(&self, filter: Option<&str>) -> Vec<Item> {
        let needle = filter.filter(|f| !f.is_empty()).map(str::to_lowercase);
        let inner = self.inner.lock();

        inner
            .items
            .values()
            .filter(|item| {
                needle
                    .as_deref()
                    .is_none_or(|n| item.title.to_lowercase().contains(n))
            })
            .cloned()
            .collect()
    }

    /// Create an item from `title` (trimmed) with `done = false`.
    ///
    /// A blank title is rejected without advancing the id counter.
    pub fn create(&self, title: &str) -> Result<Item, StoreError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(StoreError::Validation("title is required".to_string()));
        }

        let mut inner = self.inner.lock();
        inner.last_id += 1;
        let item = Item {
            id: inner.last_id,
            title: title.to_string(),
            done: false,
        };
        inner.items.insert(item.id, item.clone());
        drop(inner);

        debug!(id = item.id, title = %item.title, "Created item");
        Ok(item)
    }

    /// Flip `done` on an existing item and return the updated item.
    pub fn toggle(&self, id: u64) -> Result<Item, StoreError> {
        let mut inner = self.inner.lock();
        let item = inner.items.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        item.done = !item.done;
        let updated = item.clone();
        drop(inner);

        debug!(id, done = updated.done, "Toggled item");
        Ok(updated)
    }

    /// Remove an item permanently. Its id is never issued again.
    pub fn delete(&self, id: u64) -> Result<(), StoreError> {
        let removed = self.inner.lock().items.remove(&id);
        if removed.is_none() {
            return Err(StoreError::NotFound(id));
        }

        debug!(id, "Deleted item");
        Ok(())
    }

    /// Number of stored items
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Whether the store holds no items
    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// Highest id issued so far (0 before the first create)
    pub fn last_id(&self) -> u64 {
        self.inner.lock().last_id
    }
}
