//! Per-transaction overlay over the shared map
//!
//! The overlay records two deltas:
//! - `removed`: key → shared value observed when the key was removed
//!   (`None` if nothing was there)
//! - `inserted`: key → value written by this transaction
//!
//! # Read view
//!
//! ```text
//! key in inserted          → inserted value
//! key in removed           → absent (even if the shared map has a newer value)
//! otherwise                → shared value
//! ```
//!
//! The overlay is owned by exactly one transaction and has no concurrency
//! concerns of its own.

use rustc_hash::{FxHashMap, FxHashSet};
use txmap_core::{CacheKey, CacheValue};
use txmap_storage::{PendingChange, SharedView};

/// Where a key's visible value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a, V> {
    /// Written by this transaction
    Inserted(&'a V),
    /// Removed by this transaction
    Removed,
    /// Not touched; read the shared view
    Untouched,
}

/// Removed/inserted deltas of one transaction
#[derive(Debug, Clone)]
pub struct Overlay<K, V> {
    removed: FxHashMap<K, Option<V>>,
    inserted: FxHashMap<K, V>,
}

impl<K: CacheKey, V: CacheValue> Default for Overlay<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: CacheKey, V: CacheValue> Overlay<K, V> {
    /// Empty overlay
    pub fn new() -> Self {
        Self {
            removed: FxHashMap::default(),
            inserted: FxHashMap::default(),
        }
    }

    /// Classify `key`
    pub fn lookup(&self, key: &K) -> Lookup<'_, V> {
        if let Some(value) = self.inserted.get(key) {
            Lookup::Inserted(value)
        } else if self.removed.contains_key(key) {
            Lookup::Removed
        } else {
            Lookup::Untouched
        }
    }

    /// True if `key` has a removal recorded
    pub fn is_removed(&self, key: &K) -> bool {
        self.removed.contains_key(key)
    }

    /// True if `key` has a pending insertion
    pub fn is_inserted(&self, key: &K) -> bool {
        self.inserted.contains_key(key)
    }

    /// Number of recorded removals
    pub fn removed_len(&self) -> usize {
        self.removed.len()
    }

    /// Number of pending insertions
    pub fn inserted_len(&self) -> usize {
        self.inserted.len()
    }

    /// True if the overlay holds any delta
    pub fn is_dirty(&self) -> bool {
        !self.removed.is_empty() || !self.inserted.is_empty()
    }

    /// Visible value for `key`
    pub fn get(&self, key: &K, shared: &SharedView<K, V>) -> Option<V> {
        match self.lookup(key) {
            Lookup::Inserted(value) => Some(value.clone()),
            Lookup::Removed => None,
            Lookup::Untouched => shared.get(key),
        }
    }

    /// True if `key` is visible
    pub fn contains_key(&self, key: &K, shared: &SharedView<K, V>) -> bool {
        self.inserted.contains_key(key)
            || (!self.removed.contains_key(key) && shared.contains_key(key))
    }

    /// Record a write of `value`
    ///
    /// `shared_value` is the shared value for `key` as seen by the caller.
    /// A write over a shared value is recorded as remove-then-insert so the
    /// commit can check that the shared value is still the one replaced.
    ///
    /// Returns the previously visible value.
    pub fn record_put(&mut self, key: K, value: V, shared_value: Option<V>) -> Option<V> {
        let previous = self.inserted.insert(key.clone(), value);
        if !self.removed.contains_key(&key) {
            if let Some(shared) = shared_value {
                self.removed.insert(key, Some(shared.clone()));
                return previous.or(Some(shared));
            }
        }
        previous
    }

    /// Record a removal of `key`
    ///
    /// Removing a key twice returns `None` the second time and leaves the
    /// overlay as it was after the first removal.
    ///
    /// Returns the previously visible value.
    pub fn record_remove(&mut self, key: &K, shared: &SharedView<K, V>) -> Option<V> {
        if let Some(value) = self.inserted.remove(key) {
            return Some(value);
        }
        if self.removed.contains_key(key) {
            return None;
        }
        let shared_value = shared.get(key);
        self.removed.insert(key.clone(), shared_value.clone());
        shared_value
    }

    /// Number of visible entries
    ///
    /// Proportional to the overlay size, not the shared map size: every
    /// overlay key that shadows a shared entry is subtracted once.
    pub fn len(&self, shared: &SharedView<K, V>) -> usize {
        let shadowed = self
            .removed
            .keys()
            .chain(self.inserted.keys().filter(|k| !self.removed.contains_key(*k)))
            .filter(|k| shared.contains_key(*k))
            .count();
        (shared.len() + self.inserted.len()).saturating_sub(shadowed)
    }

    /// Hide every visible key
    ///
    /// Keys already removed keep the shared value they recorded; every other
    /// visible key records its current shared value. Pending insertions are
    /// dropped.
    pub fn clear_visible(&mut self, shared: &SharedView<K, V>) {
        for (key, value) in shared.entries() {
            self.removed.entry(key).or_insert(Some(value));
        }
        for key in std::mem::take(&mut self.inserted).into_keys() {
            if !self.removed.contains_key(&key) {
                let shared_value = shared.get(&key);
                self.removed.insert(key, shared_value);
            }
        }
    }

    /// Keys shadowed by a removal and a copy of the pending insertions
    pub fn shadow(&self) -> (FxHashSet<K>, FxHashMap<K, V>) {
        (self.removed.keys().cloned().collect(), self.inserted.clone())
    }

    /// Drain the overlay into one pending change per touched key
    pub fn take_changes(&mut self) -> Vec<(K, PendingChange<V>)> {
        let mut inserted = std::mem::take(&mut self.inserted);
        let removed = std::mem::take(&mut self.removed);
        let mut changes = Vec::with_capacity(removed.len() + inserted.len());

        for (key, expected) in removed {
            let value = inserted.remove(&key);
            if let Some(change) = PendingChange::from_overlay(Some(expected), value) {
                changes.push((key, change));
            }
        }
        for (key, value) in inserted {
            changes.push((key, PendingChange::Insert { value }));
        }
        changes
    }

    /// Drop every delta
    pub fn discard(&mut self) {
        self.removed.clear();
        self.inserted.clear();
    }
}
