//! Read view of the shared map
//!
//! The two strategies differ in isolation, and the difference is visible
//! here:
//! - `Live` reads always see the latest committed state
//! - `Snapshot` reads see the state published when the view was taken

use dashmap::DashMap;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use txmap_core::{CacheKey, CacheValue};

/// What a transaction reads through for keys it has not touched
pub enum SharedView<K, V> {
    /// Read-through to the concurrent map
    Live(Arc<DashMap<K, V>>),
    /// Pinned immutable snapshot
    Snapshot(Arc<FxHashMap<K, V>>),
}

impl<K, V> Clone for SharedView<K, V> {
    fn clone(&self) -> Self {
        match self {
            SharedView::Live(map) => SharedView::Live(Arc::clone(map)),
            SharedView::Snapshot(map) => SharedView::Snapshot(Arc::clone(map)),
        }
    }
}

impl<K: CacheKey, V: CacheValue> SharedView<K, V> {
    /// Value for `key` in this view
    pub fn get(&self, key: &K) -> Option<V> {
        match self {
            SharedView::Live(map) => map.get(key).map(|entry| entry.value().clone()),
            SharedView::Snapshot(map) => map.get(key).cloned(),
        }
    }

    /// True if `key` has a value in this view
    pub fn contains_key(&self, key: &K) -> bool {
        match self {
            SharedView::Live(map) => map.contains_key(key),
            SharedView::Snapshot(map) => map.contains_key(key),
        }
    }

    /// Number of entries in this view
    pub fn len(&self) -> usize {
        match self {
            SharedView::Live(map) => map.len(),
            SharedView::Snapshot(map) => map.len(),
        }
    }

    /// True if this view has no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if any entry holds `value`
    pub fn contains_value(&self, value: &V) -> bool {
        match self {
            SharedView::Live(map) => map.iter().any(|entry| entry.value() == value),
            SharedView::Snapshot(map) => map.values().any(|v| v == value),
        }
    }

    /// Owned copy of all entries
    ///
    /// Live views are copied shard by shard; no shard lock is held once this
    /// returns, so callers may write to the map while walking the result.
    pub fn entries(&self) -> Vec<(K, V)> {
        match self {
            SharedView::Live(map) => map
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect(),
            SharedView::Snapshot(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
    }

    /// Make a value the owner wrote straight into the shared map visible in
    /// this view without moving the pin
    ///
    /// Live views already see the write. A snapshot is copied on the first
    /// call if other holders share it; later calls update the private copy.
    pub fn absorb(&mut self, key: K, value: V) {
        if let SharedView::Snapshot(map) = self {
            Arc::make_mut(map).insert(key, value);
        }
    }

    /// True for read-through views
    pub fn is_live(&self) -> bool {
        matches!(self, SharedView::Live(_))
    }
}
