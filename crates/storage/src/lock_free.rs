//! Lock-free shared map strategy
//!
//! Shared state lives in a `DashMap`. Commit reconciles each key with a
//! single atomic primitive on its shard (`remove_if`, conditional
//! `get_mut`, `entry`). A failed primitive is a conflict for that key; it is
//! never retried.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::trace;
use txmap_core::{CacheEntryFilter, CacheKey, CacheValue};

use crate::backend::{SharedMapBackend, Strategy};
use crate::view::SharedView;
use crate::writeset::{CommitOutcome, KeyCommit, PendingChange};

/// Shared map backed by a concurrent hash map
pub struct LockFreeBackend<K, V> {
    map: Arc<DashMap<K, V>>,
}

impl<K: CacheKey, V: CacheValue> LockFreeBackend<K, V> {
    /// Create an empty backend
    pub fn new() -> Self {
        Self {
            map: Arc::new(DashMap::new()),
        }
    }

    fn replace(&self, key: &K, expected: &V, value: V) -> bool {
        match self.map.get_mut(key) {
            Some(mut current) if *current == *expected => {
                *current = value;
                true
            }
            _ => false,
        }
    }

    fn put_if_absent(&self, key: K, value: V) -> Result<(), V> {
        match self.map.entry(key) {
            Entry::Occupied(occupied) => Err(occupied.get().clone()),
            Entry::Vacant(vacant) => {
                vacant.insert(value);
                Ok(())
            }
        }
    }

    fn apply_one(&self, key: &K, change: PendingChange<V>) -> KeyCommit {
        match change {
            PendingChange::Remove {
                expected: Some(expected),
            } => {
                if self.map.remove_if(key, |_, v| *v == expected).is_some() {
                    KeyCommit::Removed
                } else {
                    KeyCommit::RemoveConflict
                }
            }
            PendingChange::Remove { expected: None } => {
                if self.map.contains_key(key) {
                    KeyCommit::RemoveConflict
                } else {
                    KeyCommit::Unchanged
                }
            }
            PendingChange::Replace {
                expected: Some(expected),
                value,
            } => {
                if self.replace(key, &expected, value) {
                    KeyCommit::Inserted
                } else {
                    KeyCommit::InsertConflict
                }
            }
            PendingChange::Replace {
                expected: None,
                value,
            } => match self.put_if_absent(key.clone(), value) {
                Ok(()) => KeyCommit::Inserted,
                Err(_) => KeyCommit::InsertConflict,
            },
            PendingChange::Insert { value } => {
                let wanted = value.clone();
                match self.put_if_absent(key.clone(), value) {
                    Ok(()) => KeyCommit::Inserted,
                    Err(existing) if existing == wanted => KeyCommit::Inserted,
                    Err(_) => KeyCommit::InsertConflict,
                }
            }
        }
    }
}

impl<K: CacheKey, V: CacheValue> Default for LockFreeBackend<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: CacheKey, V: CacheValue> SharedMapBackend<K, V> for LockFreeBackend<K, V> {
    fn strategy(&self) -> Strategy {
        Strategy::LockFree
    }

    fn view(&self) -> SharedView<K, V> {
        SharedView::Live(Arc::clone(&self.map))
    }

    fn get(&self, key: &K) -> Option<V> {
        self.map.get(key).map(|entry| entry.value().clone())
    }

    fn contains_key(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn fast_forward(&self, key: K, value: V) -> bool {
        self.put_if_absent(key, value).is_ok()
    }

    fn apply(&self, changes: Vec<(K, PendingChange<V>)>) -> CommitOutcome<K> {
        let mut outcome = CommitOutcome::with_capacity(changes.len());
        for (key, change) in changes {
            let result = self.apply_one(&key, change);
            outcome.record(key, result);
        }
        trace!(
            applied = outcome.success_count(),
            conflicts = outcome.conflict_count(),
            "Applied change set"
        );
        outcome
    }

    fn evict(&self, key: &K) -> Option<V> {
        self.map.remove(key).map(|(_, v)| v)
    }

    fn put_direct(&self, key: K, value: V) -> Option<V> {
        self.map.insert(key, value)
    }

    fn clear(&self) {
        self.map.clear();
    }

    fn remove_matching(&self, filter: &dyn CacheEntryFilter<K, V>) -> usize {
        if let Some(keys) = filter.keys() {
            return keys
                .iter()
                .filter(|key| self.map.remove_if(*key, |k, v| filter.accept(k, v)).is_some())
                .count();
        }
        let mut removed = 0;
        self.map.retain(|k, v| {
            let matched = filter.accept(k, v);
            if matched {
                removed += 1;
            }
            !matched
        });
        removed
    }
}
