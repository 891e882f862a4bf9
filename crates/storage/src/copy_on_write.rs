//! Copy-on-write shared map strategy
//!
//! Shared state is an immutable `Arc<FxHashMap>`. Writers (commit,
//! fast-forward, eviction) serialize on one mutex, copy the current
//! snapshot, apply their changes to the copy and publish it with a single
//! pointer swap. Readers never take the mutex and always see a complete
//! snapshot, either the old or the new one.

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::trace;
use txmap_core::{CacheEntryFilter, CacheKey, CacheValue};

use crate::backend::{SharedMapBackend, Strategy};
use crate::view::SharedView;
use crate::writeset::{CommitOutcome, KeyCommit, PendingChange};

/// Shared map published as immutable snapshots
pub struct CopyOnWriteBackend<K, V> {
    /// Currently published snapshot; the lock only guards the pointer
    current: RwLock<Arc<FxHashMap<K, V>>>,
    /// Serializes writers
    write_lock: Mutex<()>,
}

impl<K: CacheKey, V: CacheValue> CopyOnWriteBackend<K, V> {
    /// Create an empty backend
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(FxHashMap::default())),
            write_lock: Mutex::new(()),
        }
    }

    /// The currently published snapshot
    pub fn snapshot(&self) -> Arc<FxHashMap<K, V>> {
        Arc::clone(&self.current.read())
    }

    fn publish(&self, next: FxHashMap<K, V>) {
        trace!(entries = next.len(), "Publishing snapshot");
        *self.current.write() = Arc::new(next);
    }

    /// Run `f` on a private copy of the current snapshot and publish the copy
    /// if `f` reports a change. Must be called with `write_lock` held.
    fn mutate<R>(&self, f: impl FnOnce(&mut FxHashMap<K, V>) -> (R, bool)) -> R {
        let mut next = (*self.snapshot()).clone();
        let (result, changed) = f(&mut next);
        if changed {
            self.publish(next);
        }
        result
    }
}

impl<K: CacheKey, V: CacheValue> Default for CopyOnWriteBackend<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Reconcile one change against the copy being built
///
/// The writer lock makes the equality checks as strong as a CAS.
fn apply_change<K: CacheKey, V: CacheValue>(
    map: &mut FxHashMap<K, V>,
    key: &K,
    change: PendingChange<V>,
) -> KeyCommit {
    match change {
        PendingChange::Remove {
            expected: Some(expected),
        } => {
            if map.get(key) == Some(&expected) {
                map.remove(key);
                KeyCommit::Removed
            } else {
                KeyCommit::RemoveConflict
            }
        }
        PendingChange::Remove { expected: None } => {
            if map.contains_key(key) {
                KeyCommit::RemoveConflict
            } else {
                KeyCommit::Unchanged
            }
        }
        PendingChange::Replace { expected, value } => {
            if map.get(key) == expected.as_ref() {
                map.insert(key.clone(), value);
                KeyCommit::Inserted
            } else {
                KeyCommit::InsertConflict
            }
        }
        PendingChange::Insert { value } => match map.get(key) {
            None => {
                map.insert(key.clone(), value);
                KeyCommit::Inserted
            }
            Some(existing) if *existing == value => KeyCommit::Inserted,
            Some(_) => KeyCommit::InsertConflict,
        },
    }
}

impl<K: CacheKey, V: CacheValue> SharedMapBackend<K, V> for CopyOnWriteBackend<K, V> {
    fn strategy(&self) -> Strategy {
        Strategy::CopyOnWrite
    }

    fn view(&self) -> SharedView<K, V> {
        SharedView::Snapshot(self.snapshot())
    }

    fn get(&self, key: &K) -> Option<V> {
        self.current.read().get(key).cloned()
    }

    fn contains_key(&self, key: &K) -> bool {
        self.current.read().contains_key(key)
    }

    fn len(&self) -> usize {
        self.current.read().len()
    }

    fn fast_forward(&self, key: K, value: V) -> bool {
        let _guard = self.write_lock.lock();
        if self.current.read().contains_key(&key) {
            return false;
        }
        self.mutate(|map| {
            map.insert(key, value);
            ((), true)
        });
        true
    }

    fn apply(&self, changes: Vec<(K, PendingChange<V>)>) -> CommitOutcome<K> {
        if changes.is_empty() {
            return CommitOutcome::new();
        }
        let _guard = self.write_lock.lock();
        self.mutate(|map| {
            let mut outcome = CommitOutcome::with_capacity(changes.len());
            let mut changed = false;
            for (key, change) in changes {
                let result = apply_change(map, &key, change);
                changed |= matches!(result, KeyCommit::Inserted | KeyCommit::Removed);
                outcome.record(key, result);
            }
            trace!(
                applied = outcome.success_count(),
                conflicts = outcome.conflict_count(),
                published = changed,
                "Applied change set"
            );
            (outcome, changed)
        })
    }

    fn evict(&self, key: &K) -> Option<V> {
        let _guard = self.write_lock.lock();
        if !self.current.read().contains_key(key) {
            return None;
        }
        self.mutate(|map| (map.remove(key), true))
    }

    fn put_direct(&self, key: K, value: V) -> Option<V> {
        let _guard = self.write_lock.lock();
        self.mutate(|map| (map.insert(key, value), true))
    }

    fn clear(&self) {
        let _guard = self.write_lock.lock();
        self.publish(FxHashMap::default());
    }

    fn remove_matching(&self, filter: &dyn CacheEntryFilter<K, V>) -> usize {
        let _guard = self.write_lock.lock();
        self.mutate(|map| {
            let before = map.len();
            match filter.keys() {
                Some(keys) => {
                    for key in keys {
                        if map.get(&key).is_some_and(|v| filter.accept(&key, v)) {
                            map.remove(&key);
                        }
                    }
                }
                None => map.retain(|k, v| !filter.accept(k, v)),
            }
            let removed = before - map.len();
            (removed, removed > 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::thread;
    use txmap_core::{AllEntriesFilter, KeyFilter};

    static_assertions::assert_impl_all!(CopyOnWriteBackend<String, String>: Send, Sync);

    #[test]
    fn test_view_is_pinned_snapshot() {
        let backend = CopyOnWriteBackend::new();
        backend.put_direct("a", 1);

        let view = backend.view();
        backend.put_direct("b", 2);
        backend.evict(&"a");

        assert_eq!(view.get(&"a"), Some(1));
        assert!(view.get(&"b").is_none());
        assert_eq!(backend.get(&"b"), Some(2));
        assert!(!backend.contains_key(&"a"));
    }

    #[test]
    fn test_apply_reconciles_against_current() {
        let backend = CopyOnWriteBackend::new();
        backend.put_direct("a", 1);
        backend.put_direct("b", 2);

        let outcome = backend.apply(vec![
            ("a", PendingChange::Remove { expected: Some(1) }),
            (
                "b",
                PendingChange::Replace {
                    expected: Some(9),
                    value: 3,
                },
            ),
            (
                "c",
                PendingChange::Replace {
                    expected: None,
                    value: 4,
                },
            ),
        ]);

        let results: Vec<_> = outcome.iter().map(|(_, r)| r).collect();
        assert_eq!(
            results,
            vec![
                KeyCommit::Removed,
                KeyCommit::InsertConflict,
                KeyCommit::Inserted
            ]
        );
        assert!(!backend.contains_key(&"a"));
        assert_eq!(backend.get(&"b"), Some(2));
        assert_eq!(backend.get(&"c"), Some(4));
    }

    #[test]
    fn test_conflict_only_commit_does_not_publish() {
        let backend = CopyOnWriteBackend::new();
        backend.put_direct("a", 1);
        let before = backend.snapshot();

        let outcome = backend.apply(vec![("a", PendingChange::Insert { value: 2 })]);
        assert_eq!(outcome.conflict_count(), 1);
        assert!(Arc::ptr_eq(&before, &backend.snapshot()));
    }

    #[test]
    fn test_fast_forward() {
        let backend = CopyOnWriteBackend::new();
        assert!(backend.fast_forward("a", 1));
        assert!(!backend.fast_forward("a", 2));
        assert_eq!(backend.get(&"a"), Some(1));
    }

    #[test]
    fn test_remove_matching_and_clear() {
        let backend = CopyOnWriteBackend::new();
        for (k, v) in [("a", 1), ("b", 2), ("c", 3)] {
            backend.put_direct(k, v);
        }
        assert_eq!(backend.remove_matching(&KeyFilter::new(vec!["a", "b"])), 2);
        assert_eq!(backend.remove_matching(&KeyFilter::new(vec!["a"])), 0);
        assert_eq!(backend.remove_matching(&AllEntriesFilter), 1);

        backend.put_direct("d", 4);
        backend.clear();
        assert!(backend.is_empty());
    }

    #[test]
    fn test_readers_see_whole_snapshots() {
        // Each commit writes the same value to every key; a reader must
        // never observe two different values within one snapshot.
        let backend = Arc::new(CopyOnWriteBackend::<u32, u64>::new());
        for key in 0..16 {
            backend.put_direct(key, 0);
        }

        let writer = {
            let backend = Arc::clone(&backend);
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                for round in 0..200u64 {
                    let changes = (0..16)
                        .map(|key| {
                            (
                                key,
                                PendingChange::Replace {
                                    expected: Some(round),
                                    value: round + 1,
                                },
                            )
                        })
                        .collect();
                    let outcome = backend.apply(changes);
                    assert!(outcome.is_clean());
                    if rng.gen_bool(0.1) {
                        thread::yield_now();
                    }
                }
            })
        };

        for _ in 0..200 {
            let snapshot = backend.snapshot();
            let first = snapshot[&0];
            assert!(snapshot.values().all(|v| *v == first));
        }
        writer.join().unwrap();
        assert_eq!(backend.get(&7), Some(200));
    }
}
