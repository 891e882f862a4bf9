//! Cache entry filters
//!
//! A filter selects entries to invalidate. The same filter value is applied
//! locally and handed to the invalidation notifier so remote nodes can apply
//! it to their own copies.

use rustc_hash::FxHashSet;
use std::fmt;
use std::hash::Hash;

/// Predicate over cache entries
pub trait CacheEntryFilter<K, V>: Send + Sync {
    /// True if the entry should be affected
    fn accept(&self, key: &K, value: &V) -> bool;

    /// Explicit key set, when the filter is defined by keys alone
    ///
    /// Lets callers skip a full scan of the map.
    fn keys(&self) -> Option<Vec<K>> {
        None
    }
}

/// Matches every entry
#[derive(Debug, Clone, Copy, Default)]
pub struct AllEntriesFilter;

impl<K, V> CacheEntryFilter<K, V> for AllEntriesFilter {
    fn accept(&self, _key: &K, _value: &V) -> bool {
        true
    }
}

/// Matches a fixed set of keys
#[derive(Debug, Clone)]
pub struct KeyFilter<K: Eq + Hash> {
    keys: FxHashSet<K>,
}

impl<K: Eq + Hash> KeyFilter<K> {
    /// Create a filter matching exactly `keys`
    pub fn new(keys: impl IntoIterator<Item = K>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    /// Number of keys in the filter
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True if the filter matches nothing
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Merge another key filter into this one
    pub fn coalesce(&mut self, other: KeyFilter<K>) {
        self.keys.extend(other.keys);
    }
}

impl<K, V> CacheEntryFilter<K, V> for KeyFilter<K>
where
    K: Eq + Hash + Clone + Send + Sync,
{
    fn accept(&self, key: &K, _value: &V) -> bool {
        self.keys.contains(key)
    }

    fn keys(&self) -> Option<Vec<K>> {
        Some(self.keys.iter().cloned().collect())
    }
}

/// Matches entries selected by a closure
pub struct PredicateFilter<F> {
    predicate: F,
}

impl<F> PredicateFilter<F> {
    /// Wrap a predicate
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<F> fmt::Debug for PredicateFilter<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateFilter").finish_non_exhaustive()
    }
}

impl<K, V, F> CacheEntryFilter<K, V> for PredicateFilter<F>
where
    F: Fn(&K, &V) -> bool + Send + Sync,
{
    fn accept(&self, key: &K, value: &V) -> bool {
        (self.predicate)(key, value)
    }
}
