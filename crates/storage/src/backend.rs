//! Shared map strategy interface
//!
//! Two implementations exist and are selected at construction:
//!
//! | Strategy       | Reads                         | Commit                               |
//! |----------------|-------------------------------|--------------------------------------|
//! | `LockFree`     | live, always current          | one CAS per key, never blocks        |
//! | `CopyOnWrite`  | pinned snapshot per view      | copy, reconcile, publish under mutex |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use txmap_core::{CacheEntryFilter, CacheKey, CacheValue};

use crate::copy_on_write::CopyOnWriteBackend;
use crate::lock_free::LockFreeBackend;
use crate::view::SharedView;
use crate::writeset::{CommitOutcome, PendingChange};

/// Which shared map implementation backs a cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Concurrent hash map with per-key compare-and-swap commits
    #[default]
    LockFree,
    /// Immutable snapshot replaced atomically on every commit
    CopyOnWrite,
}

impl Strategy {
    /// Create an empty backend of this strategy
    pub fn create<K: CacheKey, V: CacheValue>(self) -> Arc<dyn SharedMapBackend<K, V>> {
        match self {
            Strategy::LockFree => Arc::new(LockFreeBackend::new()),
            Strategy::CopyOnWrite => Arc::new(CopyOnWriteBackend::new()),
        }
    }

    /// Name used in configuration files
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::LockFree => "lock-free",
            Strategy::CopyOnWrite => "copy-on-write",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage for the state visible to every transaction
///
/// Thread safety: all methods may be called concurrently from any thread.
/// None of them blocks beyond a short critical section.
pub trait SharedMapBackend<K, V>: Send + Sync {
    /// Strategy of this backend
    fn strategy(&self) -> Strategy;

    /// Read view for a transaction
    ///
    /// Lock-free backends return a live view; copy-on-write backends return
    /// the snapshot current at the time of the call.
    fn view(&self) -> SharedView<K, V>;

    /// Current value for `key`
    fn get(&self, key: &K) -> Option<V>;

    /// True if `key` currently has a value
    fn contains_key(&self, key: &K) -> bool;

    /// Number of entries
    fn len(&self) -> usize;

    /// True if the map has no entries
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert `value` only if `key` is absent
    ///
    /// Returns `false` if another writer got there first; the shared map is
    /// left untouched in that case.
    fn fast_forward(&self, key: K, value: V) -> bool;

    /// Merge a transaction's pending changes
    ///
    /// Each key is reconciled against the current shared value exactly once.
    /// Failures are reported per key in the outcome, never retried.
    fn apply(&self, changes: Vec<(K, PendingChange<V>)>) -> CommitOutcome<K>;

    /// Remove `key` unconditionally, returning the removed value
    fn evict(&self, key: &K) -> Option<V>;

    /// Write `value` unconditionally, returning the previous value
    ///
    /// Only for callers outside of any transaction.
    fn put_direct(&self, key: K, value: V) -> Option<V>;

    /// Remove every entry
    fn clear(&self);

    /// Remove every entry accepted by `filter`, returning how many were removed
    fn remove_matching(&self, filter: &dyn CacheEntryFilter<K, V>) -> usize;
}
