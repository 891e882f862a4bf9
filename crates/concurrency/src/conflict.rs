//! Conflict resolution after commit
//!
//! A key conflicts when its shared value changed between the moment the
//! transaction observed it and the moment the transaction committed. The
//! map is a read-through cache over an authoritative source, so the default
//! answer is to drop the key and let the next reader reload it.

use tracing::warn;
use txmap_core::{CacheKey, CacheValue};
use txmap_storage::{CommitOutcome, SharedMapBackend};

/// Policy applied once per commit to the keys whose merge failed
pub trait ConflictResolver<K, V>: Send + Sync {
    /// Resolve the conflicts in `outcome` against `shared`
    fn resolve(&self, shared: &dyn SharedMapBackend<K, V>, outcome: &CommitOutcome<K>);
}

/// Evict every conflicted key from the shared map
#[derive(Debug, Clone, Copy, Default)]
pub struct EvictOnConflict;

impl<K: CacheKey, V: CacheValue> ConflictResolver<K, V> for EvictOnConflict {
    fn resolve(&self, shared: &dyn SharedMapBackend<K, V>, outcome: &CommitOutcome<K>) {
        for key in outcome.conflicts() {
            let evicted = shared.evict(key);
            warn!(key = ?key, evicted = evicted.is_some(), "Commit conflict, key evicted");
        }
    }
}

/// Leave the value that won the race in place
#[derive(Debug, Clone, Copy, Default)]
pub struct RetainOnConflict;

impl<K: CacheKey, V: CacheValue> ConflictResolver<K, V> for RetainOnConflict {
    fn resolve(&self, _shared: &dyn SharedMapBackend<K, V>, outcome: &CommitOutcome<K>) {
        if !outcome.is_clean() {
            warn!(
                conflicts = outcome.conflict_count(),
                "Commit conflicts, shared values retained"
            );
        }
    }
}
