//! Transaction write-set types
//!
//! A transaction hands its overlay to the backend as a list of
//! [`PendingChange`]s, one per touched key, and gets back a
//! [`CommitOutcome`] with one [`KeyCommit`] per key.
//!
//! # Reconciliation table
//!
//! ```text
//! change                      current shared value     result
//! Remove  { expected: Some }  == expected              Removed
//! Remove  { expected: Some }  anything else            RemoveConflict
//! Remove  { expected: None }  absent                   Unchanged
//! Remove  { expected: None }  present                  RemoveConflict
//! Replace { expected: Some }  == expected              Inserted
//! Replace { expected: Some }  anything else            InsertConflict
//! Replace { expected: None }  absent                   Inserted
//! Replace { expected: None }  present                  InsertConflict
//! Insert                      absent or == value       Inserted
//! Insert                      different value          InsertConflict
//! ```

/// Change recorded by one transaction for one key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingChange<V> {
    /// Key was removed and not re-inserted
    Remove {
        /// Shared value observed when the key was removed
        expected: Option<V>,
    },
    /// Key was written without first being removed
    Insert {
        /// Value to publish
        value: V,
    },
    /// Key was removed and then re-inserted
    Replace {
        /// Shared value observed when the key was removed
        expected: Option<V>,
        /// Value to publish
        value: V,
    },
}

impl<V> PendingChange<V> {
    /// Build the change for a key from its overlay entries
    ///
    /// Returns `None` if the key has neither a removal nor an insertion.
    pub fn from_overlay(removed: Option<Option<V>>, inserted: Option<V>) -> Option<Self> {
        match (removed, inserted) {
            (Some(expected), Some(value)) => Some(PendingChange::Replace { expected, value }),
            (Some(expected), None) => Some(PendingChange::Remove { expected }),
            (None, Some(value)) => Some(PendingChange::Insert { value }),
            (None, None) => None,
        }
    }
}

/// Result of merging one key into the shared map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCommit {
    /// New value published
    Inserted,
    /// Shared value changed underneath; new value not published
    InsertConflict,
    /// Shared value removed
    Removed,
    /// Shared value changed underneath; removal not applied
    RemoveConflict,
    /// Nothing to do for this key
    Unchanged,
}

impl KeyCommit {
    /// True for the two conflict results
    pub fn is_conflict(&self) -> bool {
        matches!(self, KeyCommit::InsertConflict | KeyCommit::RemoveConflict)
    }
}

/// Per-key results of one commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome<K> {
    results: Vec<(K, KeyCommit)>,
}

impl<K> Default for CommitOutcome<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> CommitOutcome<K> {
    /// Empty outcome
    pub fn new() -> Self {
        Self {
            results: Vec::new(),
        }
    }

    /// Empty outcome with room for `capacity` keys
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            results: Vec::with_capacity(capacity),
        }
    }

    /// Record the result for one key
    pub fn record(&mut self, key: K, result: KeyCommit) {
        self.results.push((key, result));
    }

    /// All results in commit order
    pub fn iter(&self) -> impl Iterator<Item = (&K, KeyCommit)> {
        self.results.iter().map(|(k, r)| (k, *r))
    }

    /// Keys whose merge failed
    pub fn conflicts(&self) -> impl Iterator<Item = &K> {
        self.results
            .iter()
            .filter(|(_, r)| r.is_conflict())
            .map(|(k, _)| k)
    }

    /// Keys merged successfully (including no-ops)
    pub fn successes(&self) -> impl Iterator<Item = &K> {
        self.results
            .iter()
            .filter(|(_, r)| !r.is_conflict())
            .map(|(k, _)| k)
    }

    /// Number of conflicted keys
    pub fn conflict_count(&self) -> usize {
        self.conflicts().count()
    }

    /// Number of successfully merged keys
    pub fn success_count(&self) -> usize {
        self.results.len() - self.conflict_count()
    }

    /// True if no key conflicted
    pub fn is_clean(&self) -> bool {
        self.conflict_count() == 0
    }

    /// Number of keys in the outcome
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// True if the commit touched no key
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
