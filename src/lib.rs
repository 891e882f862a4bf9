//! txmap - Transactional shared-cache map
//!
//! A map shared by many concurrent transactions. Each transaction reads the
//! shared cache through a private overlay; its writes stay invisible to
//! everyone else until an externally driven two-phase commit merges them.
//! Keys whose merge loses a race are evicted rather than failing the commit.
//!
//! # Quick Start
//!
//! ```
//! use txmap::{CacheBuilder, TransactionManager};
//!
//! let cache = CacheBuilder::new("users")
//!     .copy_on_write()
//!     .build::<String, String>()
//!     .unwrap();
//! let manager = TransactionManager::new();
//!
//! let txn = manager.begin();
//! cache.put(Some(&*txn), "alice".into(), "admin".into()).unwrap();
//! txn.commit().unwrap();
//!
//! let txn = manager.begin();
//! assert_eq!(
//!     cache.get(Some(&*txn), &"alice".to_string()).unwrap(),
//!     Some("admin".to_string())
//! );
//! ```
//!
//! # Architecture
//!
//! - `txmap-core`: errors, key/value bounds, filters, transaction traits
//! - `txmap-storage`: the shared map strategies (lock-free, copy-on-write)
//! - `txmap-concurrency`: overlay, participant, conflict resolution,
//!   a minimal transaction coordinator
//! - `txmap-engine`: the map facade, configuration, builder

pub use txmap_concurrency::{
    ConflictResolver, Entries, EvictOnConflict, RetainOnConflict, Transaction,
    TransactionManager, TransactionParticipant, TransactionSlot, TransactionStatus,
};
pub use txmap_core::{
    AllEntriesFilter, CacheEntryFilter, CacheId, CacheKey, CacheValue,
    CurrentTransactionProvider, Error, KeyFilter, PredicateFilter, Result, TransactionHandle,
    TransactionId, TransactionMember,
};
pub use txmap_engine::{
    BoundMap, CacheBuilder, CacheConfig, InvalidationEvent, InvalidationNotifier,
    NoTransactionPolicy, TransactionalMap,
};
pub use txmap_storage::{CommitOutcome, KeyCommit, SharedMapBackend, Strategy};
