//! Identifiers shared across the workspace
//!
//! - CacheId: names one transactional map instance
//! - TransactionId: identifies one transaction of the external manager
//! - CacheKey, CacheValue: bounds every key and value type must satisfy

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

/// Bounds for map keys
///
/// Keys are owned values and therefore never null.
pub trait CacheKey: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static {}

impl<T> CacheKey for T where T: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static {}

/// Bounds for map values
///
/// Equality is what the commit protocol compares when checking that the
/// shared value is still the one a transaction observed.
pub trait CacheValue: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {}

/// Name of a cache instance
///
/// Used to build transaction member ids and to address invalidation
/// notifications to the right cache on other nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheId(String);

impl CacheId {
    /// Create a cache id from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the id is empty (rejected by configuration validation)
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Transaction member id for a transactional map with this cache id
    ///
    /// Exactly one participant per (map, transaction) pair is registered
    /// under this id.
    pub fn member_id(&self) -> String {
        format!("TransactionalMap.{}", self.0)
    }
}

impl fmt::Display for CacheId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CacheId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier of a transaction driven by the external transaction manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Wrap a raw transaction number
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw transaction number
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn-{}", self.0)
    }
}
