//! Cache builder for fluent configuration
//!
//! ```
//! use txmap_engine::{CacheBuilder, NoTransactionPolicy};
//!
//! let cache = CacheBuilder::new("sessions")
//!     .copy_on_write()
//!     .fast_forward(true)
//!     .no_transaction_policy(NoTransactionPolicy::Reject)
//!     .build::<String, String>()
//!     .unwrap();
//! assert_eq!(cache.member_id(), "TransactionalMap.sessions");
//! ```

use std::sync::Arc;
use tracing::debug;
use txmap_concurrency::{ConflictResolver, EvictOnConflict};
use txmap_core::{CacheId, CacheKey, CacheValue, Result};
use txmap_storage::Strategy;

use crate::config::{CacheConfig, NoTransactionPolicy};
use crate::map::TransactionalMap;
use crate::notification::InvalidationNotifier;

/// Builder for [`TransactionalMap`]
///
/// Defaults: lock-free strategy, no fast-forward, direct shared writes
/// without a transaction, evict-on-conflict, no notifier.
#[derive(Debug, Clone)]
pub struct CacheBuilder {
    config: CacheConfig,
}

impl CacheBuilder {
    /// Create a builder for the cache `cache_id`
    pub fn new(cache_id: impl Into<String>) -> Self {
        Self {
            config: CacheConfig::new(cache_id),
        }
    }

    /// Start from a parsed config
    pub fn from_config(config: CacheConfig) -> Self {
        Self { config }
    }

    /// Select the shared map strategy
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// Use the lock-free strategy (default)
    pub fn lock_free(self) -> Self {
        self.strategy(Strategy::LockFree)
    }

    /// Use the copy-on-write strategy
    pub fn copy_on_write(self) -> Self {
        self.strategy(Strategy::CopyOnWrite)
    }

    /// Enable or disable fast-forward of brand-new keys
    pub fn fast_forward(mut self, enabled: bool) -> Self {
        self.config.fast_forward = enabled;
        self
    }

    /// Set the policy for mutations without a transaction
    pub fn no_transaction_policy(mut self, policy: NoTransactionPolicy) -> Self {
        self.config.no_transaction_policy = policy;
        self
    }

    /// Current configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Build with the default evict-on-conflict resolver and no notifier
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration fails validation.
    pub fn build<K: CacheKey, V: CacheValue>(self) -> Result<TransactionalMap<K, V>> {
        self.build_with(Arc::new(EvictOnConflict), None)
    }

    /// Build with a custom resolver and an optional notifier
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration fails validation.
    pub fn build_with<K: CacheKey, V: CacheValue>(
        self,
        resolver: Arc<dyn ConflictResolver<K, V>>,
        notifier: Option<Arc<dyn InvalidationNotifier<K, V>>>,
    ) -> Result<TransactionalMap<K, V>> {
        self.config.validate()?;
        let CacheConfig {
            cache_id,
            strategy,
            fast_forward,
            no_transaction_policy,
        } = self.config;

        debug!(
            cache = %cache_id,
            strategy = %strategy,
            fast_forward,
            policy = ?no_transaction_policy,
            "Building cache"
        );
        Ok(TransactionalMap::new(
            CacheId::new(cache_id),
            strategy.create(),
            resolver,
            notifier,
            fast_forward,
            no_transaction_policy,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use txmap_concurrency::RetainOnConflict;

    #[test]
    fn test_builder_defaults() {
        let cache = CacheBuilder::new("c").build::<String, i32>().unwrap();
        assert_eq!(cache.cache_id().as_str(), "c");
        assert_eq!(cache.strategy(), Strategy::LockFree);
        assert!(!cache.fast_forward_enabled());
        assert_eq!(
            cache.no_transaction_policy(),
            NoTransactionPolicy::SharedDirect
        );
    }

    #[test]
    fn test_builder_settings() {
        let cache = CacheBuilder::new("c")
            .copy_on_write()
            .fast_forward(true)
            .no_transaction_policy(NoTransactionPolicy::Reject)
            .build::<String, i32>()
            .unwrap();
        assert_eq!(cache.strategy(), Strategy::CopyOnWrite);
        assert!(cache.fast_forward_enabled());
        assert_eq!(cache.no_transaction_policy(), NoTransactionPolicy::Reject);
    }

    #[test]
    fn test_builder_from_config() {
        let config = CacheConfig::from_toml_str(
            "cache_id = \"users\"\nstrategy = \"copy-on-write\"\nfast_forward = true",
        )
        .unwrap();
        let builder = CacheBuilder::from_config(config.clone());
        assert_eq!(builder.config(), &config);

        let cache = builder
            .build_with::<String, i32>(Arc::new(RetainOnConflict), None)
            .unwrap();
        assert_eq!(cache.member_id(), "TransactionalMap.users");
        assert_eq!(cache.strategy(), Strategy::CopyOnWrite);
    }

    #[test]
    fn test_builder_rejects_empty_id() {
        assert!(CacheBuilder::new("").build::<String, i32>().is_err());
    }
}
