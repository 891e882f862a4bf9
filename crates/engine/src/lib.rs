//! Transactional shared-cache map
//!
//! This crate assembles the lower layers into the map users hold:
//! - TransactionalMap: facade that routes each call to the caller's
//!   transaction participant, or to the shared map when there is none
//! - CacheConfig: `toml` configuration for a cache
//! - CacheBuilder: fluent construction, including resolver and notifier
//! - InvalidationNotifier: outbound channel for invalidation events
//!
//! # Example
//!
//! ```
//! use txmap_concurrency::TransactionManager;
//! use txmap_engine::CacheBuilder;
//!
//! let cache = CacheBuilder::new("users").build::<String, u64>().unwrap();
//! let manager = TransactionManager::new();
//!
//! let txn = manager.begin();
//! cache.put(Some(&*txn), "alice".to_string(), 1).unwrap();
//! assert_eq!(cache.get(None, &"alice".to_string()).unwrap(), None);
//! txn.commit().unwrap();
//!
//! assert_eq!(cache.get(None, &"alice".to_string()).unwrap(), Some(1));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod config;
pub mod map;
pub mod notification;

pub use builder::CacheBuilder;
pub use config::{CacheConfig, NoTransactionPolicy, CONFIG_FILE_NAME};
pub use map::{BoundMap, TransactionalMap};
pub use notification::{InvalidationEvent, InvalidationNotifier};
