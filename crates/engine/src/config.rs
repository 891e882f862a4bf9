//! Cache configuration via `txmap.toml`
//!
//! A cache is described by its id, the shared map strategy, whether new keys
//! are fast-forwarded, and what happens to mutations that arrive without a
//! transaction.

use serde::{Deserialize, Serialize};
use std::path::Path;
use txmap_core::{Error, Result};
use txmap_storage::Strategy;

/// Conventional config file name.
pub const CONFIG_FILE_NAME: &str = "txmap.toml";

/// What a mutating call does when no transaction is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NoTransactionPolicy {
    /// Mutate the shared map directly, unguarded
    #[default]
    #[serde(rename = "shared")]
    SharedDirect,
    /// Fail with `NoActiveTransaction`
    #[serde(rename = "reject")]
    Reject,
}

/// Cache configuration loaded from TOML.
///
/// # Example
///
/// ```toml
/// cache_id = "users"
/// strategy = "copy-on-write"
/// fast_forward = true
/// no_transaction_policy = "reject"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache id; also names the transaction member
    pub cache_id: String,
    /// Shared map strategy: `"lock-free"` or `"copy-on-write"`.
    #[serde(default)]
    pub strategy: Strategy,
    /// Write brand-new keys straight into the shared map.
    #[serde(default)]
    pub fast_forward: bool,
    /// Mutations without a transaction: `"shared"` or `"reject"`.
    #[serde(default)]
    pub no_transaction_policy: NoTransactionPolicy,
}

impl CacheConfig {
    /// Config with defaults for everything but the id
    pub fn new(cache_id: impl Into<String>) -> Self {
        Self {
            cache_id: cache_id.into(),
            strategy: Strategy::default(),
            fast_forward: false,
            no_transaction_policy: NoTransactionPolicy::default(),
        }
    }

    /// Check the config for values serde cannot reject on its own.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache id is empty or blank.
    pub fn validate(&self) -> Result<()> {
        if self.cache_id.trim().is_empty() {
            return Err(Error::config("cache_id must not be empty"));
        }
        Ok(())
    }

    /// Parse and validate a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML for this config or
    /// fails validation.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: CacheConfig = toml::from_str(content)
            .map_err(|e| Error::config(format!("Failed to parse cache config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|e| match e {
            Error::Config(msg) => Error::config(format!("{} ({})", msg, path.display())),
            other => other,
        })
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("Failed to serialize cache config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# txmap cache configuration
#
# Cache id. Must be unique among the caches a transaction touches.
cache_id = "default"

# Shared map strategy: "lock-free" (default) or "copy-on-write"
#   "lock-free"     = concurrent hash map, per-key CAS on commit,
#                     transactions see live updates for untouched keys
#   "copy-on-write" = immutable snapshots swapped under a mutex,
#                     transactions are pinned to their first snapshot
strategy = "lock-free"

# Write brand-new keys straight into the shared map (default: false)
fast_forward = false

# Mutations without an active transaction: "shared" (default) or "reject"
#   "shared" = apply directly to the shared map
#   "reject" = fail with a no-active-transaction error
no_transaction_policy = "shared"
"#
    }
}
