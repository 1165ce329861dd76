//! Cross-process secret cache
//!
//! Lookups run in short-lived processes, so the only place to share results
//! is a file. The cache lives on a memory-backed filesystem to keep plaintext
//! secrets off durable storage.
//!
//! # Guarantees
//!
//! - One exclusive `flock` per read-modify-write cycle, whole-file granularity
//! - Whole-file TTL based on the cache file's mtime, never per key
//! - Corrupt content is recovered as an empty cache
//! - Cache file mode is `0600`

pub mod observer;
pub mod shm;
pub mod store;

pub use observer::{CacheEvent, CacheObserver, RecordingObserver, TracingObserver};
pub use shm::{resolve_shared_directory, SharedDirectory, SHARED_DIRECTORIES};
pub use store::{get_or_compute, CacheInfo, TtlCache};

use crate::config::schema::CacheConfig;
use crate::error::BwcacheResult;
use std::path::PathBuf;
use std::time::Duration;

/// Cache file location for a configuration
///
/// Uses `cache.directory` when set, otherwise the platform's shared directory.
pub fn cache_path(config: &CacheConfig) -> BwcacheResult<PathBuf> {
    let dir = match &config.directory {
        Some(dir) => dir.clone(),
        None => resolve_shared_directory()?,
    };
    Ok(dir.join(&config.basename))
}

impl TtlCache {
    /// Build the cache described by configuration, with an optional TTL override
    pub fn from_config(config: &CacheConfig, ttl_secs: Option<u64>) -> BwcacheResult<Self> {
        let ttl = Duration::from_secs(ttl_secs.unwrap_or(config.ttl_secs));
        Ok(Self::new(cache_path(config)?, ttl))
    }
}
