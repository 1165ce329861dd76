//! Diagnostic events emitted by the cache
//!
//! The cache never writes diagnostics itself. It reports events to an
//! injected [`CacheObserver`], so callers choose where they go and tests can
//! assert on them without a global subscriber.

use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// Something notable that happened while serving a cache request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// The cache file was older than the TTL and was truncated
    Expired { age: Duration },
    /// About to block on the exclusive lock
    LockWaiting,
    /// Exclusive lock acquired
    LockAcquired,
    /// File content could not be parsed and was treated as empty
    Corrupt { reason: String },
    /// Key found in the cache
    Hit,
    /// Key not found, computing
    Miss,
    /// Freshly computed value written to disk
    Stored,
    /// Exclusive lock released
    LockReleased,
}

/// Receiver for cache diagnostics
pub trait CacheObserver: Send + Sync {
    /// Record an event for the given cache key
    fn event(&self, key: &str, event: CacheEvent);
}

/// Default observer that forwards events to `tracing`
///
/// File contents are never logged, they may hold plaintext secrets.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl CacheObserver for TracingObserver {
    fn event(&self, key: &str, event: CacheEvent) {
        match event {
            CacheEvent::Expired { age } => {
                debug!("({}) cache timed out after {}s, truncating", key, age.as_secs())
            }
            CacheEvent::LockWaiting => debug!("({}) acquiring lock on cache file", key),
            CacheEvent::LockAcquired => debug!("({}) lock acquired", key),
            CacheEvent::Corrupt { reason } => {
                warn!("({}) failed to parse cache, contents will be overwritten: {}", key, reason)
            }
            CacheEvent::Hit => debug!("({}) cache hit", key),
            CacheEvent::Miss => debug!("({}) cache miss", key),
            CacheEvent::Stored => debug!("({}) cache updated", key),
            CacheEvent::LockReleased => debug!("({}) lock released", key),
        }
    }
}

/// Observer that keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<(String, CacheEvent)>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events, oldest first
    pub fn events(&self) -> Vec<(String, CacheEvent)> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Recorded events without their keys
    pub fn kinds(&self) -> Vec<CacheEvent> {
        self.events().into_iter().map(|(_, event)| event).collect()
    }
}

impl CacheObserver for RecordingObserver {
    fn event(&self, key: &str, event: CacheEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push((key.to_string(), event));
        }
    }
}
