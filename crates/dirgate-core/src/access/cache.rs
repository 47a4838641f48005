//! Negative access caching.
//!
//! Directories whose ACL could not even be read for lack of permission
//! are remembered for the rest of the process lifetime, so repeated
//! checks short-circuit instead of probing the OS again. The cache is a
//! one-way fact store: presence means "denied", absence means nothing.
//!
//! # Thread Safety
//!
//! `DeniedDirCache` uses `DashMap` internally, providing lock-free
//! concurrent access. It can be safely shared via `Arc<DeniedDirCache>`;
//! inserts are idempotent, so a racing duplicate insert costs one
//! redundant OS probe and nothing else.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::Path;

use dashmap::DashMap;

/// Process-wide record of directories known to deny all access.
///
/// Injectable by design: callers that need isolation (tests, independent
/// evaluators) construct a fresh instance instead of sharing one. Entries
/// are keyed by a hash of the absolute path and are never evicted.
#[derive(Debug, Default)]
pub struct DeniedDirCache {
    denied: DashMap<u64, ()>,
}

impl DeniedDirCache {
    /// Create a new empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn key(dir: &Path) -> u64 {
        let mut hasher = DefaultHasher::new();
        dir.hash(&mut hasher);
        hasher.finish()
    }

    /// Whether `dir` was previously marked denied.
    ///
    /// A `false` result asserts nothing; the cache never grants access.
    #[inline]
    #[must_use]
    pub fn is_denied(&self, dir: &Path) -> bool {
        self.denied.contains_key(&Self::key(dir))
    }

    /// Record `dir` as denying all access. Irreversible for the lifetime
    /// of this cache instance.
    #[inline]
    pub fn mark_denied(&self, dir: &Path) {
        self.denied.insert(Self::key(dir), ());
    }

    /// Cache statistics for monitoring and debugging.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            denied_entries: self.denied.len(),
        }
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    /// Number of directories recorded as denied.
    pub denied_entries: usize,
}
