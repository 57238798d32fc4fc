//! LRU cache of compiled wildcard patterns
//!
//! Policies are evaluated many times against different requests while their
//! patterns stay the same, so each `(pattern, case_sensitive)` pair is
//! compiled to a [`Regex`] once and reused.

use lru::LruCache;
use parking_lot::Mutex;
use regex::Regex;
use std::num::NonZeroUsize;

/// Default number of compiled patterns kept
pub const DEFAULT_CAPACITY: usize = 1000;

/// Cache key for a compiled pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    pattern: String,
    case_sensitive: bool,
}

/// Thread-safe LRU cache of compiled wildcard patterns
pub struct PatternCache {
    cache: Mutex<LruCache<CacheKey, Regex>>,
}

impl PatternCache {
    /// Create a new pattern cache with given capacity (zero is bumped to one)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        PatternCache {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Get a cached regex
    pub fn get(&self, pattern: &str, case_sensitive: bool) -> Option<Regex> {
        let key = CacheKey {
            pattern: pattern.to_string(),
            case_sensitive,
        };
        self.cache.lock().get(&key).cloned()
    }

    /// Put a compiled regex in the cache
    pub fn put(&self, pattern: &str, case_sensitive: bool, regex: Regex) {
        let key = CacheKey {
            pattern: pattern.to_string(),
            case_sensitive,
        };
        self.cache.lock().put(key, regex);
    }

    /// Clear the cache
    pub fn clear(&self) {
        self.cache.lock().clear();
    }

    /// Number of cached patterns
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Check if cache is empty
    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cache.lock().cap().get()
    }
}

impl Default for PatternCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for PatternCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}
