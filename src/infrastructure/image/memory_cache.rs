//! In-memory LRU cover cache implementation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::domain::entities::{CacheKey, CachedImage};

/// Default maximum number of covers to keep decoded in memory.
pub const DEFAULT_MAX_ENTRIES: usize = 200;

/// Default ceiling on decoded bytes held in memory (64 MiB).
pub const DEFAULT_MAX_BYTES: usize = 64 * 1024 * 1024;

/// Limits for the memory cache. Both apply; whichever is hit first evicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryBudget {
    /// Maximum number of entries.
    pub max_entries: usize,
    /// Maximum accounted bytes.
    pub max_bytes: usize,
}

impl MemoryBudget {
    /// Budget limited only by entry count.
    #[must_use]
    pub const fn entries(max_entries: usize) -> Self {
        Self {
            max_entries,
            max_bytes: usize::MAX,
        }
    }

    /// Budget limited only by bytes.
    #[must_use]
    pub const fn bytes(max_bytes: usize) -> Self {
        Self {
            max_entries: usize::MAX,
            max_bytes,
        }
    }

    const fn fits(&self, count: usize, bytes: usize) -> bool {
        count <= self.max_entries && bytes <= self.max_bytes
    }
}

impl Default for MemoryBudget {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

struct Entries {
    lru: LruCache<CacheKey, Arc<CachedImage>>,
    total_bytes: usize,
}

/// In-memory LRU cache for decoded covers.
///
/// Every operation takes one short lock, so operations are atomic with
/// respect to each other and never await.
pub struct MemoryCoverCache {
    entries: Mutex<Entries>,
    budget: MemoryBudget,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCoverCache {
    /// Creates a new cache with the given budget.
    #[must_use]
    pub fn new(budget: MemoryBudget) -> Self {
        Self {
            entries: Mutex::new(Entries {
                lru: LruCache::unbounded(),
                total_bytes: 0,
            }),
            budget,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Creates a cache that holds at most `capacity` covers.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(MemoryBudget::entries(capacity))
    }

    /// Returns true if `image` is small enough to be cached at all.
    #[must_use]
    pub const fn admits(&self, image: &CachedImage) -> bool {
        self.budget.max_entries > 0 && image.byte_size() <= self.budget.max_bytes
    }

    /// Gets a cover and marks it most recently used.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<CachedImage>> {
        let mut entries = self.entries.lock();
        if let Some(image) = entries.lru.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Memory cache hit");
            Some(Arc::clone(image))
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Memory cache miss");
            None
        }
    }

    /// Peeks at a cover without promoting it in the LRU.
    /// Use this in read-only contexts such as redraws.
    pub fn peek(&self, key: &CacheKey) -> Option<Arc<CachedImage>> {
        self.entries.lock().lru.peek(key).cloned()
    }

    /// Inserts or replaces a cover, evicting least recently used entries
    /// until it fits.
    ///
    /// Returns the keys that were evicted. A cover larger than the whole
    /// byte budget is not stored.
    pub fn put(&self, key: CacheKey, image: Arc<CachedImage>) -> Vec<CacheKey> {
        let size = image.byte_size();
        let mut evicted = Vec::new();

        if !self.admits(&image) {
            debug!(key = %key, size, "Cover exceeds memory budget, not caching");
            return evicted;
        }

        let mut entries = self.entries.lock();
        if let Some(old) = entries.lru.pop(&key) {
            entries.total_bytes -= old.byte_size();
        }

        while !self
            .budget
            .fits(entries.lru.len() + 1, entries.total_bytes + size)
        {
            let Some((old_key, old_image)) = entries.lru.pop_lru() else {
                break;
            };
            entries.total_bytes -= old_image.byte_size();
            debug!(key = %old_key, "Evicted cover from memory cache");
            evicted.push(old_key);
        }

        trace!(key = %key, size, "Storing cover in memory cache");
        entries.total_bytes += size;
        entries.lru.put(key, image);

        evicted
    }

    /// Removes a cover.
    pub fn remove(&self, key: &CacheKey) -> Option<Arc<CachedImage>> {
        let mut entries = self.entries.lock();
        let removed = entries.lru.pop(key);
        if let Some(image) = &removed {
            entries.total_bytes -= image.byte_size();
            debug!(key = %key, "Removed cover from memory cache");
        }
        removed
    }

    /// Drops every cover. Returns the keys that were held.
    pub fn clear(&self) -> Vec<CacheKey> {
        let mut entries = self.entries.lock();
        let keys: Vec<CacheKey> = entries.lru.iter().map(|(k, _)| k.clone()).collect();
        entries.lru.clear();
        entries.total_bytes = 0;
        debug!(count = keys.len(), "Cleared memory cover cache");
        keys
    }

    /// Returns the number of cached covers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().lru.len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns cache statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> MemoryCacheStats {
        let (count, approx_bytes) = {
            let entries = self.entries.lock();
            (entries.lru.len(), entries.total_bytes)
        };
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        MemoryCacheStats {
            count,
            approx_bytes,
            hits,
            misses,
            hit_rate,
        }
    }
}

impl Default for MemoryCoverCache {
    fn default() -> Self {
        Self::new(MemoryBudget::default())
    }
}

impl std::fmt::Debug for MemoryCoverCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCoverCache")
            .field("budget", &self.budget)
            .finish_non_exhaustive()
    }
}

/// Statistics about the memory cache.
#[derive(Debug, Clone)]
pub struct MemoryCacheStats {
    /// Current number of cached covers.
    pub count: usize,
    /// Accounted bytes of all cached covers.
    pub approx_bytes: usize,
    /// Number of `get` hits.
    pub hits: u64,
    /// Number of `get` misses.
    pub misses: u64,
    /// Hit rate as a percentage.
    pub hit_rate: f64,
}

impl std::fmt::Display for MemoryCacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Memory: {} covers, {} KiB, {:.1}% hit rate ({} hits, {} misses)",
            self.count,
            self.approx_bytes / 1024,
            self.hit_rate,
            self.hits,
            self.misses
        )
    }
}
