//! Cover caches.
//!
//! - Memory cache of decoded covers with LRU eviction by count and bytes
//! - Disk cache of encoded covers with a persisted access index

pub mod access_index;
pub mod disk_cache;
pub mod memory_cache;

pub use disk_cache::{DEFAULT_MAX_CACHE_SIZE, DiskCoverCache, default_cache_dir};
pub use memory_cache::{
    DEFAULT_MAX_BYTES, DEFAULT_MAX_ENTRIES, MemoryBudget, MemoryCacheStats, MemoryCoverCache,
};
