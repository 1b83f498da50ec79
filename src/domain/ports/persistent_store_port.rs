//! Port definition for the persistent cover cache.

use crate::domain::entities::CacheKey;
use crate::domain::errors::CoverArtError;

/// Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CoverArtError>;

/// Durable key to encoded-bytes store.
///
/// Operations may block on disk I/O; async callers run them on the
/// blocking pool. Implementations must be thread-safe.
#[cfg_attr(test, mockall::automock)]
pub trait PersistentStore: Send + Sync {
    /// Reads the encoded bytes for a key, marking it recently used.
    ///
    /// # Errors
    /// Returns a storage error if the disk cannot be read.
    fn get(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>>;

    /// Durably stores bytes for a key, evicting least recently used entries
    /// to stay within budget.
    ///
    /// # Errors
    /// Returns a storage error if the write fails or the entry can never fit.
    fn put(&self, key: &CacheKey, bytes: &[u8]) -> CacheResult<()>;

    /// Removes a key.
    ///
    /// # Errors
    /// Returns a storage error if the file exists but cannot be removed.
    fn remove(&self, key: &CacheKey) -> CacheResult<()>;

    /// Number of stored entries.
    fn count(&self) -> usize;

    /// Total stored bytes.
    fn total_bytes(&self) -> u64;

    /// Removes every entry.
    ///
    /// # Errors
    /// Returns a storage error if the cache directory cannot be read.
    fn clear(&self) -> CacheResult<()>;
}
