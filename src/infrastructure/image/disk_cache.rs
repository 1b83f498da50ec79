//! Disk-based cover cache for persistence across sessions.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use super::access_index::{AccessIndex, IndexRecord};
use crate::domain::entities::CacheKey;
use crate::domain::errors::CoverArtError;
use crate::domain::ports::{CacheResult, PersistentStore};

/// Maximum disk cache size in bytes (1 GiB default).
pub const DEFAULT_MAX_CACHE_SIZE: u64 = 1024 * 1024 * 1024;

const ENTRY_EXTENSION: &str = "img";
const INDEX_FILE_NAME: &str = "index.json";

/// Disk-based cache that persists encoded cover bytes.
///
/// Entries are `<digest>.img` files; a JSON sidecar keeps the access order
/// used for least recently used eviction. All operations are serialized by
/// one lock and block on file I/O.
pub struct DiskCoverCache {
    cache_dir: PathBuf,
    max_size: u64,
    index: Mutex<AccessIndex>,
}

impl DiskCoverCache {
    /// Opens (or creates) a disk cache in the specified directory.
    ///
    /// The access index is reconciled with the files actually present and
    /// the cache is trimmed to `max_size`.
    ///
    /// # Errors
    /// Returns error if the cache directory cannot be created or read.
    pub fn open(cache_dir: PathBuf, max_size: u64) -> CacheResult<Self> {
        fs::create_dir_all(&cache_dir)
            .map_err(|e| CoverArtError::storage(format!("Failed to create cache dir: {e}")))?;

        let on_disk = scan_entries(&cache_dir)?;
        let index_path = cache_dir.join(INDEX_FILE_NAME);

        let records = match AccessIndex::read_records(&index_path) {
            Some(mut records) => {
                records.retain(|r| on_disk.contains_key(&r.digest));
                for record in &mut records {
                    if let Some((size, _)) = on_disk.get(&record.digest) {
                        record.size = *size;
                    }
                }
                let known: std::collections::HashSet<String> =
                    records.iter().map(|r| r.digest.clone()).collect();
                records.extend(
                    on_disk
                        .iter()
                        .filter(|(digest, _)| !known.contains(*digest))
                        .map(|(digest, (size, modified))| IndexRecord {
                            digest: digest.clone(),
                            size: *size,
                            last_access_ms: *modified,
                        }),
                );
                records
            }
            None => {
                if !on_disk.is_empty() {
                    info!(
                        count = on_disk.len(),
                        "Rebuilding disk cache index from directory scan"
                    );
                }
                on_disk
                    .into_iter()
                    .map(|(digest, (size, modified))| IndexRecord {
                        digest,
                        size,
                        last_access_ms: modified,
                    })
                    .collect()
            }
        };

        let cache = Self {
            index: Mutex::new(AccessIndex::from_records(index_path, records)),
            cache_dir,
            max_size,
        };

        {
            let mut index = cache.index.lock();
            cache.evict_to_budget(&mut index);
            if let Err(e) = index.flush() {
                warn!(error = %e, "Failed to write disk cache index");
            }
            debug!(
                count = index.len(),
                bytes = index.total_bytes(),
                dir = %cache.cache_dir.display(),
                "Opened disk cover cache"
            );
        }

        Ok(cache)
    }

    /// Returns the cache directory.
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the byte budget.
    #[must_use]
    pub const fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Writes pending access-order changes to disk.
    ///
    /// # Errors
    /// Returns error if the index file cannot be written.
    pub fn flush(&self) -> CacheResult<()> {
        self.index
            .lock()
            .flush()
            .map_err(|e| CoverArtError::storage(format!("Failed to write index: {e}")))
    }

    fn entry_path(&self, digest: &str) -> PathBuf {
        self.cache_dir.join(format!("{digest}.{ENTRY_EXTENSION}"))
    }

    /// Removes least recently used entries until the total fits the budget.
    fn evict_to_budget(&self, index: &mut AccessIndex) {
        if index.total_bytes() <= self.max_size {
            return;
        }

        debug!(
            current_size = index.total_bytes(),
            max_size = self.max_size,
            "Disk cache over limit, cleaning up"
        );

        let mut freed_size = 0u64;
        let mut freed_count = 0usize;
        while index.total_bytes() > self.max_size {
            let Some((digest, size)) = index.pop_lru() else {
                break;
            };
            let path = self.entry_path(&digest);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to remove old cache file");
                }
            }
            freed_size += size;
            freed_count += 1;
        }

        debug!(freed_size, freed_count, "Disk cache cleanup complete");
    }
}

impl PersistentStore for DiskCoverCache {
    fn get(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>> {
        let digest = key.digest();
        let mut index = self.index.lock();
        if !index.contains(&digest) {
            trace!(key = %key, "Disk cache miss");
            return Ok(None);
        }

        let path = self.entry_path(&digest);
        match fs::read(&path) {
            Ok(bytes) => {
                index.touch(&digest, now_ms());
                trace!(key = %key, path = %path.display(), "Disk cache hit");
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                index.remove(&digest);
                debug!(key = %key, "Indexed cache file vanished");
                Ok(None)
            }
            Err(e) => Err(CoverArtError::storage(format!(
                "Failed to read cache file: {e}"
            ))),
        }
    }

    fn put(&self, key: &CacheKey, bytes: &[u8]) -> CacheResult<()> {
        let size = bytes.len() as u64;
        if size > self.max_size {
            return Err(CoverArtError::storage(format!(
                "Entry of {size} bytes exceeds disk cache budget of {} bytes",
                self.max_size
            )));
        }

        let digest = key.digest();
        let path = self.entry_path(&digest);
        let mut index = self.index.lock();

        let mut file = tempfile::NamedTempFile::new_in(&self.cache_dir)
            .map_err(|e| CoverArtError::storage(format!("Failed to create cache file: {e}")))?;
        file.write_all(bytes)
            .map_err(|e| CoverArtError::storage(format!("Failed to write cache file: {e}")))?;
        file.as_file()
            .sync_all()
            .map_err(|e| CoverArtError::storage(format!("Failed to sync cache file: {e}")))?;
        file.persist(&path)
            .map_err(|e| CoverArtError::storage(format!("Failed to persist cache file: {}", e.error)))?;

        index.insert(digest, size, now_ms());
        debug!(key = %key, path = %path.display(), size, "Stored cover in disk cache");

        self.evict_to_budget(&mut index);
        if let Err(e) = index.flush() {
            warn!(error = %e, "Failed to write disk cache index");
        }

        Ok(())
    }

    fn remove(&self, key: &CacheKey) -> CacheResult<()> {
        let digest = key.digest();
        let mut index = self.index.lock();
        let path = self.entry_path(&digest);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(CoverArtError::storage(format!(
                    "Failed to remove cache file: {e}"
                )));
            }
        }
        if index.remove(&digest).is_some() {
            debug!(key = %key, "Evicted from disk cache");
            if let Err(e) = index.flush() {
                warn!(error = %e, "Failed to write disk cache index");
            }
        }
        Ok(())
    }

    fn count(&self) -> usize {
        self.index.lock().len()
    }

    fn total_bytes(&self) -> u64 {
        self.index.lock().total_bytes()
    }

    fn clear(&self) -> CacheResult<()> {
        let mut index = self.index.lock();
        let entries = fs::read_dir(&self.cache_dir)
            .map_err(|e| CoverArtError::storage(format!("Failed to read cache dir: {e}")))?;

        for entry in entries {
            let entry =
                entry.map_err(|e| CoverArtError::storage(format!("Failed to read entry: {e}")))?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION)
                && fs::remove_file(&path).is_err()
            {
                warn!(path = %path.display(), "Failed to remove cache file");
            }
        }

        index.clear();
        if let Err(e) = index.flush() {
            warn!(error = %e, "Failed to write disk cache index");
        }
        info!("Cleared disk cover cache");
        Ok(())
    }
}

impl Drop for DiskCoverCache {
    fn drop(&mut self) {
        if let Err(e) = self.index.get_mut().flush() {
            warn!(error = %e, "Failed to write disk cache index on shutdown");
        }
    }
}

impl std::fmt::Debug for DiskCoverCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskCoverCache")
            .field("cache_dir", &self.cache_dir)
            .field("max_size", &self.max_size)
            .finish_non_exhaustive()
    }
}

/// Returns the default cache directory path.
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    directories::ProjectDirs::from("org", "sonicart", "sonicart").map_or_else(
        || std::env::temp_dir().join("sonicart").join("covers"),
        |dirs| dirs.cache_dir().join("covers"),
    )
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Lists `<digest>.img` files with their size and modification time.
fn scan_entries(cache_dir: &Path) -> CacheResult<HashMap<String, (u64, i64)>> {
    let entries = fs::read_dir(cache_dir)
        .map_err(|e| CoverArtError::storage(format!("Failed to read cache dir: {e}")))?;

    let mut found = HashMap::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().is_none_or(|ext| ext != ENTRY_EXTENSION) {
            continue;
        }
        let Some(digest) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if let Ok(meta) = entry.metadata() {
            let modified = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .and_then(|d| i64::try_from(d.as_millis()).ok())
                .unwrap_or(0);
            found.insert(digest.to_string(), (meta.len(), modified));
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::CoverArtKind;
    use tempfile::TempDir;

    fn key(id: &str) -> CacheKey {
        CacheKey::new(id, 300, CoverArtKind::Album)
    }

    fn create_test_cache(max_size: u64) -> (DiskCoverCache, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let cache = DiskCoverCache::open(temp_dir.path().to_path_buf(), max_size).unwrap();
        (cache, temp_dir)
    }

    #[test]
    fn test_put_and_get() {
        let (cache, _temp) = create_test_cache(1024);
        cache.put(&key("a"), b"cover bytes").unwrap();

        assert_eq!(cache.get(&key("a")).unwrap(), Some(b"cover bytes".to_vec()));
        assert_eq!(cache.count(), 1);
        assert_eq!(cache.total_bytes(), 11);
    }

    #[test]
    fn test_cache_miss() {
        let (cache, _temp) = create_test_cache(1024);
        assert_eq!(cache.get(&key("nonexistent")).unwrap(), None);
    }

    #[test]
    fn test_sizes_are_separate_entries() {
        let (cache, _temp) = create_test_cache(1024);
        cache
            .put(&CacheKey::new("a", 80, CoverArtKind::Album), b"small")
            .unwrap();
        cache
            .put(&CacheKey::new("a", 600, CoverArtKind::Album), b"large")
            .unwrap();

        assert_eq!(cache.count(), 2);
        assert_eq!(
            cache
                .get(&CacheKey::new("a", 80, CoverArtKind::Album))
                .unwrap(),
            Some(b"small".to_vec())
        );
    }

    #[test]
    fn test_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let cache = DiskCoverCache::open(temp_dir.path().to_path_buf(), 1024).unwrap();
            cache.put(&key("a"), b"persisted").unwrap();
        }

        let cache = DiskCoverCache::open(temp_dir.path().to_path_buf(), 1024).unwrap();
        assert_eq!(cache.count(), 1);
        assert_eq!(cache.get(&key("a")).unwrap(), Some(b"persisted".to_vec()));
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let (cache, _temp) = create_test_cache(10);

        cache.put(&key("a"), b"1234").unwrap();
        cache.put(&key("b"), b"1234").unwrap();
        let _ = cache.get(&key("a")).unwrap();
        cache.put(&key("c"), b"1234").unwrap();

        assert_eq!(cache.count(), 2);
        assert!(cache.total_bytes() <= 10);
        assert!(cache.get(&key("a")).unwrap().is_some());
        assert!(cache.get(&key("b")).unwrap().is_none());
        assert!(cache.get(&key("c")).unwrap().is_some());
    }

    #[test]
    fn test_access_order_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let cache = DiskCoverCache::open(temp_dir.path().to_path_buf(), 10).unwrap();
            cache.put(&key("a"), b"1234").unwrap();
            cache.put(&key("b"), b"1234").unwrap();
            let _ = cache.get(&key("a")).unwrap();
        }

        let cache = DiskCoverCache::open(temp_dir.path().to_path_buf(), 10).unwrap();
        cache.put(&key("c"), b"1234").unwrap();
        assert!(cache.get(&key("a")).unwrap().is_some());
        assert!(cache.get(&key("b")).unwrap().is_none());
    }

    #[test]
    fn test_oversized_entry_rejected() {
        let (cache, _temp) = create_test_cache(4);
        let err = cache.put(&key("a"), b"too large").unwrap_err();
        assert!(matches!(err, CoverArtError::Storage { .. }));
        assert_eq!(cache.count(), 0);
    }

    #[test]
    fn test_replace_updates_size() {
        let (cache, _temp) = create_test_cache(1024);
        cache.put(&key("a"), b"hello").unwrap();
        cache.put(&key("a"), b"hey").unwrap();

        assert_eq!(cache.count(), 1);
        assert_eq!(cache.total_bytes(), 3);
    }

    #[test]
    fn test_corrupt_index_is_rebuilt() {
        let temp_dir = TempDir::new().unwrap();
        {
            let cache = DiskCoverCache::open(temp_dir.path().to_path_buf(), 1024).unwrap();
            cache.put(&key("a"), b"one").unwrap();
            cache.put(&key("b"), b"two").unwrap();
        }
        std::fs::write(temp_dir.path().join(INDEX_FILE_NAME), b"garbage").unwrap();

        let cache = DiskCoverCache::open(temp_dir.path().to_path_buf(), 1024).unwrap();
        assert_eq!(cache.count(), 2);
        assert_eq!(cache.get(&key("b")).unwrap(), Some(b"two".to_vec()));
    }

    #[test]
    fn test_reconciles_with_directory() {
        let temp_dir = TempDir::new().unwrap();
        {
            let cache = DiskCoverCache::open(temp_dir.path().to_path_buf(), 1024).unwrap();
            cache.put(&key("a"), b"one").unwrap();
            cache.put(&key("b"), b"two").unwrap();
        }
        std::fs::remove_file(temp_dir.path().join(format!("{}.img", key("a").digest()))).unwrap();
        std::fs::write(
            temp_dir.path().join(format!("{}.img", key("c").digest())),
            b"three",
        )
        .unwrap();

        let cache = DiskCoverCache::open(temp_dir.path().to_path_buf(), 1024).unwrap();
        assert_eq!(cache.count(), 2);
        assert_eq!(cache.total_bytes(), 8);
        assert_eq!(cache.get(&key("a")).unwrap(), None);
        assert_eq!(cache.get(&key("c")).unwrap(), Some(b"three".to_vec()));
    }

    #[test]
    fn test_open_trims_to_smaller_budget() {
        let temp_dir = TempDir::new().unwrap();
        {
            let cache = DiskCoverCache::open(temp_dir.path().to_path_buf(), 1024).unwrap();
            cache.put(&key("a"), b"1234").unwrap();
            cache.put(&key("b"), b"1234").unwrap();
            cache.put(&key("c"), b"1234").unwrap();
        }

        let cache = DiskCoverCache::open(temp_dir.path().to_path_buf(), 8).unwrap();
        assert_eq!(cache.count(), 2);
        assert!(cache.get(&key("a")).unwrap().is_none());
    }

    #[test]
    fn test_remove_and_clear() {
        let (cache, _temp) = create_test_cache(1024);
        cache.put(&key("a"), b"data1").unwrap();
        cache.put(&key("b"), b"data2").unwrap();

        cache.remove(&key("a")).unwrap();
        assert_eq!(cache.count(), 1);
        assert_eq!(cache.get(&key("a")).unwrap(), None);

        cache.clear().unwrap();
        assert_eq!(cache.count(), 0);
        assert_eq!(cache.total_bytes(), 0);
        assert_eq!(cache.get(&key("b")).unwrap(), None);
    }
}
