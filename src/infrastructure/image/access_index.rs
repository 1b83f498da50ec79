//! Sidecar access-order index for the disk cache.

use std::io::Write;
use std::path::{Path, PathBuf};

use lru::LruCache;
use serde::{Deserialize, Serialize};

const INDEX_VERSION: u32 = 1;

/// One persisted index row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Key digest, also the file stem.
    pub digest: String,
    /// Encoded size in bytes.
    pub size: u64,
    /// Last access, milliseconds since the Unix epoch.
    pub last_access_ms: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexFile {
    version: u32,
    entries: Vec<IndexRecord>,
}

#[derive(Debug, Clone, Copy)]
struct AccessMeta {
    size: u64,
    last_access_ms: i64,
}

/// Least recently used order of the entries on disk plus their sizes.
#[derive(Debug)]
pub struct AccessIndex {
    path: PathBuf,
    entries: LruCache<String, AccessMeta>,
    total_bytes: u64,
    dirty: bool,
}

impl AccessIndex {
    /// Reads the records stored at `path`.
    ///
    /// Returns `None` when the file is missing, unreadable or from another version.
    #[must_use]
    pub fn read_records(path: &Path) -> Option<Vec<IndexRecord>> {
        let content = std::fs::read(path).ok()?;
        let file: IndexFile = serde_json::from_slice(&content).ok()?;
        (file.version == INDEX_VERSION).then_some(file.entries)
    }

    /// Builds an index from records in any order.
    #[must_use]
    pub fn from_records(path: PathBuf, mut records: Vec<IndexRecord>) -> Self {
        records.sort_by_key(|r| r.last_access_ms);
        let mut index = Self {
            path,
            entries: LruCache::unbounded(),
            total_bytes: 0,
            dirty: true,
        };
        for record in records {
            index.total_bytes += record.size;
            if let Some(old) = index.entries.put(
                record.digest,
                AccessMeta {
                    size: record.size,
                    last_access_ms: record.last_access_ms,
                },
            ) {
                index.total_bytes -= old.size;
            }
        }
        index
    }

    /// Returns true if the digest is indexed.
    #[must_use]
    pub fn contains(&self, digest: &str) -> bool {
        self.entries.contains(digest)
    }

    /// Marks an entry most recently used.
    pub fn touch(&mut self, digest: &str, now_ms: i64) {
        if let Some(meta) = self.entries.get_mut(digest) {
            meta.last_access_ms = now_ms;
            self.dirty = true;
        }
    }

    /// Inserts or replaces an entry as most recently used.
    pub fn insert(&mut self, digest: String, size: u64, now_ms: i64) {
        self.total_bytes += size;
        if let Some(old) = self.entries.put(
            digest,
            AccessMeta {
                size,
                last_access_ms: now_ms,
            },
        ) {
            self.total_bytes -= old.size;
        }
        self.dirty = true;
    }

    /// Removes an entry, returning its size.
    pub fn remove(&mut self, digest: &str) -> Option<u64> {
        let meta = self.entries.pop(digest)?;
        self.total_bytes -= meta.size;
        self.dirty = true;
        Some(meta.size)
    }

    /// Removes and returns the least recently used entry.
    pub fn pop_lru(&mut self) -> Option<(String, u64)> {
        let (digest, meta) = self.entries.pop_lru()?;
        self.total_bytes -= meta.size;
        self.dirty = true;
        Some((digest, meta.size))
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_bytes = 0;
        self.dirty = true;
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of entry sizes.
    #[must_use]
    pub const fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Writes the index if it changed since the last flush.
    ///
    /// # Errors
    /// Returns error if the index file cannot be written.
    pub fn flush(&mut self) -> std::io::Result<()> {
        if !self.dirty {
            return Ok(());
        }
        // LruCache iterates most recent first; store oldest first.
        let mut entries: Vec<IndexRecord> = self
            .entries
            .iter()
            .map(|(digest, meta)| IndexRecord {
                digest: digest.clone(),
                size: meta.size,
                last_access_ms: meta.last_access_ms,
            })
            .collect();
        entries.reverse();

        let content = serde_json::to_vec(&IndexFile {
            version: INDEX_VERSION,
            entries,
        })
        .map_err(std::io::Error::other)?;

        let parent = self
            .path
            .parent()
            .ok_or_else(|| std::io::Error::other("Invalid index path"))?;
        let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
        temp_file.write_all(&content)?;
        temp_file.persist(&self.path).map_err(|e| e.error)?;

        self.dirty = false;
        Ok(())
    }
}
