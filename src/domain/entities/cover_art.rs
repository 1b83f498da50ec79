//! Cover art identity types.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::DisplayContext;
use crate::domain::services::resolve_size;

/// Namespace of the entity a cover belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum CoverArtKind {
    /// Album cover. Songs resolve to their album's cover.
    #[default]
    Album,
    /// Artist image.
    Artist,
}

impl CoverArtKind {
    /// Returns the lowercase name used in keys and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Album => "album",
            Self::Artist => "artist",
        }
    }
}

impl std::fmt::Display for CoverArtKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one cached cover: entity id, pixel size and kind.
///
/// Equality and hashing are by value, so two requests built from the same
/// tuple address the same cache entry everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    entity_id: Arc<str>,
    size: u32,
    kind: CoverArtKind,
}

impl CacheKey {
    /// Creates a key. A size of zero is raised to one pixel.
    #[must_use]
    pub fn new(entity_id: impl AsRef<str>, size: u32, kind: CoverArtKind) -> Self {
        Self {
            entity_id: Arc::from(entity_id.as_ref()),
            size: size.max(1),
            kind,
        }
    }

    /// Creates a key whose size comes from the display context.
    #[must_use]
    pub fn for_context(
        entity_id: impl AsRef<str>,
        kind: CoverArtKind,
        context: DisplayContext,
    ) -> Self {
        Self::new(entity_id, resolve_size(context), kind)
    }

    /// Creates the key for a song's artwork, which is its album's cover.
    #[must_use]
    pub fn for_song_album(album_id: impl AsRef<str>, context: DisplayContext) -> Self {
        Self::for_context(album_id, CoverArtKind::Album, context)
    }

    /// Returns the entity id.
    #[must_use]
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// Returns the pixel size.
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Returns the entity kind.
    #[must_use]
    pub const fn kind(&self) -> CoverArtKind {
        self.kind
    }

    /// Returns a stable, filesystem-safe digest of the key.
    #[must_use]
    pub fn digest(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(self.kind.as_str().as_bytes());
        hasher.update(b":");
        hasher.update(self.size.to_string().as_bytes());
        hasher.update(b":");
        hasher.update(self.entity_id.as_bytes());
        let result = hasher.finalize();
        hex::encode(&result[..16])
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}", self.kind, self.entity_id, self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_equality_by_value() {
        let a = CacheKey::new("al-1", 300, CoverArtKind::Album);
        let b = CacheKey::new(String::from("al-1"), 300, CoverArtKind::Album);
        assert_eq!(a, b);
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn test_kind_disambiguates_ids() {
        let album = CacheKey::new("42", 300, CoverArtKind::Album);
        let artist = CacheKey::new("42", 300, CoverArtKind::Artist);
        assert_ne!(album, artist);
        assert_ne!(album.digest(), artist.digest());
    }

    #[test]
    fn test_size_is_part_of_identity() {
        let small = CacheKey::new("42", 80, CoverArtKind::Album);
        let large = CacheKey::new("42", 600, CoverArtKind::Album);
        assert_ne!(small, large);
    }

    #[test]
    fn test_zero_size_is_raised() {
        let key = CacheKey::new("42", 0, CoverArtKind::Album);
        assert_eq!(key.size(), 1);
    }

    #[test]
    fn test_digest_shape() {
        let digest = CacheKey::new("some/odd id", 120, CoverArtKind::Artist).digest();
        assert_eq!(digest.len(), 32);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_song_uses_album_cover() {
        let song = CacheKey::for_song_album("al-9", DisplayContext::ListRow);
        let album = CacheKey::for_context("al-9", CoverArtKind::Album, DisplayContext::ListRow);
        assert_eq!(song, album);
    }
}
