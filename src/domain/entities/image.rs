//! Decoded cover images.

use std::sync::Arc;

use crate::domain::errors::CoverArtError;

/// A decoded cover together with the size it is accounted at.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedImage {
    image: image::DynamicImage,
    byte_size: usize,
}

impl CachedImage {
    /// Wraps an already decoded image.
    #[must_use]
    pub fn from_decoded(image: image::DynamicImage) -> Self {
        let byte_size = image.as_bytes().len();
        Self { image, byte_size }
    }

    /// Decodes encoded image bytes (PNG, JPEG or WebP).
    ///
    /// # Errors
    /// Returns `CoverArtError::Decode` if the bytes are not a supported image.
    pub fn decode(bytes: &[u8]) -> Result<Self, CoverArtError> {
        if bytes.is_empty() {
            return Err(CoverArtError::decode("empty image body"));
        }
        image::load_from_memory(bytes)
            .map(Self::from_decoded)
            .map_err(|e| CoverArtError::decode(e.to_string()))
    }

    /// Returns the decoded bitmap.
    #[must_use]
    pub const fn image(&self) -> &image::DynamicImage {
        &self.image
    }

    /// Returns the bytes this image is accounted at in the memory budget.
    #[must_use]
    pub const fn byte_size(&self) -> usize {
        self.byte_size
    }

    /// Returns the width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Returns the height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Where an image was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    /// Loaded from the in-memory LRU cache.
    MemoryCache,
    /// Loaded from the persistent cache.
    DiskCache,
    /// Downloaded from the music server.
    Network,
}

impl std::fmt::Display for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MemoryCache => write!(f, "memory"),
            Self::DiskCache => write!(f, "disk"),
            Self::Network => write!(f, "network"),
        }
    }
}

/// A shared image plus the tier that produced it.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    /// The decoded image.
    pub image: Arc<CachedImage>,
    /// Where it came from.
    pub source: ImageSource,
}
