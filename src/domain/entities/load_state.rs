//! Per-key loading state exposed to observers.

use std::sync::Arc;

use super::{CacheKey, CachedImage};
use crate::domain::errors::ErrorKind;

/// Status of a cover in the loading pipeline.
///
/// A request cycle moves `Idle -> Loading -> Loaded | Failed`. A failed key
/// may be requested again, which starts a new cycle at `Loading`.
#[derive(Debug, Clone, Default)]
pub enum LoadState {
    /// Never requested, or dropped from memory since.
    #[default]
    Idle,
    /// A network fetch is in flight.
    Loading,
    /// The image is available.
    Loaded(Arc<CachedImage>),
    /// The last fetch failed.
    Failed(ErrorKind),
}

impl LoadState {
    /// Returns true if the image is ready for rendering.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }

    /// Returns true if a fetch is in flight.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// Returns true if loading failed.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Returns true if nothing is known about the key.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns true for `Loaded` and `Failed`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Loaded(_) | Self::Failed(_))
    }

    /// Returns the image if loaded.
    #[must_use]
    pub fn image(&self) -> Option<&Arc<CachedImage>> {
        match self {
            Self::Loaded(image) => Some(image),
            _ => None,
        }
    }

    /// Returns the failure kind if failed.
    #[must_use]
    pub const fn error(&self) -> Option<ErrorKind> {
        match self {
            Self::Failed(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Compares states without comparing pixels; loaded images compare by identity.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Idle, Self::Idle) | (Self::Loading, Self::Loading) => true,
            (Self::Loaded(a), Self::Loaded(b)) => Arc::ptr_eq(a, b),
            (Self::Failed(a), Self::Failed(b)) => a == b,
            _ => false,
        }
    }
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Loading => write!(f, "loading"),
            Self::Loaded(image) => write!(f, "loaded ({}x{})", image.width(), image.height()),
            Self::Failed(kind) => write!(f, "failed ({kind})"),
        }
    }
}

/// Published whenever the state of a key changes.
#[derive(Debug, Clone)]
pub struct LoadStateEvent {
    /// Key whose state changed.
    pub key: CacheKey,
    /// The new state.
    pub state: LoadState,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> Arc<CachedImage> {
        Arc::new(CachedImage::from_decoded(image::DynamicImage::new_rgb8(2, 2)))
    }

    #[test]
    fn test_loaded_compares_by_identity() {
        let a = image();
        let b = image();
        assert!(LoadState::Loaded(a.clone()).same_as(&LoadState::Loaded(a)));
        assert!(!LoadState::Loaded(b).same_as(&LoadState::Loaded(image())));
    }

    #[test]
    fn test_state_predicates() {
        assert!(LoadState::default().is_idle());
        assert!(LoadState::Loading.is_loading());
        assert!(!LoadState::Loading.is_terminal());
        assert!(LoadState::Failed(ErrorKind::NotFound).is_terminal());
        assert_eq!(
            LoadState::Failed(ErrorKind::Decode).error(),
            Some(ErrorKind::Decode)
        );
        assert!(LoadState::Loaded(image()).image().is_some());
    }
}
