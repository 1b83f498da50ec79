//! Domain layer with cover art entities, errors and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;
/// Pure domain services.
pub mod services;

pub use entities::{CacheKey, CachedImage, CoverArtKind, DisplayContext, LoadState};
pub use errors::{CoverArtError, ErrorKind};
pub use ports::{CoverArtProvider, PersistentStore};
