//! Port definition for the music server's cover art endpoint.

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::entities::CoverArtKind;
use crate::domain::errors::CoverArtError;

/// Port for retrieving encoded cover art from the server.
///
/// Implementations must be safe to call concurrently for different keys and
/// are expected to enforce their own request timeout.
#[async_trait]
pub trait CoverArtProvider: Send + Sync {
    /// Downloads the encoded image for an entity at the given size.
    async fn fetch_image_bytes(
        &self,
        entity_id: &str,
        kind: CoverArtKind,
        size: u32,
    ) -> Result<Bytes, CoverArtError>;
}
