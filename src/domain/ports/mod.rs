mod cover_art_provider_port;
mod persistent_store_port;

pub use cover_art_provider_port::CoverArtProvider;
pub use persistent_store_port::{CacheResult, PersistentStore};

#[cfg(test)]
pub mod mocks {
    pub use super::cover_art_provider_port::mock::{MockCoverArtProvider, png_bytes};
    pub use super::persistent_store_port::MockPersistentStore;
}
