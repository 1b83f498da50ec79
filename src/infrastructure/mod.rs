//! Infrastructure layer with external service adapters.

/// Application configuration.
pub mod config;
/// Memory and disk cover caches.
pub mod image;
/// Subsonic API client.
pub mod subsonic;

pub use config::{AppConfig, CliArgs, ConfigLoader, LogLevel};
pub use image::{DiskCoverCache, MemoryCoverCache};
pub use subsonic::{SubsonicClient, SubsonicClientConfig};
