//! Sonicart - cover art acquisition and caching for Subsonic-compatible servers.
//!
//! Covers are served from a bounded in-memory cache, then a larger on-disk
//! cache, then the network, with at most one download in flight per cover.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing the cover art services.
pub mod application;
/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing caches, config and the server client.
pub mod infrastructure;

/// Current version of the application.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const NAME: &str = "sonicart";
